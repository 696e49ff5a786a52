use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Exclusive hold on one session. Dropping it lets the next turn in and
/// drops the map entry when nobody is waiting.
#[derive(Debug)]
pub struct SessionLease {
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl SessionLease {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        remove_if_idle(&self.locks, &self.session_id);
    }
}

/// Per-session async mutexes keyed by session id.
///
/// The map itself sits behind a short-lived std mutex; the per-session lock is
/// a tokio mutex so it can be held across the awaits of a whole turn.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: LockMap,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Wait until no other holder owns `session_id`.
    pub async fn acquire(&self, session_id: &str) -> SessionLease {
        let lock = self.entry(session_id);
        let guard = lock.lock_owned().await;
        SessionLease {
            session_id: session_id.to_string(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Only the map's own reference left means no holder and no waiter.
fn remove_if_idle(locks: &LockMap, session_id: &str) {
    let mut locks = locks.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(lock) = locks.get(session_id)
        && Arc::strong_count(lock) == 1
    {
        locks.remove(session_id);
    }
}
