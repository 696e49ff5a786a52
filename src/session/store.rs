use super::locks::{SessionLease, SessionLocks};
use super::types::{Checkpoint, HistoryEntry, Session, SessionPatch, SessionSummary};
use crate::error::PersistenceError;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

/// Durable, versioned session snapshots keyed by session id.
///
/// Writes replace the whole snapshot. `put_state` only succeeds when the
/// stored version still matches `expected_version`, and `lock` hands out the
/// per-session lease that turns hold from load to final write.
pub trait CheckpointStore: Send + Sync {
    fn get_state<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>, PersistenceError>> + Send + 'a>>;

    /// Store `session` as the next version. `None` means the session must not
    /// exist yet. Returns the new version.
    fn put_state<'a>(
        &'a self,
        session: &'a Session,
        expected_version: Option<u64>,
    ) -> Pin<Box<dyn Future<Output = Result<u64, PersistenceError>> + Send + 'a>>;

    fn delete_session<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, PersistenceError>> + Send + 'a>>;

    fn list_sessions(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SessionSummary>, PersistenceError>> + Send + '_>>;

    fn lock<'a>(&'a self, session_id: &'a str)
    -> Pin<Box<dyn Future<Output = SessionLease> + Send + 'a>>;

    /// Merge `patch` into the latest snapshot and persist it as a new version.
    ///
    /// Takes the session lease itself, so callers must not already hold it.
    fn update_state<'a>(
        &'a self,
        session_id: &'a str,
        patch: SessionPatch,
    ) -> Pin<Box<dyn Future<Output = Result<u64, PersistenceError>> + Send + 'a>> {
        Box::pin(async move {
            let _lease = self.lock(session_id).await;
            let Checkpoint {
                mut session,
                version,
            } = self
                .get_state(session_id)
                .await?
                .ok_or_else(|| PersistenceError::NotFound(session_id.to_string()))?;
            session.apply_patch(patch);
            self.put_state(&session, Some(version)).await
        })
    }

    /// Visible user/assistant messages of the latest snapshot.
    fn get_history<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, PersistenceError>> + Send + 'a>>
    {
        Box::pin(async move {
            Ok(self
                .get_state(session_id)
                .await?
                .map(|checkpoint| checkpoint.session.history())
                .unwrap_or_default())
        })
    }
}

/// SQLite-backed checkpoint store using sqlx async pool.
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
    locks: SessionLocks,
}

const CHECKPOINT_SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS checkpoint_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const CHECKPOINT_SCHEMA_VERSION_KEY: &str = "checkpoint_schema_version";
const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

async fn ensure_checkpoint_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CHECKPOINT_SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .context("create checkpoint_schema_meta table")?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM checkpoint_schema_meta WHERE key = $1")
            .bind(CHECKPOINT_SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .context("load checkpoint schema version")?;

    if let Some((value,)) = stored_version {
        let parsed = value
            .parse::<u32>()
            .with_context(|| format!("invalid checkpoint schema version value: {value}"))?;
        if parsed != CHECKPOINT_SCHEMA_VERSION {
            return Err(PersistenceError::Schema(format!(
                "incompatible checkpoint schema version: stored={parsed}, \
                 expected={CHECKPOINT_SCHEMA_VERSION}"
            ))
            .into());
        }
        return Ok(());
    }

    let legacy_table_count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*)
         FROM sqlite_master
         WHERE type = 'table'
           AND name IN ('checkpoints', 'writes')",
    )
    .fetch_one(pool)
    .await
    .context("detect legacy checkpoint tables")?;

    if legacy_table_count.0 > 0 {
        return Err(PersistenceError::Schema(
            "legacy checkpoint database detected without schema version metadata".to_string(),
        )
        .into());
    }

    sqlx::query("INSERT INTO checkpoint_schema_meta (key, value) VALUES ($1, $2)")
        .bind(CHECKPOINT_SCHEMA_VERSION_KEY)
        .bind(CHECKPOINT_SCHEMA_VERSION.to_string())
        .execute(pool)
        .await
        .context("persist checkpoint schema version")?;

    Ok(())
}

impl SqliteCheckpointStore {
    /// Create a store on an existing pool and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self, PersistenceError> {
        Self::migrate(&pool)
            .await
            .map_err(PersistenceError::from_anyhow)?;
        Ok(Self {
            pool,
            locks: SessionLocks::new(),
        })
    }

    /// Open (creating if needed) a database file.
    pub async fn open(path: &Path) -> Result<Self, PersistenceError> {
        let pool = async {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await
                .with_context(|| format!("open checkpoint database {}", path.display()))
        }
        .await
        .map_err(PersistenceError::from_anyhow)?;

        Self::new(pool).await
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        ensure_checkpoint_schema_version(pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                 session_id TEXT PRIMARY KEY,
                 version INTEGER NOT NULL,
                 snapshot TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(pool)
        .await
        .context("create checkpoints table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_checkpoints_updated
                 ON checkpoints(updated_at)",
        )
        .execute(pool)
        .await
        .context("create checkpoints index")?;

        Ok(())
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn current_version(&self, session_id: &str) -> Result<Option<u64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM checkpoints WHERE session_id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await
                .context("query checkpoint version")?;
        row.map(|(version,)| u64::try_from(version).context("negative checkpoint version"))
            .transpose()
    }

    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query("SELECT version, snapshot FROM checkpoints WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .context("query checkpoint by session id")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let version: i64 = row.try_get("version")?;
        let snapshot: String = row.try_get("snapshot")?;
        let session = decode_snapshot(session_id, &snapshot)?;

        Ok(Some(Checkpoint {
            session,
            version: u64::try_from(version).context("negative checkpoint version")?,
        }))
    }

    async fn store(&self, session: &Session, expected_version: Option<u64>) -> Result<u64> {
        let session_id = session.session_id.as_str();
        let snapshot = serde_json::to_string(session).context("serialize session snapshot")?;
        let timestamp = Utc::now().to_rfc3339();

        let (affected, new_version) = match expected_version {
            None => {
                let result = sqlx::query(
                    "INSERT OR IGNORE INTO checkpoints (session_id, version, snapshot, created_at, updated_at)
                     VALUES ($1, 1, $2, $3, $3)",
                )
                .bind(session_id)
                .bind(&snapshot)
                .bind(&timestamp)
                .execute(&self.pool)
                .await
                .context("insert checkpoint")?;
                (result.rows_affected(), 1)
            }
            Some(expected) => {
                let next = expected + 1;
                let result = sqlx::query(
                    "UPDATE checkpoints
                     SET version = $1, snapshot = $2, updated_at = $3
                     WHERE session_id = $4 AND version = $5",
                )
                .bind(i64::try_from(next).context("checkpoint version overflow")?)
                .bind(&snapshot)
                .bind(&timestamp)
                .bind(session_id)
                .bind(i64::try_from(expected).context("checkpoint version overflow")?)
                .execute(&self.pool)
                .await
                .context("update checkpoint")?;
                (result.rows_affected(), next)
            }
        };

        if affected == 0 {
            let found = self.current_version(session_id).await?;
            return Err(PersistenceError::VersionConflict {
                session_id: session_id.to_string(),
                expected: expected_version,
                found,
            }
            .into());
        }

        tracing::debug!(session_id, version = new_version, "checkpoint written");
        Ok(new_version)
    }

    async fn remove(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .context("delete checkpoint")?;
        Ok(result.rows_affected() > 0)
    }

    async fn summaries(&self) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query(
            "SELECT session_id, snapshot, created_at, updated_at
             FROM checkpoints
             ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("list checkpoints")?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            match map_summary_row(row) {
                Ok(summary) => summaries.push(summary),
                Err(error) => {
                    tracing::warn!(error = %format!("{error:#}"), "skipping unreadable checkpoint");
                }
            }
        }
        Ok(summaries)
    }
}

fn decode_snapshot(session_id: &str, snapshot: &str) -> Result<Session> {
    serde_json::from_str::<Session>(snapshot).map_err(|error| {
        PersistenceError::Decode {
            session_id: session_id.to_string(),
            message: error.to_string(),
        }
        .into()
    })
}

fn map_summary_row(row: &SqliteRow) -> Result<SessionSummary> {
    let session_id: String = row.try_get("session_id")?;
    let snapshot: String = row.try_get("snapshot")?;
    let session = decode_snapshot(&session_id, &snapshot)?;

    Ok(SessionSummary {
        messages_count: session.active_count(),
        preview: session.preview(),
        session_id,
        created_at: row.try_get("created_at")?,
        last_activity: row.try_get("updated_at")?,
    })
}

impl CheckpointStore for SqliteCheckpointStore {
    fn get_state<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>, PersistenceError>> + Send + 'a>>
    {
        Box::pin(async move {
            self.load(session_id)
                .await
                .map_err(PersistenceError::from_anyhow)
        })
    }

    fn put_state<'a>(
        &'a self,
        session: &'a Session,
        expected_version: Option<u64>,
    ) -> Pin<Box<dyn Future<Output = Result<u64, PersistenceError>> + Send + 'a>> {
        Box::pin(async move {
            self.store(session, expected_version)
                .await
                .map_err(PersistenceError::from_anyhow)
        })
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, PersistenceError>> + Send + 'a>> {
        Box::pin(async move {
            self.remove(session_id)
                .await
                .map_err(PersistenceError::from_anyhow)
        })
    }

    fn list_sessions(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SessionSummary>, PersistenceError>> + Send + '_>>
    {
        Box::pin(async move {
            self.summaries()
                .await
                .map_err(PersistenceError::from_anyhow)
        })
    }

    fn lock<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = SessionLease> + Send + 'a>> {
        Box::pin(self.locks.acquire(session_id))
    }
}
