#![allow(dead_code)]

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use parley::agent::OrchestratorSettings;
use parley::error::PersistenceError;
use parley::llm::{Provider, ProviderResponse};
use parley::session::{
    ChatService, Checkpoint, CheckpointStore, MessageRole, Session, SessionLease,
    SessionSummary, SqliteCheckpointStore,
};
use parley::session::types::{Message, ToolCall};
use parley::tools::{ToolSpec, default_registry};
use sqlx::sqlite::SqlitePoolOptions;

pub const SUMMARY_TEXT: &str = "The user has been chatting about assorted topics.";

/// Deterministic stand-in for a chat model.
///
/// - summary requests (no tools offered) get [`SUMMARY_TEXT`]
/// - `calculate <expr>` requests a `calculate` tool call
/// - a pending tool result is folded into `The answer is <result>.`
/// - anything else is echoed as `ack: <text>`
#[derive(Default)]
pub struct RuleProvider {
    seen: Mutex<Vec<Vec<Message>>>,
}

impl RuleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summary_requests(&self) -> usize {
        self.seen()
            .iter()
            .filter(|prompt| prompt.len() == 1 && prompt[0].role == MessageRole::User)
            .count()
    }

    fn respond(messages: &[Message], tools: &[ToolSpec]) -> ProviderResponse {
        if tools.is_empty() {
            return ProviderResponse::text_only(SUMMARY_TEXT);
        }

        let Some(last) = messages.last() else {
            return ProviderResponse::text_only("ack:");
        };
        if last.role == MessageRole::Tool {
            return ProviderResponse::text_only(format!("The answer is {}.", last.content));
        }
        if let Some(expression) = last.content.strip_prefix("calculate ") {
            let call = ToolCall::new(
                format!("call_{}", last.sequence),
                "calculate",
                serde_json::json!({ "expression": expression }),
            );
            return ProviderResponse::with_tool_calls("", vec![call]);
        }
        ProviderResponse::text_only(format!("ack: {}", last.content))
    }
}

impl Provider for RuleProvider {
    fn name(&self) -> &str {
        "rules"
    }

    fn invoke<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolSpec],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>> {
        Box::pin(async move {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(messages.to_vec());
            // Yield so concurrent turns interleave.
            tokio::task::yield_now().await;
            Ok(Self::respond(messages, tools))
        })
    }
}

/// Never answers.
pub struct HangingProvider;

impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    fn invoke<'a>(
        &'a self,
        _messages: &'a [Message],
        _tools: &'a [ToolSpec],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>> {
        Box::pin(async move {
            std::future::pending::<()>().await;
            Ok(ProviderResponse::default())
        })
    }
}

/// Delegates reads to an inner store and rejects every write.
pub struct ReadOnlyStore {
    pub inner: Arc<dyn CheckpointStore>,
}

impl CheckpointStore for ReadOnlyStore {
    fn get_state<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>, PersistenceError>> + Send + 'a>>
    {
        self.inner.get_state(session_id)
    }

    fn put_state<'a>(
        &'a self,
        _session: &'a Session,
        _expected_version: Option<u64>,
    ) -> Pin<Box<dyn Future<Output = Result<u64, PersistenceError>> + Send + 'a>> {
        Box::pin(async move { Err(PersistenceError::Backend("disk is read-only".into())) })
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, PersistenceError>> + Send + 'a>> {
        self.inner.delete_session(session_id)
    }

    fn list_sessions(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SessionSummary>, PersistenceError>> + Send + '_>>
    {
        self.inner.list_sessions()
    }

    fn lock<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = SessionLease> + Send + 'a>> {
        self.inner.lock(session_id)
    }
}

pub async fn memory_store() -> Arc<SqliteCheckpointStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool");
    Arc::new(
        SqliteCheckpointStore::new(pool)
            .await
            .expect("checkpoint schema"),
    )
}

pub async fn file_store(path: &Path) -> Arc<SqliteCheckpointStore> {
    Arc::new(
        SqliteCheckpointStore::open(path)
            .await
            .expect("on-disk checkpoint store"),
    )
}

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        summary_threshold: 10,
        messages_to_keep: 2,
        model_timeout: Duration::from_secs(5),
        ..OrchestratorSettings::default()
    }
}

pub fn service_with(
    store: Arc<dyn CheckpointStore>,
    provider: Arc<dyn Provider>,
    settings: OrchestratorSettings,
) -> ChatService {
    ChatService::new(
        store,
        provider,
        Arc::new(default_registry()),
        settings,
        "You are a test assistant.",
    )
}

pub async fn rule_service() -> (ChatService, Arc<RuleProvider>, Arc<SqliteCheckpointStore>) {
    let store = memory_store().await;
    let provider = Arc::new(RuleProvider::new());
    let service = service_with(store.clone(), provider.clone(), settings());
    (service, provider, store)
}
