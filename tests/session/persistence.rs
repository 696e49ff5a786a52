use super::chat_harness::{self, HangingProvider, ReadOnlyStore, RuleProvider};
use parley::agent::OrchestratorSettings;
use parley::error::{ParleyError, PersistenceError};
use parley::llm::{Provider, ProviderResponse};
use parley::session::types::Message;
use parley::session::{CheckpointStore, MessageRole};
use parley::tools::ToolSpec;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct FailingProvider;

impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn invoke<'a>(
        &'a self,
        _messages: &'a [Message],
        _tools: &'a [ToolSpec],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>> {
        Box::pin(async move { anyhow::bail!("connection refused") })
    }
}

/// Answers chat turns but fails every summary request.
struct SummaryFailingProvider;

impl Provider for SummaryFailingProvider {
    fn name(&self) -> &str {
        "summary-failing"
    }

    fn invoke<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolSpec],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>> {
        Box::pin(async move {
            if tools.is_empty() {
                anyhow::bail!("summarizer down");
            }
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ProviderResponse::text_only(format!("ack: {last}")))
        })
    }
}

#[tokio::test]
async fn summary_failure_degrades_reply_but_persists_turn() {
    let store = chat_harness::memory_store().await;
    let service = chat_harness::service_with(
        store.clone(),
        Arc::new(SummaryFailingProvider),
        chat_harness::settings(),
    );

    for i in 1..=9 {
        let reply = service
            .send_message("fragile", &format!("turn {i}"))
            .await
            .unwrap();
        assert_eq!(reply, format!("ack: turn {i}"));
    }
    let reply = service.send_message("fragile", "turn 10").await.unwrap();
    assert_eq!(reply, "I encountered an error: summarizer down");

    let checkpoint = store.get_state("fragile").await.unwrap().unwrap();
    let session = &checkpoint.session;
    assert_eq!(session.log.len(), 21);
    assert!(session.tombstones.is_empty());
    assert!(session.summary.is_empty());
    assert_eq!(session.messages_since_last_summary, 10);
    assert_eq!(session.last_assistant_reply(), Some("ack: turn 10"));
}

#[tokio::test]
async fn sessions_survive_a_restart() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("data").join("parley.db");

    {
        let store = chat_harness::file_store(&db_path).await;
        let service = chat_harness::service_with(
            store.clone(),
            Arc::new(RuleProvider::new()),
            chat_harness::settings(),
        );
        service.initialize_session("durable", None).await.unwrap();
        service.send_message("durable", "remember me").await.unwrap();
        store.pool().close().await;
    }

    let store = chat_harness::file_store(&db_path).await;
    let service = chat_harness::service_with(
        store.clone(),
        Arc::new(RuleProvider::new()),
        chat_harness::settings(),
    );

    let history = service.get_history("durable").await.unwrap();
    let contents: Vec<&str> = history.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, vec!["remember me", "ack: remember me"]);
    assert!(!service.initialize_session("durable", None).await.unwrap());

    service.send_message("durable", "still here?").await.unwrap();
    let checkpoint = store.get_state("durable").await.unwrap().unwrap();
    assert_eq!(checkpoint.session.log.len(), 5);
    assert_eq!(checkpoint.session.log[4].sequence, 5);
}

#[tokio::test]
async fn model_timeout_discards_the_turn() {
    let store = chat_harness::memory_store().await;
    let service = chat_harness::service_with(
        store.clone(),
        Arc::new(HangingProvider),
        OrchestratorSettings {
            model_timeout: Duration::from_millis(50),
            ..chat_harness::settings()
        },
    );
    service.initialize_session("slow", None).await.unwrap();

    let err = service.send_message("slow", "are you there?").await.unwrap_err();
    assert!(matches!(err, ParleyError::ModelTimeout { .. }));
    assert!(err.is_retryable());

    let checkpoint = store.get_state("slow").await.unwrap().unwrap();
    assert_eq!(checkpoint.session.log.len(), 1);
    assert_eq!(checkpoint.session.log[0].role, MessageRole::System);
}

#[tokio::test]
async fn model_failure_yields_degraded_reply_and_keeps_user_message() {
    let store = chat_harness::memory_store().await;
    let service = chat_harness::service_with(
        store.clone(),
        Arc::new(FailingProvider),
        chat_harness::settings(),
    );

    let reply = service.send_message("flaky", "hello").await.unwrap();
    assert!(reply.starts_with("I encountered an error: "));
    assert!(reply.contains("connection refused"));

    let checkpoint = store.get_state("flaky").await.unwrap().unwrap();
    let log = &checkpoint.session.log;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, MessageRole::System);
    assert_eq!(log[1].content, "hello");
    assert_eq!(checkpoint.session.messages_since_last_summary, 0);
}

#[tokio::test]
async fn persistence_failure_surfaces_to_caller() {
    let inner = chat_harness::memory_store().await;
    let store = Arc::new(ReadOnlyStore { inner });
    let service = chat_harness::service_with(
        store,
        Arc::new(RuleProvider::new()),
        chat_harness::settings(),
    );

    let err = service.send_message("locked", "hello").await.unwrap_err();
    assert!(matches!(
        err,
        ParleyError::Persistence(PersistenceError::Backend(ref message)) if message.contains("read-only")
    ));
    assert!(!service.get_session_info("locked").await.unwrap().exists);
}
