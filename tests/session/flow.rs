use super::chat_harness;
use parley::error::{ParleyError, ValidationError};
use parley::session::{CheckpointStore, MessageRole};

#[tokio::test]
async fn short_conversation_counts_turns_without_summary() {
    let (service, provider, _store) = chat_harness::rule_service().await;
    assert!(service.initialize_session("flow", None).await.unwrap());

    for i in 1..=4 {
        let reply = service
            .send_message("flow", &format!("message {i}"))
            .await
            .unwrap();
        assert_eq!(reply, format!("ack: message {i}"));
    }

    let info = service.get_session_info("flow").await.unwrap();
    assert!(info.exists);
    assert_eq!(info.messages_since_last_summary, 4);
    assert!(info.summary.is_empty());
    assert_eq!(info.messages_count, 9);
    assert_eq!(provider.summary_requests(), 0);
}

#[tokio::test]
async fn prompt_starts_with_preamble_and_carries_history() {
    let (service, provider, _store) = chat_harness::rule_service().await;
    service.initialize_session("prompt", Some("Be kind.")).await.unwrap();
    service.send_message("prompt", "first").await.unwrap();
    service.send_message("prompt", "second").await.unwrap();

    let prompts = provider.seen();
    let last = prompts.last().unwrap();
    assert_eq!(last[0].role, MessageRole::System);
    assert_eq!(last[1].content, "Be kind.");
    let contents: Vec<&str> = last.iter().skip(2).map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "ack: first", "second"]);
}

#[tokio::test]
async fn history_lists_user_and_assistant_in_order() {
    let (service, _provider, _store) = chat_harness::rule_service().await;
    service.initialize_session("hist", None).await.unwrap();
    service.send_message("hist", "one").await.unwrap();
    service.send_message("hist", "two").await.unwrap();

    let history = service.get_history("hist").await.unwrap();
    let rendered: Vec<(MessageRole, &str)> = history
        .iter()
        .map(|entry| (entry.role, entry.content.as_str()))
        .collect();
    assert_eq!(
        rendered,
        vec![
            (MessageRole::User, "one"),
            (MessageRole::Assistant, "ack: one"),
            (MessageRole::User, "two"),
            (MessageRole::Assistant, "ack: two"),
        ]
    );
}

#[tokio::test]
async fn initialize_twice_leaves_log_untouched() {
    let (service, _provider, store) = chat_harness::rule_service().await;
    assert!(service.initialize_session("twice", None).await.unwrap());
    service.send_message("twice", "hello").await.unwrap();

    let before = store.get_state("twice").await.unwrap().unwrap();
    assert!(!service.initialize_session("twice", None).await.unwrap());
    assert!(!service.initialize_session("twice", Some("new prompt")).await.unwrap());
    let after = store.get_state("twice").await.unwrap().unwrap();

    assert_eq!(before.version, after.version);
    assert_eq!(before.session.log, after.session.log);
}

#[tokio::test]
async fn delete_then_info_reports_missing() {
    let (service, _provider, _store) = chat_harness::rule_service().await;
    service.send_message("gone", "hello").await.unwrap();
    assert!(service.get_session_info("gone").await.unwrap().exists);

    assert!(service.delete_session("gone").await.unwrap());
    let info = service.get_session_info("gone").await.unwrap();
    assert!(!info.exists);
    assert!(!service.delete_session("gone").await.unwrap());
    assert!(service.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn sessions_are_listed_with_previews() {
    let (service, _provider, _store) = chat_harness::rule_service().await;
    service.send_message("alpha", "alpha question").await.unwrap();
    service.send_message("beta", "beta question").await.unwrap();

    let rows = service.list_sessions().await.unwrap();
    assert_eq!(rows.len(), 2);
    let beta = rows.iter().find(|row| row.session_id == "beta").unwrap();
    assert_eq!(beta.messages_count, 3);
    assert_eq!(beta.preview, "beta question");
}

#[tokio::test]
async fn invalid_inputs_are_rejected() {
    let (service, provider, _store) = chat_harness::rule_service().await;

    let err = service.send_message("ok", "").await.unwrap_err();
    assert!(matches!(err, ParleyError::Validation(ValidationError::EmptyMessage)));

    let long_id = "x".repeat(200);
    let err = service.send_message(&long_id, "hi").await.unwrap_err();
    assert!(matches!(
        err,
        ParleyError::Validation(ValidationError::SessionIdTooLong { .. })
    ));

    assert!(provider.seen().is_empty());
}
