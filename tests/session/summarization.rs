use super::chat_harness::{self, SUMMARY_TEXT};
use parley::session::{CheckpointStore, MessageRole};

#[tokio::test]
async fn tenth_turn_summarizes_and_keeps_two_messages() {
    let (service, provider, store) = chat_harness::rule_service().await;
    service.initialize_session("long", None).await.unwrap();

    for i in 1..=9 {
        service
            .send_message("long", &format!("message {i}"))
            .await
            .unwrap();
    }
    let info = service.get_session_info("long").await.unwrap();
    assert_eq!(info.messages_since_last_summary, 9);
    assert!(info.summary.is_empty());

    let reply = service.send_message("long", "message 10").await.unwrap();
    assert_eq!(reply, "ack: message 10");
    assert_eq!(provider.summary_requests(), 1);

    let info = service.get_session_info("long").await.unwrap();
    assert_eq!(info.summary, SUMMARY_TEXT);
    assert_eq!(info.messages_count, 2);
    assert_eq!(info.messages_since_last_summary, 2 - 10);

    let checkpoint = store.get_state("long").await.unwrap().unwrap();
    assert_eq!(checkpoint.session.log.len(), 21);
    assert_eq!(checkpoint.session.tombstones.len(), 19);

    let history = service.get_history("long").await.unwrap();
    let contents: Vec<&str> = history.iter().map(|entry| entry.content.as_str()).collect();
    assert_eq!(contents, vec!["message 10", "ack: message 10"]);
}

#[tokio::test]
async fn summary_request_lists_pruned_conversation() {
    let (service, provider, _store) = chat_harness::rule_service().await;
    for i in 1..=10 {
        service
            .send_message("digest", &format!("topic {i}"))
            .await
            .unwrap();
    }

    let request = provider
        .seen()
        .into_iter()
        .find(|prompt| prompt.len() == 1)
        .expect("summary request");
    let text = &request[0].content;
    assert!(text.contains("topic 1"));
    assert!(text.contains("ack: topic 9"));
}

#[tokio::test]
async fn summary_is_carried_in_the_next_prompt() {
    let (service, provider, _store) = chat_harness::rule_service().await;
    for i in 1..=10 {
        service
            .send_message("carry", &format!("turn {i}"))
            .await
            .unwrap();
    }
    service.send_message("carry", "after summary").await.unwrap();

    let prompts = provider.seen();
    let last = prompts.last().unwrap();
    assert_eq!(last[0].role, MessageRole::System);
    assert!(last[0].content.contains("Conversation summary so far: "));
    assert!(last[0].content.ends_with(SUMMARY_TEXT));

    let visible: Vec<&str> = last.iter().skip(1).map(|m| m.content.as_str()).collect();
    assert_eq!(visible, vec!["turn 10", "ack: turn 10", "after summary"]);

    let info = service.get_session_info("carry").await.unwrap();
    assert_eq!(info.messages_since_last_summary, -7);
}

#[tokio::test]
async fn second_summary_waits_for_counter_to_recover() {
    let (service, provider, _store) = chat_harness::rule_service().await;
    for i in 1..=27 {
        service
            .send_message("again", &format!("turn {i}"))
            .await
            .unwrap();
    }
    assert_eq!(provider.summary_requests(), 1);

    service.send_message("again", "turn 28").await.unwrap();
    assert_eq!(provider.summary_requests(), 2);
    let info = service.get_session_info("again").await.unwrap();
    assert_eq!(info.messages_count, 2);
    assert_eq!(info.messages_since_last_summary, -8);
}

#[tokio::test]
async fn first_send_without_initialize_gets_system_prompt() {
    let (service, _provider, store) = chat_harness::rule_service().await;
    for i in 1..=10 {
        service
            .send_message("implicit", &format!("turn {i}"))
            .await
            .unwrap();
    }

    let checkpoint = store.get_state("implicit").await.unwrap().unwrap();
    let session = &checkpoint.session;
    assert_eq!(session.log[0].role, MessageRole::System);
    assert_eq!(session.log[0].content, "You are a test assistant.");
    assert_eq!(session.log.len(), 21);
    assert_eq!(session.tombstones.len(), 19);
    assert_eq!(session.active_count(), 2);
}
