use super::chat_harness;
use futures_util::future::join_all;
use parley::session::{CheckpointStore, MessageRole};
use std::collections::HashSet;

#[tokio::test]
async fn concurrent_sends_serialize_per_session() {
    let (service, _provider, store) = chat_harness::rule_service().await;

    let sends = (0..8).map(|i| {
        let service = &service;
        async move { service.send_message("shared", &format!("msg {i}")).await }
    });
    let replies = join_all(sends).await;
    for (i, reply) in replies.into_iter().enumerate() {
        assert_eq!(reply.unwrap(), format!("ack: msg {i}"));
    }

    let checkpoint = store.get_state("shared").await.unwrap().unwrap();
    let log = &checkpoint.session.log;
    assert_eq!(log.len(), 17);
    assert_eq!(log[0].role, MessageRole::System);

    let sequences: Vec<u64> = log.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, (1..=17).collect::<Vec<u64>>());
    let ids: HashSet<&str> = log.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 17);

    // Turns never interleave: every user message is followed by its own reply.
    for pair in log[1..].chunks(2) {
        assert_eq!(pair[0].role, MessageRole::User);
        assert_eq!(pair[1].role, MessageRole::Assistant);
        assert_eq!(pair[1].content, format!("ack: {}", pair[0].content));
    }

    let info = service.get_session_info("shared").await.unwrap();
    assert_eq!(info.messages_since_last_summary, 8);
}

#[tokio::test]
async fn separate_sessions_do_not_block_each_other() {
    let (service, _provider, _store) = chat_harness::rule_service().await;

    let sends = ["left", "right", "center"].map(|id| {
        let service = &service;
        async move { service.send_message(id, "hello").await }
    });
    for reply in join_all(sends).await {
        assert_eq!(reply.unwrap(), "ack: hello");
    }
    assert_eq!(service.list_sessions().await.unwrap().len(), 3);
}
