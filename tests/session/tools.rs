use super::chat_harness;
use parley::session::{CheckpointStore, MessageRole};

#[tokio::test]
async fn calculator_result_reaches_the_reply() {
    let (service, provider, store) = chat_harness::rule_service().await;
    let reply = service.send_message("math", "calculate 15 * 23").await.unwrap();
    assert_eq!(reply, "The answer is Result: 345.");

    let checkpoint = store.get_state("math").await.unwrap().unwrap();
    let log = &checkpoint.session.log;
    let roles: Vec<MessageRole> = log.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant,
        ]
    );

    let call = &log[2].tool_calls[0];
    assert_eq!(call.name, "calculate");
    assert_eq!(call.arguments["expression"], "15 * 23");
    assert_eq!(log[3].tool_call_id.as_deref(), Some(call.id.as_str()));
    assert_eq!(log[3].content, "Result: 345");

    let info = service.get_session_info("math").await.unwrap();
    assert_eq!(info.tools_used, vec!["calculate".to_string()]);
    assert_eq!(info.messages_since_last_summary, 2);

    // The second model call saw the tool result.
    let prompts = provider.seen();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[1].last().unwrap().role, MessageRole::Tool);
}

#[tokio::test]
async fn tool_failure_is_reported_to_the_model() {
    let (service, _provider, _store) = chat_harness::rule_service().await;
    let reply = service
        .send_message("math", "calculate import os")
        .await
        .unwrap();
    assert_eq!(
        reply,
        "The answer is Error: Invalid characters in expression."
    );
}

#[tokio::test]
async fn tool_rounds_count_toward_summary_threshold() {
    let (service, provider, _store) = chat_harness::rule_service().await;
    for i in 1..=5 {
        service
            .send_message("busy", &format!("calculate {i} + {i}"))
            .await
            .unwrap();
    }

    // Two model responses per tool turn.
    assert_eq!(provider.summary_requests(), 1);
    let info = service.get_session_info("busy").await.unwrap();
    assert_eq!(info.messages_since_last_summary, -8);
    assert_eq!(info.summary, chat_harness::SUMMARY_TEXT);
}
