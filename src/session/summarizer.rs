use super::types::{Message, MessageRole, RemovalDirective, Session};
use std::collections::HashSet;

const FIRST_SUMMARY_HEADER: &str =
    "Please create a concise summary of the following conversation, capturing the key points discussed:\n";
const EXTEND_SUMMARY_HEADER: &str = "Please extend this summary with the new conversation excerpts below. \
The existing summary captures the essence of discussions prior to these new excerpts. \
Focus on integrating the new information seamlessly.\n";

/// Compaction plan for one session: the prompt to send and the messages
/// to hide once the model has produced the new summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPlan {
    pub prompt: String,
    /// Ids to tombstone, oldest first.
    pub prune: Vec<String>,
    /// Number of messages that went into the excerpt block.
    pub collected: usize,
}

impl SummaryPlan {
    /// Build the plan from the session's current active log.
    ///
    /// Returns `None` when there is nothing to summarize.
    pub fn build(session: &Session, keep: usize) -> Option<Self> {
        let collected: Vec<&Message> = session
            .active_messages()
            .filter(|message| is_summarizable(message.role))
            .collect();
        if collected.is_empty() {
            return None;
        }

        let prompt = build_prompt(&session.summary, &collected);

        let pruned_count = collected.len().saturating_sub(keep);
        let mut prune: Vec<String> = collected[..pruned_count]
            .iter()
            .map(|message| message.id.clone())
            .collect();

        // Tool results answering a pruned request would otherwise dangle.
        let pruned_call_ids: HashSet<&str> = collected[..pruned_count]
            .iter()
            .flat_map(|message| message.tool_calls.iter().map(|call| call.id.as_str()))
            .collect();
        if !pruned_call_ids.is_empty() {
            prune.extend(
                session
                    .active_messages()
                    .filter(|message| {
                        message.role == MessageRole::Tool
                            && message
                                .tool_call_id
                                .as_deref()
                                .is_some_and(|id| pruned_call_ids.contains(id))
                    })
                    .map(|message| message.id.clone()),
            );
        }

        Some(Self {
            prompt,
            prune,
            collected: collected.len(),
        })
    }

    pub fn removals(&self) -> Vec<RemovalDirective> {
        self.prune.iter().cloned().map(RemovalDirective::new).collect()
    }

    /// Install the model's summary and prune the log.
    ///
    /// The counter becomes `keep - before`, where `before` is its value at
    /// the moment the block was summarized. It may go negative.
    pub fn apply(&self, session: &mut Session, new_summary: &str, keep: usize) -> usize {
        let before = session.messages_since_last_summary;
        session.summary = new_summary.trim().to_string();
        let removed = session.apply_removals(self.removals());
        session.messages_since_last_summary = counter_after_summary(keep, before);
        tracing::info!(
            session_id = %session.session_id,
            collected = self.collected,
            removed,
            counter = session.messages_since_last_summary,
            "conversation summarized"
        );
        removed
    }
}

fn is_summarizable(role: MessageRole) -> bool {
    match role {
        MessageRole::System | MessageRole::User | MessageRole::Assistant => true,
        MessageRole::Tool => false,
    }
}

fn excerpt_line(message: &Message) -> Option<String> {
    let label = match message.role {
        MessageRole::User => "Human",
        MessageRole::Assistant => "AI",
        MessageRole::System => "System",
        MessageRole::Tool => return None,
    };
    Some(format!("{label}: {}", message.content))
}

/// Compaction prompt for `messages` on top of `existing_summary`.
pub fn build_prompt(existing_summary: &str, messages: &[&Message]) -> String {
    let excerpts = messages
        .iter()
        .filter_map(|message| excerpt_line(message))
        .collect::<Vec<_>>()
        .join("\n");

    if existing_summary.is_empty() {
        format!("{FIRST_SUMMARY_HEADER}{excerpts}")
    } else {
        format!(
            "{EXTEND_SUMMARY_HEADER}\nPrevious Summary:\n{existing_summary}\n\nNew Excerpts to Incorporate:\n{excerpts}"
        )
    }
}

pub fn counter_after_summary(keep: usize, before: i64) -> i64 {
    i64::try_from(keep)
        .unwrap_or(i64::MAX)
        .saturating_sub(before)
}
