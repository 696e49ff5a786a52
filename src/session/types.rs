use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

/// Characters of the first user message shown in session listings.
pub const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One entry of a session log.
///
/// `id` is assigned once and never changes. `sequence` is the position the
/// session assigned on append; messages that were never appended (prompt-only
/// preambles) keep `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub sequence: u64,
    pub created_at: String,
}

impl Message {
    fn fresh(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            sequence: 0,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::fresh(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::fresh(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::fresh(MessageRole::Assistant, content)
        }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.name.clone()),
            ..Self::fresh(MessageRole::Tool, content)
        }
    }
}

/// Logical deletion marker. The referenced message stays in the raw log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalDirective {
    pub message_id: String,
    pub issued_at: String,
}

impl RemovalDirective {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            issued_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub exists: bool,
    pub summary: String,
    pub messages_count: usize,
    pub messages_since_last_summary: i64,
    pub tools_used: Vec<String>,
    pub preferences: BTreeMap<String, Value>,
}

impl SessionInfo {
    pub fn missing(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            exists: false,
            summary: String::new(),
            messages_count: 0,
            messages_since_last_summary: 0,
            tools_used: Vec::new(),
            preferences: BTreeMap::new(),
        }
    }
}

/// Listing row returned by `list_sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub messages_count: usize,
    pub preview: String,
    pub created_at: String,
    pub last_activity: String,
}

/// Partial update merged into the latest snapshot by `update_state`.
///
/// Preference entries set to `Value::Null` remove the key.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub summary: Option<String>,
    pub messages_since_last_summary: Option<i64>,
    pub append: Vec<Message>,
    pub removals: Vec<RemovalDirective>,
    pub tools_invoked: Vec<String>,
    pub preferences: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub log: Vec<Message>,
    #[serde(default)]
    pub tombstones: Vec<RemovalDirective>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub messages_since_last_summary: i64,
    #[serde(default)]
    pub tools_invoked: BTreeSet<String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, Value>,
    #[serde(default)]
    pub next_sequence: u64,
    pub created_at: String,
    pub updated_at: String,
}

/// A session snapshot together with the version it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub session: Session,
    pub version: u64,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            session_id: session_id.into(),
            log: Vec::new(),
            tombstones: Vec::new(),
            summary: String::new(),
            messages_since_last_summary: 0,
            tools_invoked: BTreeSet::new(),
            preferences: BTreeMap::new(),
            next_sequence: 1,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Append a message, assigning the next sequence position.
    ///
    /// Ids already present in the raw log (tombstoned or not) are replaced
    /// with a fresh one so an id is never reused within a session.
    pub fn append(&mut self, mut message: Message) -> &Message {
        while self.log.iter().any(|existing| existing.id == message.id) {
            tracing::debug!(
                session_id = %self.session_id,
                duplicate_id = %message.id,
                "reissuing duplicate message id"
            );
            message.id = Uuid::new_v4().to_string();
        }
        // A fresh session deserialized from an older snapshot may carry 0.
        self.next_sequence = self.next_sequence.max(1);
        message.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.updated_at = Utc::now().to_rfc3339();
        self.log.push(message);
        &self.log[self.log.len() - 1]
    }

    pub fn is_removed(&self, message_id: &str) -> bool {
        self.tombstones
            .iter()
            .any(|directive| directive.message_id == message_id)
    }

    /// Apply removal directives; unknown or already-removed ids are skipped.
    /// Returns how many messages were newly tombstoned.
    pub fn apply_removals(&mut self, directives: Vec<RemovalDirective>) -> usize {
        let mut applied = 0;
        for directive in directives {
            let known = self.log.iter().any(|m| m.id == directive.message_id);
            if !known || self.is_removed(&directive.message_id) {
                continue;
            }
            self.tombstones.push(directive);
            applied += 1;
        }
        if applied > 0 {
            self.updated_at = Utc::now().to_rfc3339();
        }
        applied
    }

    /// Messages not covered by a tombstone, in log order.
    pub fn active_messages(&self) -> impl Iterator<Item = &Message> + '_ {
        let removed: HashSet<&str> = self
            .tombstones
            .iter()
            .map(|directive| directive.message_id.as_str())
            .collect();
        self.log
            .iter()
            .filter(move |message| !removed.contains(message.id.as_str()))
    }

    pub fn active_count(&self) -> usize {
        self.active_messages().count()
    }

    /// User and assistant messages that are still visible.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.active_messages()
            .filter(|message| match message.role {
                MessageRole::User | MessageRole::Assistant => true,
                MessageRole::System | MessageRole::Tool => false,
            })
            .map(|message| HistoryEntry {
                role: message.role,
                content: message.content.clone(),
                timestamp: message.created_at.clone(),
            })
            .collect()
    }

    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.active_messages()
            .filter(|message| message.role == MessageRole::Assistant)
            .last()
            .map(|message| message.content.as_str())
    }

    /// Title shown in listings: the first visible user message.
    pub fn preview(&self) -> String {
        let history = self.history();
        if history.is_empty() {
            return "Empty Chat".to_string();
        }
        history
            .iter()
            .find(|entry| entry.role == MessageRole::User)
            .map_or_else(
                || "New Chat".to_string(),
                |entry| truncate_chars(&entry.content, PREVIEW_CHARS),
            )
    }

    pub fn record_tools<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.tools_invoked.insert(name.to_string());
        }
    }

    pub fn apply_patch(&mut self, patch: SessionPatch) {
        if let Some(summary) = patch.summary {
            self.summary = summary;
        }
        if let Some(counter) = patch.messages_since_last_summary {
            self.messages_since_last_summary = counter;
        }
        for message in patch.append {
            self.append(message);
        }
        self.apply_removals(patch.removals);
        self.record_tools(patch.tools_invoked.iter().map(String::as_str));
        for (key, value) in patch.preferences {
            if value.is_null() {
                self.preferences.remove(&key);
            } else {
                self.preferences.insert(key, value);
            }
        }
        self.updated_at = Utc::now().to_rfc3339();
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            exists: true,
            summary: self.summary.clone(),
            messages_count: self.active_count(),
            messages_since_last_summary: self.messages_since_last_summary,
            tools_used: self.tools_invoked.iter().cloned().collect(),
            preferences: self.preferences.clone(),
        }
    }
}

/// Cut `text` to `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
