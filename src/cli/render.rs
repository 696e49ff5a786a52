use crate::session::types::{HistoryEntry, MessageRole, SessionInfo, SessionSummary};
use console::style;
use std::fmt::Write as _;

/// Styled `role: content` label for one transcript line.
fn role_label(role: MessageRole) -> String {
    match role {
        MessageRole::User => style("You").cyan().bold().to_string(),
        MessageRole::Assistant => style("Assistant").green().bold().to_string(),
        MessageRole::System => style("System").dim().to_string(),
        MessageRole::Tool => style("Tool").yellow().to_string(),
    }
}

pub fn reply(text: &str) -> String {
    format!("{}: {text}", role_label(MessageRole::Assistant))
}

pub fn error(text: impl std::fmt::Display) -> String {
    format!("{} {text}", style("error:").red().bold())
}

pub fn banner(session_id: &str) -> String {
    format!(
        "{} {}\n{}",
        style("parley").white().bold(),
        style(format!("session {session_id}")).dim(),
        style("Type /help for commands, 'exit' to leave.").dim()
    )
}

/// Render the last `limit` entries (all when `None`).
pub fn history(entries: &[HistoryEntry], limit: Option<usize>) -> String {
    if entries.is_empty() {
        return style("No messages yet.").dim().to_string();
    }
    let skip = limit.map_or(0, |limit| entries.len().saturating_sub(limit));
    let mut out = String::new();
    for entry in &entries[skip..] {
        let _ = writeln!(
            out,
            "{} {}: {}",
            style(&entry.timestamp).dim(),
            role_label(entry.role),
            entry.content
        );
    }
    out.trim_end().to_string()
}

pub fn info(info: &SessionInfo) -> String {
    if !info.exists {
        return format!(
            "{} {}",
            style(&info.session_id).green(),
            style("does not exist").dim()
        );
    }

    let summary = if info.summary.is_empty() {
        style("(none)").dim().to_string()
    } else {
        info.summary.clone()
    };
    let tools = if info.tools_used.is_empty() {
        style("(none)").dim().to_string()
    } else {
        info.tools_used.join(", ")
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}   {}", style("session").cyan(), style(&info.session_id).green());
    let _ = writeln!(out, "{}  {}", style("messages").cyan(), info.messages_count);
    let _ = writeln!(
        out,
        "{}    {}",
        style("pending").cyan(),
        info.messages_since_last_summary
    );
    let _ = writeln!(out, "{}     {tools}", style("tools").cyan());
    for (key, value) in &info.preferences {
        let _ = writeln!(out, "{}      {key} = {value}", style("pref").cyan());
    }
    let _ = write!(out, "{}   {summary}", style("summary").cyan());
    out
}

pub fn sessions(rows: &[SessionSummary]) -> String {
    if rows.is_empty() {
        return style("No sessions stored.").dim().to_string();
    }
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{}  {} {}  {}",
            style(&row.session_id).green(),
            style(format!("{} msgs", row.messages_count)).dim(),
            style(&row.last_activity).dim(),
            row.preview
        );
    }
    out.trim_end().to_string()
}
