use super::traits::{Tool, ToolResult, required_str};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;

/// Placeholder for long-term memory lookup; always reports no matches.
pub struct MemorySearchTool;

impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "search_memory"
    }

    fn description(&self) -> &str {
        "Search through conversation memory for relevant information."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords or phrase to search for in memory"
                }
            },
            "required": ["query"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            let query = required_str(&args, "query")?;
            Ok(ToolResult::ok(format!(
                "Memory search results for '{query}': No relevant memories found yet."
            )))
        })
    }
}
