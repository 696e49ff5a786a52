use super::traits::{Tool, ToolResult};
use chrono::Local;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reports the local wall-clock time.
pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    fn execute<'a>(
        &'a self,
        _args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move { Ok(ToolResult::ok(Local::now().format(TIME_FORMAT).to_string())) })
    }
}
