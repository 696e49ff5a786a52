use super::types::ProviderResponse;
use crate::session::types::Message;
use crate::tools::ToolSpec;
use std::future::Future;
use std::pin::Pin;

/// The model service: takes a prompt, returns content and optional tool calls.
pub trait Provider: Send + Sync {
    /// Provider identifier used in logs and errors.
    fn name(&self) -> &str;

    fn invoke<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolSpec],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>>;

    /// Single-prompt completion without tools.
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let messages = [Message::user(prompt)];
            let response = self.invoke(&messages, &[]).await?;
            Ok(response.content)
        })
    }
}
