//! Generic OpenAI-compatible provider.
//! Speaks `/chat/completions` with function tools, which covers OpenAI,
//! Ollama, vLLM, LM Studio and most hosted gateways.

mod types;

use super::traits::Provider;
use super::types::ProviderResponse;
use crate::session::types::{Message, MessageRole, ToolCall, truncate_chars};
use crate::tools::ToolSpec;
use anyhow::Context;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use types::{
    ChatMessage, ChatRequest, ChatResponse, OpenAiTool, OpenAiToolCall, OpenAiToolCallFunction,
    OpenAiToolDefinition,
};

const ERROR_BODY_EXCERPT_CHARS: usize = 200;

pub struct CompatibleProvider {
    name: String,
    model: String,
    temperature: f64,
    /// Pre-computed `"Bearer <key>"` header value.
    cached_auth_header: Option<String>,
    /// Pre-computed chat completions URL.
    cached_chat_url: String,
    client: Client,
}

pub fn build_provider_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl CompatibleProvider {
    pub fn new(
        name: &str,
        base_url: &str,
        api_key: Option<&str>,
        model: &str,
        temperature: f64,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let cached_chat_url = if base_url.ends_with("chat/completions") {
            base_url.to_string()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            name: name.to_string(),
            model: model.to_string(),
            temperature,
            cached_auth_header: api_key
                .filter(|key| !key.trim().is_empty())
                .map(|key| format!("Bearer {key}")),
            cached_chat_url,
            client: build_provider_client(120),
        }
    }

    /// Replace the HTTP client, e.g. to align its timeout with the agent's.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn chat_completions_url(&self) -> &str {
        &self.cached_chat_url
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolSpec]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(map_message).collect(),
            temperature: self.temperature,
            tools: build_openai_tools(tools),
        }
    }

    async fn call_api(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        let mut builder = self.client.post(&self.cached_chat_url).json(request);
        if let Some(auth) = &self.cached_auth_header {
            builder = builder.header("Authorization", auth);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| anyhow::anyhow!("{} request failed: {error}", self.name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
            anyhow::bail!(
                "{} API error ({status}): {}",
                self.name,
                truncate_chars(body.trim(), ERROR_BODY_EXCERPT_CHARS)
            );
        }

        response
            .json()
            .await
            .with_context(|| format!("{} response JSON decode failed", self.name))
    }
}

fn map_message(message: &Message) -> ChatMessage {
    match message.role {
        MessageRole::System => text_message("system", &message.content),
        MessageRole::User => text_message("user", &message.content),
        MessageRole::Assistant => {
            let tool_calls: Vec<OpenAiToolCall> = message
                .tool_calls
                .iter()
                .map(|call| OpenAiToolCall {
                    id: call.id.clone(),
                    r#type: "function".to_string(),
                    function: OpenAiToolCallFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect();
            ChatMessage {
                role: "assistant",
                content: if message.content.is_empty() && !tool_calls.is_empty() {
                    None
                } else {
                    Some(message.content.clone())
                },
                tool_call_id: None,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            }
        }
        MessageRole::Tool => ChatMessage {
            role: "tool",
            content: Some(message.content.clone()),
            tool_call_id: message.tool_call_id.clone(),
            tool_calls: None,
        },
    }
}

fn text_message(role: &'static str, content: &str) -> ChatMessage {
    ChatMessage {
        role,
        content: Some(content.to_string()),
        tool_call_id: None,
        tool_calls: None,
    }
}

fn build_openai_tools(tools: &[ToolSpec]) -> Option<Vec<OpenAiTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|tool| OpenAiTool {
                r#type: "function",
                function: OpenAiToolDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect(),
    )
}

fn parse_tool_calls(
    tool_calls: Option<Vec<OpenAiToolCall>>,
    provider_name: &str,
) -> anyhow::Result<Vec<ToolCall>> {
    tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tool_call| {
            let raw = tool_call.function.arguments.trim();
            let arguments: Value = if raw.is_empty() {
                Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(raw).with_context(|| {
                    format!(
                        "{provider_name} tool call arguments were not valid JSON for {}",
                        tool_call.function.name
                    )
                })?
            };
            Ok(ToolCall::new(
                tool_call.id,
                tool_call.function.name,
                arguments,
            ))
        })
        .collect()
}

fn build_provider_response(
    chat_response: ChatResponse,
    provider_name: &str,
) -> anyhow::Result<ProviderResponse> {
    let ChatResponse {
        choices,
        usage,
        model,
    } = chat_response;
    let choice = choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No response from {provider_name}"))?;

    let tool_calls = parse_tool_calls(choice.message.tool_calls, provider_name)?;
    let mut response = ProviderResponse::with_tool_calls(
        choice.message.content.unwrap_or_default(),
        tool_calls,
    );
    if let Some(usage) = usage {
        response = response.with_usage(usage.prompt_tokens, usage.completion_tokens);
    }
    if let Some(model) = model {
        response = response.with_model(model);
    }
    Ok(response)
}

impl Provider for CompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolSpec],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>> {
        Box::pin(async move {
            let request = self.build_request(messages, tools);
            let chat_response = self.call_api(&request).await?;
            build_provider_response(chat_response, &self.name)
        })
    }
}
