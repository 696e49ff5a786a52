use crate::config::Config;
use crate::error::{ModelError, ParleyError, ToolError};
use crate::llm::traits::Provider;
use crate::llm::types::ProviderResponse;
use crate::session::summarizer::SummaryPlan;
use crate::session::types::{Message, MessageRole, Session, ToolCall};
use crate::tools::{ToolRegistry, ToolResult, ToolSpec};
use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

// ── Constants ────────────────────────────────────────────────────────────────

const SUMMARY_PREFIX: &str = "\nConversation summary so far: ";
const GREETING_FILLER: &str = "Hello.";
const EMPTY_REPLY: &str = "I apologize, but I couldn't process your request.";

// ── Public types ─────────────────────────────────────────────────────────────

/// Knobs the turn loop reads on every turn.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub system_preamble: String,
    pub summary_threshold: i64,
    pub messages_to_keep: usize,
    pub max_tool_iterations: u32,
    pub model_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            system_preamble: config.agent.system_preamble.clone(),
            summary_threshold: i64::from(config.memory.summary_threshold),
            messages_to_keep: config.memory.messages_to_keep,
            max_tool_iterations: config.agent.max_tool_iterations,
            model_timeout: Duration::from_secs(config.agent.model_timeout_secs),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened during one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub reply: String,
    /// A model call or the summary failed and `reply` is the error notice.
    pub degraded: bool,
    pub model_calls: u32,
    pub tool_rounds: u32,
    pub summarized: bool,
}

/// Drives one session through a turn: model call, tool rounds, summary.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    settings: OrchestratorSettings,
}

// ── Internal types ───────────────────────────────────────────────────────────

#[derive(Debug)]
enum TurnState {
    CallModel,
    DispatchTools(Vec<ToolCall>),
    SummaryCheck,
    Summarize,
    Done,
}

// ── Implementation ───────────────────────────────────────────────────────────

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            settings,
        }
    }

    /// Append `user_text` and advance the state machine until the turn ends.
    ///
    /// Model and tool failures are folded into the session and the report; a
    /// failed model call or summary turns the reply into an error notice.
    /// A model timeout returns [`ParleyError::ModelTimeout`]; the caller must
    /// then discard `session` instead of persisting it.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        user_text: &str,
    ) -> Result<TurnReport, ParleyError> {
        session.append(Message::user(user_text));

        let specs = self.registry.specs();
        let mut report = TurnReport::default();
        let mut state = TurnState::CallModel;

        loop {
            tracing::debug!(session_id = %session.session_id, state = ?state, "turn state");
            state = match state {
                TurnState::CallModel => self.call_model(session, &specs, &mut report).await?,
                TurnState::DispatchTools(calls) => {
                    self.dispatch_tools(session, &calls, &mut report).await
                }
                TurnState::SummaryCheck => self.summary_check(session),
                TurnState::Summarize => self.summarize(session, &mut report).await,
                TurnState::Done => break,
            };
        }

        if !report.degraded {
            report.reply = session
                .last_assistant_reply()
                .filter(|reply| !reply.trim().is_empty())
                .unwrap_or(EMPTY_REPLY)
                .to_string();
        }

        tracing::info!(
            session_id = %session.session_id,
            model_calls = report.model_calls,
            tool_rounds = report.tool_rounds,
            summarized = report.summarized,
            degraded = report.degraded,
            "turn complete"
        );
        Ok(report)
    }

    /// Messages sent to the model: preamble (with summary), then the active log.
    pub fn build_prompt(&self, session: &Session) -> Vec<Message> {
        let mut preamble = self.settings.system_preamble.clone();
        if !session.summary.is_empty() {
            preamble.push_str(SUMMARY_PREFIX);
            preamble.push_str(&session.summary);
        }

        let mut prompt = Vec::with_capacity(session.log.len() + 2);
        prompt.push(Message::system(preamble));
        prompt.extend(session.active_messages().cloned());

        let anchored = session.active_messages().any(|message| match message.role {
            MessageRole::User | MessageRole::System => true,
            MessageRole::Assistant | MessageRole::Tool => false,
        });
        if !anchored {
            prompt.push(Message::user(GREETING_FILLER));
        }
        prompt
    }

    async fn call_model(
        &self,
        session: &mut Session,
        specs: &[ToolSpec],
        report: &mut TurnReport,
    ) -> Result<TurnState, ParleyError> {
        let prompt = self.build_prompt(session);
        report.model_calls += 1;

        let response: ProviderResponse =
            match self.with_timeout(self.provider.invoke(&prompt, specs)).await? {
                Ok(response) => response,
                Err(error) => {
                    let message = format!("{error:#}");
                    let error = ModelError::Request {
                        provider: self.provider.name().to_string(),
                        message: message.clone(),
                    };
                    tracing::warn!(session_id = %session.session_id, %error, "model call failed");
                    report.degraded = true;
                    report.reply = format!("I encountered an error: {message}");
                    return Ok(TurnState::Done);
                }
            };

        tracing::debug!(
            session_id = %session.session_id,
            tokens = ?response.total_tokens(),
            "model responded"
        );
        let wants_tools = response.has_tool_calls();
        let ProviderResponse {
            content,
            tool_calls,
            ..
        } = response;
        session.record_tools(tool_calls.iter().map(|call| call.name.as_str()));
        session.append(Message::assistant(content, tool_calls.clone()));
        session.messages_since_last_summary += 1;

        if !wants_tools {
            Ok(TurnState::SummaryCheck)
        } else {
            tracing::debug!(
                session_id = %session.session_id,
                requested = tool_calls.len(),
                "model requested tools"
            );
            Ok(TurnState::DispatchTools(tool_calls))
        }
    }

    async fn dispatch_tools(
        &self,
        session: &mut Session,
        calls: &[ToolCall],
        report: &mut TurnReport,
    ) -> TurnState {
        let outcomes = join_all(
            calls
                .iter()
                .map(|call| self.registry.execute(&call.name, call.arguments.clone())),
        )
        .await;

        for (call, outcome) in calls.iter().zip(outcomes) {
            let content = render_tool_outcome(outcome);
            tracing::debug!(
                session_id = %session.session_id,
                tool = %call.name,
                call_id = %call.id,
                "tool finished"
            );
            session.append(Message::tool_result(call, content));
        }
        report.tool_rounds += 1;

        if report.tool_rounds >= self.settings.max_tool_iterations {
            tracing::warn!(
                session_id = %session.session_id,
                rounds = report.tool_rounds,
                "tool round limit reached"
            );
            session.append(Message::assistant(
                format!(
                    "I stopped after {} tool rounds without reaching a final answer.",
                    report.tool_rounds
                ),
                Vec::new(),
            ));
            return TurnState::SummaryCheck;
        }
        TurnState::CallModel
    }

    fn summary_check(&self, session: &Session) -> TurnState {
        if session.messages_since_last_summary >= self.settings.summary_threshold {
            TurnState::Summarize
        } else {
            TurnState::Done
        }
    }

    async fn summarize(&self, session: &mut Session, report: &mut TurnReport) -> TurnState {
        let Some(plan) = SummaryPlan::build(session, self.settings.messages_to_keep) else {
            return TurnState::Done;
        };

        let outcome = match self.with_timeout(self.provider.complete(&plan.prompt)).await {
            Ok(Ok(summary)) if !summary.trim().is_empty() => Ok(summary),
            Ok(Ok(_)) => Err("model returned an empty summary".to_string()),
            Ok(Err(error)) => Err(format!("{error:#}")),
            Err(error) => Err(error.to_string()),
        };

        match outcome {
            Ok(summary) => {
                plan.apply(session, &summary, self.settings.messages_to_keep);
                report.summarized = true;
            }
            Err(message) => {
                let error = ModelError::Request {
                    provider: self.provider.name().to_string(),
                    message: message.clone(),
                };
                tracing::error!(
                    session_id = %session.session_id,
                    %error,
                    "summarization failed; keeping history as is"
                );
                report.degraded = true;
                report.reply = format!("I encountered an error: {message}");
            }
        }
        TurnState::Done
    }

    async fn with_timeout<T>(
        &self,
        future: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<anyhow::Result<T>, ParleyError> {
        tokio::time::timeout(self.settings.model_timeout, future)
            .await
            .map_err(|_| ParleyError::ModelTimeout {
                secs: self.settings.model_timeout.as_secs(),
            })
    }
}

/// Text stored as a tool-result message.
pub fn render_tool_outcome(outcome: Result<ToolResult, ToolError>) -> String {
    match outcome {
        Ok(result) => result.render(),
        Err(ToolError::Execution { message, .. } | ToolError::InvalidArguments { message, .. }) => {
            format!("Error: {message}")
        }
        Err(error @ ToolError::NotFound { .. }) => format!("Error: {error}"),
    }
}
