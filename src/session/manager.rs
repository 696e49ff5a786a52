use super::store::CheckpointStore;
use super::types::{
    HistoryEntry, Message, Session, SessionInfo, SessionPatch, SessionSummary,
};
use crate::agent::{Orchestrator, OrchestratorSettings};
use crate::config::Config;
use crate::error::{ParleyError, Result, ValidationError};
use crate::llm::traits::Provider;
use crate::tools::ToolRegistry;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_SESSION_ID_LEN: usize = 128;

/// Session API used by front-ends: one call per user action.
pub struct ChatService {
    store: Arc<dyn CheckpointStore>,
    orchestrator: Orchestrator,
    default_system_prompt: String,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        settings: OrchestratorSettings,
        default_system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            store,
            orchestrator: Orchestrator::new(provider, registry, settings),
            default_system_prompt: default_system_prompt.into(),
        }
    }

    pub fn from_config(
        store: Arc<dyn CheckpointStore>,
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        config: &Config,
    ) -> Self {
        Self::new(
            store,
            provider,
            registry,
            OrchestratorSettings::from_config(config),
            config.agent.default_system_prompt.clone(),
        )
    }

    /// Generate a fresh `<prefix>_<8 hex>` session id.
    pub fn new_session_id(prefix: &str) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("{prefix}_{}", &hex[..8])
    }

    /// Store the opening system message of a new session.
    ///
    /// Returns `false` without touching anything when the session already
    /// has messages.
    pub async fn initialize_session(
        &self,
        session_id: &str,
        system_prompt: Option<&str>,
    ) -> Result<bool> {
        validate_session_id(session_id)?;
        let _lease = self.store.lock(session_id).await;

        let (mut session, expected_version) = match self.store.get_state(session_id).await? {
            Some(checkpoint) if !checkpoint.session.is_empty() => {
                tracing::debug!(session_id, "session already initialized");
                return Ok(false);
            }
            Some(checkpoint) => (checkpoint.session, Some(checkpoint.version)),
            None => (Session::new(session_id), None),
        };

        let prompt = system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or(&self.default_system_prompt);
        session.append(Message::system(prompt));
        self.store.put_state(&session, expected_version).await?;

        tracing::info!(session_id, "session initialized");
        Ok(true)
    }

    /// Run one turn and return the assistant's reply.
    ///
    /// A session with no messages yet is first given the default system
    /// prompt, as `initialize_session` would. Turns on the same session are
    /// serialized by the store's lease. A model timeout abandons the turn
    /// without writing anything.
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<String> {
        validate_session_id(session_id)?;
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let _lease = self.store.lock(session_id).await;
        let (mut session, expected_version) = match self.store.get_state(session_id).await? {
            Some(checkpoint) => (checkpoint.session, Some(checkpoint.version)),
            None => (Session::new(session_id), None),
        };
        if session.is_empty() {
            session.append(Message::system(&self.default_system_prompt));
            tracing::debug!(session_id, "session initialized with default prompt");
        }

        let report = match self.orchestrator.run_turn(&mut session, text).await {
            Ok(report) => report,
            Err(error) => {
                tracing::warn!(session_id, error = %error, "turn abandoned");
                return Err(error);
            }
        };

        let version = self.store.put_state(&session, expected_version).await?;
        tracing::debug!(session_id, version, "turn persisted");
        Ok(report.reply)
    }

    pub async fn get_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>> {
        validate_session_id(session_id)?;
        Ok(self.store.get_history(session_id).await?)
    }

    pub async fn get_session_info(&self, session_id: &str) -> Result<SessionInfo> {
        validate_session_id(session_id)?;
        Ok(self
            .store
            .get_state(session_id)
            .await?
            .map_or_else(|| SessionInfo::missing(session_id), |cp| cp.session.info()))
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        Ok(self.store.list_sessions().await?)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        let deleted = self.store.delete_session(session_id).await?;
        if deleted {
            tracing::info!(session_id, "session deleted");
        }
        Ok(deleted)
    }

    /// Set (or with `Value::Null`, clear) one session preference.
    pub async fn set_preference(&self, session_id: &str, key: &str, value: Value) -> Result<u64> {
        validate_session_id(session_id)?;
        let mut preferences = BTreeMap::new();
        preferences.insert(key.to_string(), value);
        self.store
            .update_state(
                session_id,
                SessionPatch {
                    preferences,
                    ..SessionPatch::default()
                },
            )
            .await
            .map_err(ParleyError::from)
    }
}

/// Reject ids that are empty, longer than [`MAX_SESSION_ID_LEN`] characters,
/// or contain whitespace or control characters.
pub fn validate_session_id(session_id: &str) -> std::result::Result<(), ValidationError> {
    if session_id.is_empty() {
        return Err(ValidationError::EmptySessionId);
    }
    let len = session_id.chars().count();
    if len > MAX_SESSION_ID_LEN {
        return Err(ValidationError::SessionIdTooLong {
            len,
            max: MAX_SESSION_ID_LEN,
        });
    }
    if let Some(ch) = session_id
        .chars()
        .find(|ch| ch.is_whitespace() || ch.is_control())
    {
        return Err(ValidationError::InvalidSessionIdChar { ch });
    }
    Ok(())
}
