use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SYSTEM_PREAMBLE: &str = "You are a helpful AI assistant with access to tools. You can:
1. Get current time and date
2. Perform mathematical calculations
3. Search through conversation memory

Use tools when appropriate to help the user. Be conversational and helpful.";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to various tools. \
Be conversational and assist the user with their requests.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint root, e.g. `http://localhost:11434/v1`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f64 {
    0.5
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// New model responses since the last summary that trigger compaction
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: u32,
    /// Newest collected messages left visible after compaction
    #[serde(default = "default_messages_to_keep")]
    pub messages_to_keep: usize,
    /// Checkpoint database file; `~` is expanded
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_summary_threshold() -> u32 {
    10
}
fn default_messages_to_keep() -> usize {
    2
}
fn default_database_path() -> String {
    "~/.parley/data/parley.db".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            summary_threshold: default_summary_threshold(),
            messages_to_keep: default_messages_to_keep(),
            database_path: default_database_path(),
        }
    }
}

impl MemoryConfig {
    pub fn resolved_database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database_path).into_owned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Leading system message of every model prompt
    #[serde(default = "default_system_preamble")]
    pub system_preamble: String,
    /// System message stored by `initialize_session` when none is given
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,
}

fn default_system_preamble() -> String {
    DEFAULT_SYSTEM_PREAMBLE.into()
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_max_tool_iterations() -> u32 {
    25
}
fn default_model_timeout_secs() -> u64 {
    120
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_preamble: default_system_preamble(),
            default_system_prompt: default_system_prompt(),
            max_tool_iterations: default_max_tool_iterations(),
            model_timeout_secs: default_model_timeout_secs(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.summary_threshold == 0 {
            return Err(ConfigError::Validation(
                "memory.summary_threshold must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Validation(format!(
                "llm.temperature must be within 0.0..=2.0 (got {})",
                self.llm.temperature
            )));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.base_url must not be empty".into()));
        }
        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::Validation(
                "agent.max_tool_iterations must be at least 1".into(),
            ));
        }
        if self.agent.model_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "agent.model_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
