use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Errors surfaced by the session API.
///
/// Tool and model failures inside a turn are absorbed into the reply and only
/// reach this type when they cannot be (timeouts, adapter setup). Persistence
/// and validation failures always propagate.
#[derive(Debug, Error)]
pub enum ParleyError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Input validation ────────────────────────────────────────────────
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    // ── Checkpoint persistence ──────────────────────────────────────────
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),

    // ── Model service ───────────────────────────────────────────────────
    #[error("model: {0}")]
    Model(#[from] ModelError),

    // ── Tools ───────────────────────────────────────────────────────────
    #[error("tool: {0}")]
    Tool(#[from] ToolError),

    #[error("model invocation timed out after {secs}s; the turn was not recorded")]
    ModelTimeout { secs: u64 },
}

impl ParleyError {
    /// Whether repeating the same call may succeed without caller changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ModelTimeout { .. } | Self::Persistence(PersistenceError::VersionConflict { .. })
        )
    }
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Validation errors ───────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("session id is missing")]
    EmptySessionId,

    #[error("session id is {len} characters long (max {max})")]
    SessionIdTooLong { len: usize, max: usize },

    #[error("session id contains invalid character {ch:?}")]
    InvalidSessionIdChar { ch: char },

    #[error("message text is empty")]
    EmptyMessage,
}

// ─── Persistence errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("checkpoint schema: {0}")]
    Schema(String),

    #[error("checkpoint for session {session_id} could not be decoded: {message}")]
    Decode { session_id: String, message: String },

    #[error(
        "checkpoint for session {session_id} changed concurrently \
         (expected version {expected:?}, found {found:?})"
    )]
    VersionConflict {
        session_id: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("session {0} does not exist")]
    NotFound(String),

    #[error("backend: {0}")]
    Backend(String),
}

impl PersistenceError {
    /// Recover a typed error raised inside an `anyhow` chain, or wrap the chain.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(typed) => typed,
            Err(other) => Self::Backend(format!("{other:#}")),
        }
    }
}

// ─── Model errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },
}

// ─── Tool errors ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{name}'")]
    NotFound { name: String },

    #[error("tool {name} received invalid arguments: {message}")]
    InvalidArguments { name: String, message: String },

    #[error("tool {name} execution failed: {message}")]
    Execution { name: String, message: String },
}

// ─── Convenience re-exports ──────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ParleyError>;
