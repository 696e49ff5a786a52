pub mod locks;
pub mod manager;
pub mod store;
pub mod summarizer;
pub mod types;

pub use locks::{SessionLease, SessionLocks};
pub use manager::{ChatService, MAX_SESSION_ID_LEN, validate_session_id};
pub use store::{CheckpointStore, SqliteCheckpointStore};
pub use summarizer::SummaryPlan;
pub use types::{
    Checkpoint, HistoryEntry, Message, MessageRole, RemovalDirective, Session, SessionInfo,
    SessionPatch, SessionSummary, ToolCall,
};
