pub mod orchestrator;

pub use orchestrator::{Orchestrator, OrchestratorSettings, TurnReport, render_tool_outcome};
