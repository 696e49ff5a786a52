pub mod calculator;
pub mod clock;
pub mod memory_search;
pub mod registry;
pub mod traits;

pub use calculator::CalculatorTool;
pub use clock::CurrentTimeTool;
pub use memory_search::MemorySearchTool;
pub use registry::ToolRegistry;
pub use traits::{Tool, ToolResult, ToolSpec};

/// Registry holding the built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CurrentTimeTool));
    registry.register(Box::new(CalculatorTool));
    registry.register(Box::new(MemorySearchTool));
    registry
}
