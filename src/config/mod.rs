mod env_overrides;
mod loader;
pub mod schema;
#[cfg(test)]
mod test_env;

pub use schema::{
    AgentConfig, Config, DEFAULT_SYSTEM_PREAMBLE, DEFAULT_SYSTEM_PROMPT, LlmConfig, MemoryConfig,
};
