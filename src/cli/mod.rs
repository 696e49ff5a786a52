pub mod commands;
pub mod dispatch;
pub mod render;
pub mod repl;

pub use commands::{Cli, Commands};
pub use dispatch::{build_service, dispatch};
