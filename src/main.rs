#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use parley::Config;
use parley::cli::{Cli, dispatch};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn log_level(verbose: bool) -> Level {
    std::env::var("PARLEY_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(if verbose { Level::DEBUG } else { Level::INFO })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli.verbose))
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: Failed to install log subscriber: {e}");
    }

    let config = Config::load_or_init()?;
    dispatch(cli, config).await
}
