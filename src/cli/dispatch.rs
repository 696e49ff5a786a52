use super::commands::{Cli, Commands};
use super::{render, repl};
use crate::config::Config;
use crate::llm::{CompatibleProvider, build_provider_client};
use crate::session::{ChatService, SqliteCheckpointStore};
use crate::tools::default_registry;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Wire the store, model adapter and tools described by `config`.
pub async fn build_service(config: &Config) -> Result<ChatService> {
    let db_path = config.memory.resolved_database_path();
    let store = SqliteCheckpointStore::open(&db_path)
        .await
        .with_context(|| format!("Failed to open session store at {}", db_path.display()))?;

    let provider = CompatibleProvider::new(
        "llm",
        &config.llm.base_url,
        config.llm.api_key.as_deref(),
        &config.llm.model,
        config.llm.temperature,
    )
    .with_client(build_provider_client(config.agent.model_timeout_secs));

    tracing::debug!(
        base_url = %config.llm.base_url,
        model = %config.llm.model,
        db = %db_path.display(),
        "chat service ready"
    );

    Ok(ChatService::from_config(
        Arc::new(store),
        Arc::new(provider),
        Arc::new(default_registry()),
        config,
    ))
}

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    config.apply_env_overrides();
    config.validate()?;
    let service = build_service(&config).await?;

    match cli.command {
        Commands::Chat {
            session,
            system_prompt,
        } => repl::run_chat(&service, session, system_prompt.as_deref()).await,

        Commands::Send { session, text } => {
            let reply = service.send_message(&session, &text.join(" ")).await?;
            println!("{reply}");
            Ok(())
        }

        Commands::History { session, limit } => {
            let entries = service.get_history(&session).await?;
            println!("{}", render::history(&entries, limit));
            Ok(())
        }

        Commands::Info { session } => {
            let info = service.get_session_info(&session).await?;
            println!("{}", render::info(&info));
            Ok(())
        }

        Commands::Sessions => {
            let rows = service.list_sessions().await?;
            println!("{}", render::sessions(&rows));
            Ok(())
        }

        Commands::Delete { session } => {
            if service.delete_session(&session).await? {
                println!("Deleted {session}");
            } else {
                println!("No session named {session}");
            }
            Ok(())
        }
    }
}
