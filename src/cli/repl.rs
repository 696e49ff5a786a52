use super::commands::{REPL_HELP, ReplCommand, parse_repl_command};
use super::render;
use crate::session::ChatService;
use anyhow::Result;
use std::io::Write;
use tokio::io::{self, AsyncBufReadExt, BufReader};

pub const SESSION_PREFIX: &str = "terminal";
const REPL_HISTORY_LIMIT: usize = 10;

/// Interactive terminal chat over stdin/stdout.
pub async fn run_chat(
    service: &ChatService,
    session_id: Option<String>,
    system_prompt: Option<&str>,
) -> Result<()> {
    let mut session_id =
        session_id.unwrap_or_else(|| ChatService::new_session_id(SESSION_PREFIX));
    service.initialize_session(&session_id, system_prompt).await?;
    println!("{}", render::banner(&session_id));

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("{} ", console::style("You:").cyan().bold());
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(command) = parse_repl_command(line) else {
            match service.send_message(&session_id, line).await {
                Ok(reply) => println!("{}", render::reply(&reply)),
                Err(error) => eprintln!("{}", render::error(error)),
            }
            continue;
        };

        if command == ReplCommand::Exit {
            break;
        }
        if let Err(error) = run_command(service, &mut session_id, system_prompt, &command).await {
            eprintln!("{}", render::error(error));
        }
    }

    println!("{}", console::style("Goodbye.").dim());
    Ok(())
}

async fn run_command(
    service: &ChatService,
    session_id: &mut String,
    system_prompt: Option<&str>,
    command: &ReplCommand,
) -> Result<()> {
    match command {
        ReplCommand::New => {
            let fresh = ChatService::new_session_id(SESSION_PREFIX);
            service.initialize_session(&fresh, system_prompt).await?;
            *session_id = fresh;
            println!("{}", render::banner(session_id));
        }
        ReplCommand::History => {
            let entries = service.get_history(session_id).await?;
            println!("{}", render::history(&entries, Some(REPL_HISTORY_LIMIT)));
        }
        ReplCommand::Info => {
            let info = service.get_session_info(session_id).await?;
            println!("{}", render::info(&info));
        }
        ReplCommand::Sessions => {
            let rows = service.list_sessions().await?;
            println!("{}", render::sessions(&rows));
        }
        ReplCommand::Help => println!("{REPL_HELP}"),
        ReplCommand::Exit => {}
    }
    Ok(())
}
