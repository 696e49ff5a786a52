use clap::{Parser, Subcommand};

/// `parley` - a session-aware chat agent with tools and rolling summaries.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "A session-aware chat agent with tools and rolling summaries.", long_about = None)]
pub struct Cli {
    /// Log at debug level (overridden by PARLEY_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat
    Chat {
        /// Resume an existing session instead of starting a new one
        #[arg(short, long)]
        session: Option<String>,

        /// System prompt for a newly created session
        #[arg(long)]
        system_prompt: Option<String>,
    },

    /// Send one message and print the reply
    Send {
        #[arg(short, long)]
        session: String,

        /// Message text (joined with spaces)
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Print the visible conversation of a session
    History {
        session: String,

        /// Show only the last N entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show session state: summary, counters, tools used
    Info { session: String },

    /// List stored sessions, most recent first
    Sessions,

    /// Delete a session and its checkpoints
    Delete { session: String },
}

/// In-chat commands understood by the REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Exit,
    New,
    History,
    Info,
    Sessions,
    Help,
}

/// Recognize a REPL command. Anything else is a chat message.
pub fn parse_repl_command(input: &str) -> Option<ReplCommand> {
    let trimmed = input.trim();
    let lowered = trimmed.to_lowercase();
    if matches!(lowered.as_str(), "exit" | "quit" | "bye") {
        return Some(ReplCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return None;
    }

    let cmd = lowered.split_whitespace().next()?;
    match cmd {
        "/exit" | "/quit" => Some(ReplCommand::Exit),
        "/new" | "/reset" => Some(ReplCommand::New),
        "/history" => Some(ReplCommand::History),
        "/info" => Some(ReplCommand::Info),
        "/sessions" => Some(ReplCommand::Sessions),
        "/help" | "/?" => Some(ReplCommand::Help),
        _ => None,
    }
}

pub const REPL_HELP: &str = "/new      -- Start a new session\n\
     /history  -- Show the last 10 messages\n\
     /info     -- Show session details\n\
     /sessions -- List stored sessions\n\
     /help     -- Show this help message\n\
     exit, quit, bye -- Leave the chat";
