pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "triage",
    about = "Triage support-chat operator CLI",
    long_about = "Run an interactive chat session against the routing runtime or inspect the effective configuration.",
    after_help = "Examples:\n  triage chat\n  triage chat --user-id u42 --session-id support-7\n  triage config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive chat session (type 'exit' to quit, 'clear' to reset)")]
    Chat {
        #[arg(long, default_value = "default_user_123", help = "User id attached to the session")]
        user_id: String,
        #[arg(
            long,
            default_value = "default_session_456",
            help = "Session id attached to the session"
        )]
        session_id: String,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Chat { user_id, session_id } => commands::chat::run(&user_id, &session_id),
        Command::Config => commands::config::run(),
    }
}
