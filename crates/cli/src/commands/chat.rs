//! Interactive chat loop against the real routing runtime. Mostly a
//! development and support tool; the production surface is the server.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use triage_agent::{AgentRegistry, ChatRouter, LlmClassifier, OpenAiChatClient};
use triage_core::config::{AppConfig, LoadOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Exit,
    Clear,
    Message,
}

fn action_for(line: &str) -> Action {
    match line.trim().to_ascii_lowercase().as_str() {
        "exit" => Action::Exit,
        "clear" => Action::Clear,
        _ => Action::Message,
    }
}

pub fn run(user_id: &str, session_id: &str) -> ExitCode {
    match chat_loop(user_id, session_id) {
        Ok(()) => ExitCode::SUCCESS,
        Err(fault) => {
            eprintln!("chat session failed: {fault:#}");
            ExitCode::FAILURE
        }
    }
}

fn chat_loop(user_id: &str, session_id: &str) -> Result<()> {
    let config = AppConfig::load(LoadOptions::default()).context("loading configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let llm = OpenAiChatClient::new(&config.llm)?;
    let classifier = LlmClassifier::new(llm, config.agents.descriptors(), config.llm.max_retries);
    let registry = AgentRegistry::from_config(&config.agents, config.llm.timeout_secs)?;
    let router = Arc::new(ChatRouter::new(classifier, registry, config.router));

    println!("Welcome to customer support!");
    println!("Type 'exit' to quit, 'clear' to clear chat history.");

    let stdin = io::stdin();
    loop {
        print!("\nYou: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match action_for(&line) {
            Action::Exit => {
                println!("Thank you for using customer support. Goodbye!");
                break;
            }
            Action::Clear => {
                runtime.block_on(router.clear_session(user_id, session_id));
                println!("Chat history cleared.");
            }
            Action::Message => {
                let message = line.trim();
                if message.is_empty() {
                    continue;
                }
                let response = runtime.block_on(router.route(message, user_id, session_id));
                println!("\nAssistant: {}", response.response);
            }
        }
    }

    Ok(())
}
