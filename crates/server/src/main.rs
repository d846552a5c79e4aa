mod chat;
mod health;

use std::sync::Arc;

use anyhow::Result;
use tower_http::cors::CorsLayer;
use triage_agent::{AgentRegistry, ChatRouter, LlmClassifier, OpenAiChatClient};
use triage_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use triage_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let llm = OpenAiChatClient::new(&config.llm)?;
    let classifier = LlmClassifier::new(llm, config.agents.descriptors(), config.llm.max_retries);
    // Specialist calls share the model-call timeout bound so no session
    // can hang on a stuck endpoint.
    let registry = AgentRegistry::from_config(&config.agents, config.llm.timeout_secs)?;
    let router = Arc::new(ChatRouter::new(classifier, registry, config.router.clone()));

    // The chat UI is served from another origin; the API is open by
    // deployment policy, auth lives on the specialist endpoints.
    let app = chat::router(router).merge(health::router()).layer(CorsLayer::permissive());

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(bind_address = %address, "triage-server started");
    axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown()).await?;
    tracing::info!("triage-server stopping");

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
