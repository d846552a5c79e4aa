use std::process::ExitCode;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use triage_core::config::{AppConfig, LoadOptions, LogFormat};

pub fn run() -> ExitCode {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let rendered = serde_json::to_string_pretty(&redacted_view(&config))
                .unwrap_or_else(|fault| format!("{{\"error\": \"{fault}\"}}"));
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(fault) => {
            eprintln!("configuration is not loadable: {fault}");
            ExitCode::FAILURE
        }
    }
}

/// Full effective configuration with every credential replaced by a
/// redaction marker. Safe to paste into a support ticket.
fn redacted_view(config: &AppConfig) -> Value {
    let agent_view = |endpoint: &triage_core::config::AgentEndpoint| {
        json!({
            "endpoint": endpoint.endpoint,
            "auth_token": redact(&endpoint.auth_token),
            "agent_id": endpoint.agent_id,
            "extra_request_fields": endpoint.extra_request_fields,
        })
    };

    json!({
        "agents": {
            "query": agent_view(&config.agents.query),
            "order": agent_view(&config.agents.order),
            "eco_manager": agent_view(&config.agents.eco_manager),
            "subscription": agent_view(&config.agents.subscription),
            "product_details": agent_view(&config.agents.product_details),
        },
        "llm": {
            "api_key": redact(&config.llm.api_key),
            "base_url": config.llm.base_url,
            "model": config.llm.model,
            "timeout_secs": config.llm.timeout_secs,
            "max_retries": config.llm.max_retries,
        },
        "router": {
            "use_default_agent_if_none_identified": config.router.use_default_agent_if_none_identified,
            "default_agent": config.router.default_agent.display_name(),
            "max_message_pairs_per_agent": config.router.max_message_pairs_per_agent,
        },
        "server": {
            "bind_address": config.server.bind_address,
            "port": config.server.port,
        },
        "logging": {
            "level": config.logging.level,
            "format": match config.logging.format {
                LogFormat::Compact => "compact",
                LogFormat::Pretty => "pretty",
                LogFormat::Json => "json",
            },
        },
    })
}

fn redact(secret: &SecretString) -> &'static str {
    if secret.expose_secret().trim().is_empty() {
        "(unset)"
    } else {
        "[redacted]"
    }
}
