//! Pass-through adapters for the five specialist endpoints.
//!
//! The adapters are differentiated only by configuration; there is one
//! adapter type and a tagged dispatch table, not an inheritance tree.
//! Each invocation makes exactly one outbound call and never raises past
//! the boundary: every outcome is a `HandlerReply` the router can treat
//! uniformly. Retry policy belongs to the router, not this layer.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tracing::warn;

use triage_core::classification::AgentName;
use triage_core::config::{AgentsConfig, HandlerDescriptor};
use triage_core::conversation::ConversationTurn;
use triage_core::errors::HandlerError;

/// What a specialist invocation produced: the remote JSON body wrapped
/// without reinterpretation, or a typed failure marker whose display
/// form is the user-visible error text.
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerReply {
    Message(Value),
    Failure(HandlerError),
}

/// One routed request as seen by a specialist. The history is already
/// bounded by the router to the configured pair count.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentRequest {
    pub message: String,
    pub user_id: String,
    pub session_id: String,
    pub history: Vec<ConversationTurn>,
}

/// Dispatch seam for the router; tests substitute capture stubs.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, agent: AgentName, request: AgentRequest) -> HandlerReply;
}

pub struct SpecialistAgent {
    descriptor: HandlerDescriptor,
    http: reqwest::Client,
}

impl SpecialistAgent {
    pub fn new(descriptor: HandlerDescriptor, http: reqwest::Client) -> Self {
        Self { descriptor, http }
    }

    /// Single-shot call to the remote endpoint. Body carries the wire
    /// fields the endpoints expect (`session_id`, `message`, `agent_id`)
    /// plus any configured handler-specific fields.
    pub async fn handle(&self, request: &AgentRequest) -> HandlerReply {
        let mut body = Map::new();
        body.insert("session_id".to_string(), Value::from(request.session_id.as_str()));
        body.insert("message".to_string(), Value::from(request.message.as_str()));
        body.insert("agent_id".to_string(), Value::from(self.descriptor.endpoint.agent_id.as_str()));
        for (key, value) in &self.descriptor.endpoint.extra_request_fields {
            body.insert(key.clone(), value.clone());
        }

        let agent_label = self.descriptor.name.display_name();
        let response = match self
            .http
            .post(&self.descriptor.endpoint.endpoint)
            .bearer_auth(self.descriptor.endpoint.auth_token.expose_secret())
            .json(&Value::Object(body))
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!(agent = agent_label, %error, "specialist endpoint unreachable");
                return HandlerReply::Failure(HandlerError::Transport {
                    agent: agent_label.to_string(),
                    detail: error.to_string(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(agent = agent_label, status = status.as_u16(), "specialist returned non-success");
            return HandlerReply::Failure(HandlerError::Http {
                agent: agent_label.to_string(),
                status: status.as_u16(),
            });
        }

        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(error) => {
                return HandlerReply::Failure(HandlerError::UnreadableReply {
                    agent: agent_label.to_string(),
                    detail: error.to_string(),
                });
            }
        };

        // Wrap without reinterpretation; non-JSON bodies stay as text and
        // the shape resolver decides what to do with them.
        match serde_json::from_str(&raw) {
            Ok(value) => HandlerReply::Message(value),
            Err(_) => HandlerReply::Message(Value::String(raw)),
        }
    }
}

/// Tagged dispatch table over the fixed agent set, built once from
/// configuration and shared read-only for the process lifetime.
pub struct AgentRegistry {
    agents: HashMap<AgentName, SpecialistAgent>,
}

impl AgentRegistry {
    pub fn from_config(agents: &AgentsConfig, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        let table = agents
            .descriptors()
            .into_iter()
            .map(|descriptor| (descriptor.name, SpecialistAgent::new(descriptor, http.clone())))
            .collect();

        Ok(Self { agents: table })
    }
}

#[async_trait]
impl Dispatch for AgentRegistry {
    async fn dispatch(&self, agent: AgentName, request: AgentRequest) -> HandlerReply {
        match self.agents.get(&agent) {
            Some(specialist) => specialist.handle(&request).await,
            None => HandlerReply::Failure(HandlerError::NotConfigured {
                agent: agent.display_name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use triage_core::config::AppConfig;

    use super::AgentRegistry;
    use triage_core::classification::AgentName;

    #[test]
    fn registry_builds_an_entry_for_every_agent() {
        let config = AppConfig::default();
        let registry = AgentRegistry::from_config(&config.agents, 30).expect("registry builds");
        for agent in AgentName::ALL {
            assert!(registry.agents.contains_key(&agent), "missing {agent:?}");
        }
    }
}
