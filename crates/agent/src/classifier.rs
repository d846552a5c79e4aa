//! Intent classification over the fixed agent set.
//!
//! Two layers: a deterministic pre-check that catches short follow-up
//! utterances without spending a model call, and an LLM pass for
//! everything else. The model is asked for strict JSON; its reply is
//! parsed defensively and anything unrecognizable degrades to "no agent
//! identified" rather than an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use triage_core::classification::{AgentName, ClassificationResult, Confidence, Priority};
use triage_core::config::HandlerDescriptor;
use triage_core::conversation::{ConversationTurn, Role};
use triage_core::errors::ClassifierError;

use crate::llm::LlmClient;

/// Classifier seam for the router.
#[async_trait]
pub trait Classify: Send + Sync {
    async fn classify(
        &self,
        message: &str,
        history: &[ConversationTurn],
        last_agent: Option<AgentName>,
    ) -> Result<ClassificationResult, ClassifierError>;
}

/// The authoritative minimum set of continuation phrases. A message in
/// this set (or a pure number, or anything of two characters or fewer)
/// keeps the previously selected agent without consulting the model.
const CONTINUATION_PHRASES: [&str; 6] = ["yes", "ok", "okay", "sure", "more", "i want to know more"];

const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 1_000;

pub fn is_short_followup(message: &str) -> bool {
    let normalized = message.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return false;
    }
    if normalized.chars().all(|character| character.is_ascii_digit()) {
        return true;
    }
    if CONTINUATION_PHRASES.contains(&normalized.as_str()) {
        return true;
    }
    normalized.chars().count() <= 2
}

pub struct LlmClassifier<C> {
    llm: C,
    descriptors: Vec<HandlerDescriptor>,
    max_attempts: u32,
}

impl<C> LlmClassifier<C>
where
    C: LlmClient,
{
    /// `max_attempts` counts total invocations, not re-tries after the
    /// first; the original deployment runs with 2.
    pub fn new(llm: C, descriptors: Vec<HandlerDescriptor>, max_attempts: u32) -> Self {
        Self { llm, descriptors, max_attempts: max_attempts.max(1) }
    }

    async fn classify_with_model(
        &self,
        message: &str,
        history: &[ConversationTurn],
        last_agent: Option<AgentName>,
    ) -> Result<ClassificationResult, ClassifierError> {
        let system_prompt = self.system_prompt(history, last_agent);
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match self.llm.complete(&system_prompt, message).await {
                Ok(reply) => match parse_model_reply(&reply, last_agent) {
                    Ok(result) => return Ok(result),
                    Err(error) => {
                        debug!(%error, attempt, "classifier reply did not parse");
                        last_error = Some(error);
                    }
                },
                Err(error) if error.is_transient() => {
                    warn!(%error, attempt, "classifier model call failed");
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(backoff(attempt)).await;
            }
        }

        Err(ClassifierError::RetriesExhausted {
            attempts: self.max_attempts,
            last_error: last_error
                .map(|error| error.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    fn system_prompt(&self, history: &[ConversationTurn], last_agent: Option<AgentName>) -> String {
        let agent_descriptions = self
            .descriptors
            .iter()
            .map(|descriptor| {
                format!("- {}: {}", descriptor.name.display_name(), descriptor.description)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let history_block = format_history(history);
        let previous_agent = last_agent
            .map(|agent| agent.display_name().to_string())
            .unwrap_or_else(|| "none".to_string());

        format!(
            r#"You are AgentMatcher, an intelligent assistant designed to analyze user queries and match them with the most suitable agent or department. Understand the user's request, identify key entities and intents, and determine which agent is best equipped to handle the query.

The user's input may be a follow-up to a previous interaction. The conversation history and the previously selected agent are provided. If the input continues the previous conversation (e.g. "yes", "ok", "I want to know more", "1"), select the same agent as before.

Available agents:
<agents>
{agent_descriptions}
</agents>

Classification rules:
- General information, product searches, a particular product or category -> Query Agent.
- Order status, tracking, shipping, or past orders -> Order Agent.
- Subscription management, billing, or account status -> Subscription Agent.
- Detailed product specifications, recommendations, comparisons, or purchase advice -> Product Details Agent.
- Eco-friendly alternatives, toxin-free solutions, sustainable products, or environmental impact -> Eco Manager Agent.

Priority: high for urgent or service-affecting issues, medium for non-urgent product or subscription matters, low for browsing and vague inquiries.
Entities: extract important product names, issues, or specific requests; for follow-ups include relevant entities from previous interactions.
Confidence: high for clear requests or clear follow-ups, medium for likely but ambiguous classification, low for vague or multi-faceted requests.

Previously selected agent: {previous_agent}

Conversation history:
<history>
{history_block}
</history>

Respond with only a JSON object, no preamble:
{{"selected_agent": "<agent display name or none>", "priority": "high|medium|low", "entities": ["..."], "confidence": "high|medium|low", "is_followup": true|false}}"#
        )
    }
}

#[async_trait]
impl<C> Classify for LlmClassifier<C>
where
    C: LlmClient,
{
    async fn classify(
        &self,
        message: &str,
        history: &[ConversationTurn],
        last_agent: Option<AgentName>,
    ) -> Result<ClassificationResult, ClassifierError> {
        if let Some(previous) = last_agent {
            if is_short_followup(message) {
                debug!(agent = previous.display_name(), "short follow-up, keeping previous agent");
                return Ok(ClassificationResult::followup(previous));
            }
        }

        self.classify_with_model(message, history, last_agent).await
    }
}

fn backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(8);
    Duration::from_millis((BACKOFF_BASE_MS << exponent).min(BACKOFF_CAP_MS))
}

fn format_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return "(empty)".to_string();
    }
    history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            format!("{role}: {}", turn.content.display_text())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    #[serde(alias = "agent", alias = "selected_handler")]
    selected_agent: Option<String>,
    priority: Option<String>,
    entities: Option<Vec<String>>,
    confidence: Option<String>,
    is_followup: Option<bool>,
}

fn parse_model_reply(
    reply: &str,
    last_agent: Option<AgentName>,
) -> Result<ClassificationResult, ClassifierError> {
    let trimmed = strip_code_fence(reply.trim());
    let verdict: ModelVerdict = serde_json::from_str(trimmed)
        .map_err(|error| ClassifierError::MalformedOutput(error.to_string()))?;

    let is_followup = verdict.is_followup.unwrap_or(false);
    let mut selected_agent =
        verdict.selected_agent.as_deref().and_then(AgentName::match_loose);
    if selected_agent.is_none() && is_followup {
        selected_agent = last_agent;
    }

    Ok(ClassificationResult {
        selected_agent,
        priority: match level(verdict.priority.as_deref()) {
            Some("high") => Priority::High,
            Some("medium") => Priority::Medium,
            _ => Priority::Low,
        },
        entities: verdict.entities.unwrap_or_default(),
        confidence: match level(verdict.confidence.as_deref()) {
            Some("high") => Confidence::High,
            Some("medium") => Confidence::Medium,
            _ => Confidence::Low,
        },
        is_followup,
    })
}

fn level(raw: Option<&str>) -> Option<&'static str> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "high" => Some("high"),
        "medium" => Some("medium"),
        "low" => Some("low"),
        _ => None,
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let Some(without_open) = reply.strip_prefix("```") else {
        return reply;
    };
    let without_language = without_open.strip_prefix("json").unwrap_or(without_open);
    without_language.trim_start_matches(['\r', '\n']).trim_end().trim_end_matches("```").trim()
}
