use serde::{Deserialize, Serialize};

/// The fixed set of specialist agents a message can be routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    Query,
    Order,
    EcoManager,
    Subscription,
    ProductDetails,
}

impl AgentName {
    pub const ALL: [AgentName; 5] = [
        AgentName::Query,
        AgentName::Order,
        AgentName::EcoManager,
        AgentName::Subscription,
        AgentName::ProductDetails,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Query => "Query Agent",
            Self::Order => "Order Agent",
            Self::EcoManager => "Eco Manager Agent",
            Self::Subscription => "Subscription Agent",
            Self::ProductDetails => "Product Details Agent",
        }
    }

    /// Capability text shown to the classifier model.
    pub fn description(self) -> &'static str {
        match self {
            Self::Query => {
                "Specializes in answering customer FAQs, general inquiries, and product information"
            }
            Self::Order => {
                "Specializes in handling order-related queries, order status, and processing new orders"
            }
            Self::EcoManager => {
                "Specializes in finding toxin-free, eco-friendly solutions for home and personal care"
            }
            Self::Subscription => "Specializes in handling subscription-related queries",
            Self::ProductDetails => {
                "Specializes in providing detailed product information, recommendations, comparisons, and purchase advice."
            }
        }
    }

    /// Matches a model-emitted agent name against the fixed set.
    ///
    /// The model is prompted with display names but replies are not always
    /// verbatim, so matching is case-insensitive and keyed on the
    /// distinguishing word of each display name. Returns `None` for
    /// anything unrecognized, which the router treats as "no agent
    /// identified".
    pub fn match_loose(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() || normalized == "none" || normalized == "unknown" {
            return None;
        }
        if normalized.contains("eco") || normalized.contains("manager") {
            return Some(Self::EcoManager);
        }
        if normalized.contains("product detail") || normalized.contains("product_details") {
            return Some(Self::ProductDetails);
        }
        if normalized.contains("order") {
            return Some(Self::Order);
        }
        if normalized.contains("subscription") {
            return Some(Self::Subscription);
        }
        if normalized.contains("query") {
            return Some(Self::Query);
        }
        None
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    #[default]
    Low,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

/// Classifier verdict for a single inbound message. Produced fresh per
/// message and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub selected_agent: Option<AgentName>,
    pub priority: Priority,
    pub entities: Vec<String>,
    pub confidence: Confidence,
    pub is_followup: bool,
}

impl ClassificationResult {
    /// Well-formed "no agent identified" result. Ambiguity is not an
    /// error; the router applies its default-agent fallback instead.
    pub fn unclassified() -> Self {
        Self {
            selected_agent: None,
            priority: Priority::Low,
            entities: Vec::new(),
            confidence: Confidence::Low,
            is_followup: false,
        }
    }

    /// Continuity result for a short follow-up utterance: same agent as
    /// the previous turn, high confidence.
    pub fn followup(agent: AgentName) -> Self {
        Self {
            selected_agent: Some(agent),
            priority: Priority::Medium,
            entities: Vec::new(),
            confidence: Confidence::High,
            is_followup: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentName, ClassificationResult, Confidence};

    #[test]
    fn loose_match_accepts_display_names() {
        for agent in AgentName::ALL {
            assert_eq!(AgentName::match_loose(agent.display_name()), Some(agent));
        }
    }

    #[test]
    fn loose_match_tolerates_case_and_whitespace() {
        assert_eq!(AgentName::match_loose("  order agent  "), Some(AgentName::Order));
        assert_eq!(AgentName::match_loose("ECO MANAGER"), Some(AgentName::EcoManager));
        assert_eq!(AgentName::match_loose("product details"), Some(AgentName::ProductDetails));
    }

    #[test]
    fn loose_match_rejects_unknown_names() {
        assert_eq!(AgentName::match_loose(""), None);
        assert_eq!(AgentName::match_loose("none"), None);
        assert_eq!(AgentName::match_loose("billing wizard"), None);
    }

    #[test]
    fn unclassified_result_is_low_confidence_without_agent() {
        let result = ClassificationResult::unclassified();
        assert_eq!(result.selected_agent, None);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(!result.is_followup);
    }

    #[test]
    fn followup_result_keeps_the_previous_agent() {
        let result = ClassificationResult::followup(AgentName::Subscription);
        assert_eq!(result.selected_agent, Some(AgentName::Subscription));
        assert!(result.is_followup);
        assert_eq!(result.confidence, Confidence::High);
    }
}
