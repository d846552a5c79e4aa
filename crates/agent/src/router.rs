//! The orchestration loop: classify, select, dispatch, shape, record.
//!
//! Every fault inside the loop is caught at this boundary and converted
//! into a widgets-free error response; the transport layer above never
//! sees an unstructured failure.

use tracing::{error, info, warn};

use triage_core::classification::ClassificationResult;
use triage_core::config::RouterConfig;
use triage_core::conversation::{ConversationTurn, SessionStore};
use triage_core::errors::RouterError;
use triage_core::response::CanonicalResponse;
use triage_core::shape;

use crate::classifier::Classify;
use crate::specialist::{AgentRequest, Dispatch, HandlerReply};

const NO_AGENT_TEXT: &str =
    "I couldn't work out which team should handle that. Could you rephrase your request?";

pub struct ChatRouter<C, D> {
    classifier: C,
    dispatcher: D,
    sessions: SessionStore,
    config: RouterConfig,
}

impl<C, D> ChatRouter<C, D>
where
    C: Classify,
    D: Dispatch,
{
    pub fn new(classifier: C, dispatcher: D, config: RouterConfig) -> Self {
        Self { classifier, dispatcher, sessions: SessionStore::new(), config }
    }

    /// Routes one inbound message and returns the canonical reply. The
    /// inbound message and the reply's display text are both recorded on
    /// the session, error paths included.
    pub async fn route(&self, message: &str, user_id: &str, session_id: &str) -> CanonicalResponse {
        self.sessions.append(user_id, session_id, ConversationTurn::user(message)).await;

        let response = match self.route_inner(message, user_id, session_id).await {
            Ok(response) => response,
            Err(RouterError::NoAgentIdentified) => CanonicalResponse::text(NO_AGENT_TEXT),
            Err(fault) => {
                error!(%fault, user_id, session_id, "routing failed");
                CanonicalResponse::text(format!("Error processing request: {fault}"))
            }
        };

        self.sessions
            .append(user_id, session_id, ConversationTurn::assistant(response.response.clone()))
            .await;
        response
    }

    pub async fn clear_session(&self, user_id: &str, session_id: &str) {
        self.sessions.clear(user_id, session_id).await;
    }

    async fn route_inner(
        &self,
        message: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<CanonicalResponse, RouterError> {
        let max_pairs = self.config.max_message_pairs_per_agent;
        let history = self.sessions.visible_history(user_id, session_id, max_pairs).await;
        let last_agent = self.sessions.last_selected_agent(user_id, session_id).await;

        // Classifier exhaustion is recoverable: downgrade to "no agent
        // identified" and let the default-agent fallback take over.
        let classification = match self.classifier.classify(message, &history, last_agent).await {
            Ok(classification) => classification,
            Err(fault) => {
                warn!(%fault, "classifier failed, falling back to default agent policy");
                ClassificationResult::unclassified()
            }
        };

        let selected = match classification.selected_agent {
            Some(agent) => agent,
            None if self.config.use_default_agent_if_none_identified => {
                info!(
                    default_agent = self.config.default_agent.display_name(),
                    "no agent identified, using default"
                );
                self.config.default_agent
            }
            None => return Err(RouterError::NoAgentIdentified),
        };

        info!(
            agent = selected.display_name(),
            is_followup = classification.is_followup,
            confidence = ?classification.confidence,
            priority = ?classification.priority,
            "agent selected"
        );
        self.sessions.record_selected_agent(user_id, session_id, selected).await;

        let request = AgentRequest {
            message: message.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            history,
        };

        match self.dispatcher.dispatch(selected, request).await {
            HandlerReply::Message(payload) => {
                let raw = match &payload {
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                Ok(shape::resolve(&raw))
            }
            HandlerReply::Failure(failure) => {
                warn!(agent = selected.display_name(), %failure, "specialist call failed");
                Ok(CanonicalResponse::text(failure.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use triage_core::classification::{AgentName, ClassificationResult};
    use triage_core::config::{AppConfig, RouterConfig};
    use triage_core::conversation::ConversationTurn;
    use triage_core::errors::{ClassifierError, HandlerError};
    use triage_core::response::WidgetKind;

    use super::ChatRouter;
    use crate::classifier::{Classify, LlmClassifier};
    use crate::llm::LlmClient;
    use crate::specialist::{AgentRequest, Dispatch, HandlerReply};

    /// Scripted classifier covering the non-LLM router paths.
    enum StubClassifier {
        Fixed(AgentName),
        None,
        Failing,
    }

    #[async_trait]
    impl Classify for StubClassifier {
        async fn classify(
            &self,
            _message: &str,
            _history: &[ConversationTurn],
            _last_agent: Option<AgentName>,
        ) -> Result<ClassificationResult, ClassifierError> {
            match self {
                Self::Fixed(agent) => Ok(ClassificationResult {
                    selected_agent: Some(*agent),
                    ..ClassificationResult::unclassified()
                }),
                Self::None => Ok(ClassificationResult::unclassified()),
                Self::Failing => Err(ClassifierError::RetriesExhausted {
                    attempts: 2,
                    last_error: "timeout".to_string(),
                }),
            }
        }
    }

    /// Records every dispatch and answers with a fixed reply.
    struct CaptureDispatch {
        reply: HandlerReply,
        calls: Mutex<Vec<(AgentName, AgentRequest)>>,
    }

    impl CaptureDispatch {
        fn replying(reply: HandlerReply) -> Self {
            Self { reply, calls: Mutex::new(Vec::new()) }
        }

        fn text_reply(text: &str) -> Self {
            Self::replying(HandlerReply::Message(Value::String(text.to_string())))
        }

        fn calls(&self) -> Vec<(AgentName, AgentRequest)> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl Dispatch for &CaptureDispatch {
        async fn dispatch(&self, agent: AgentName, request: AgentRequest) -> HandlerReply {
            self.calls.lock().expect("calls lock").push((agent, request));
            self.reply.clone()
        }
    }

    fn router_config() -> RouterConfig {
        AppConfig::default().router
    }

    #[tokio::test]
    async fn classified_message_dispatches_to_the_chosen_agent() {
        let dispatch = CaptureDispatch::text_reply("Your order ships Tuesday.");
        let router =
            ChatRouter::new(StubClassifier::Fixed(AgentName::Order), &dispatch, router_config());

        let response = router.route("where is my order?", "u1", "s1").await;

        assert_eq!(response.response, "Your order ships Tuesday.");
        let calls = dispatch.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, AgentName::Order);
        assert_eq!(calls[0].1.message, "where is my order?");
        assert_eq!(calls[0].1.session_id, "s1");
    }

    #[tokio::test]
    async fn eco_question_routes_to_eco_manager_and_answers() {
        let dispatch =
            CaptureDispatch::text_reply("Our detergents are plant-based and biodegradable.");
        let router = ChatRouter::new(
            StubClassifier::Fixed(AgentName::EcoManager),
            &dispatch,
            router_config(),
        );

        let response = router.route("What eco-friendly detergents do you have?", "u1", "s1").await;

        assert!(!response.response.is_empty());
        assert_eq!(dispatch.calls()[0].0, AgentName::EcoManager);
    }

    #[tokio::test]
    async fn unidentified_agent_falls_back_to_the_default() {
        let dispatch = CaptureDispatch::text_reply("General help text.");
        let router = ChatRouter::new(StubClassifier::None, &dispatch, router_config());

        router.route("???", "u1", "s1").await;

        assert_eq!(dispatch.calls()[0].0, AgentName::Query);
    }

    #[tokio::test]
    async fn unidentified_agent_without_fallback_returns_polite_text() {
        let dispatch = CaptureDispatch::text_reply("unused");
        let mut config = router_config();
        config.use_default_agent_if_none_identified = false;
        let router = ChatRouter::new(StubClassifier::None, &dispatch, config);

        let response = router.route("???", "u1", "s1").await;

        assert!(response.widgets.is_empty());
        assert!(response.response.contains("rephrase"));
        assert!(dispatch.calls().is_empty());
    }

    #[tokio::test]
    async fn classifier_exhaustion_downgrades_to_default_agent() {
        let dispatch = CaptureDispatch::text_reply("General help text.");
        let router = ChatRouter::new(StubClassifier::Failing, &dispatch, router_config());

        let response = router.route("anything", "u1", "s1").await;

        assert_eq!(response.response, "General help text.");
        assert_eq!(dispatch.calls()[0].0, AgentName::Query);
    }

    #[tokio::test]
    async fn handler_failure_becomes_an_error_text_response() {
        let dispatch = CaptureDispatch::replying(HandlerReply::Failure(HandlerError::Http {
            agent: "Order Agent".to_string(),
            status: 502,
        }));
        let router =
            ChatRouter::new(StubClassifier::Fixed(AgentName::Order), &dispatch, router_config());

        let response = router.route("where is my order?", "u1", "s1").await;

        assert_eq!(response.response, "Order Agent returned HTTP 502");
        assert!(response.widgets.is_empty());
    }

    #[tokio::test]
    async fn structured_reply_is_resolved_into_widgets() {
        let dispatch = CaptureDispatch::replying(HandlerReply::Message(
            json!([{"productId": "p1", "name": "Dish Soap"}]),
        ));
        let router = ChatRouter::new(
            StubClassifier::Fixed(AgentName::ProductDetails),
            &dispatch,
            router_config(),
        );

        let response = router.route("compare dish soaps", "u1", "s1").await;

        assert_eq!(response.widgets.len(), 2);
        assert_eq!(response.widgets[0].kind, WidgetKind::Products);
        assert_eq!(response.widgets[1].kind, WidgetKind::Options);
    }

    #[tokio::test]
    async fn history_passed_to_the_agent_is_bounded() {
        let dispatch = CaptureDispatch::text_reply("noted");
        let mut config = router_config();
        config.max_message_pairs_per_agent = 2;
        let router =
            ChatRouter::new(StubClassifier::Fixed(AgentName::Query), &dispatch, config);

        for index in 0..4 {
            router.route(&format!("message {index}"), "u1", "s1").await;
        }

        let calls = dispatch.calls();
        let last_history = &calls.last().expect("at least one call").1.history;
        assert!(last_history.len() <= 4);
        assert!(!last_history.contains(&ConversationTurn::user("message 0")));
        assert!(last_history.contains(&ConversationTurn::user("message 3")));
    }

    /// Continuity across turns with the real classifier wrapper: the
    /// second, short utterance must reuse the first turn's agent without
    /// another model call.
    #[tokio::test]
    async fn short_followup_reuses_the_previous_agent() {
        struct OneShotLlm(Mutex<u32>);

        #[async_trait]
        impl LlmClient for OneShotLlm {
            async fn complete(
                &self,
                _system: &str,
                _user: &str,
            ) -> Result<String, ClassifierError> {
                let mut calls = self.0.lock().expect("call lock");
                *calls += 1;
                assert_eq!(*calls, 1, "follow-up must not reach the model");
                Ok(r#"{"selected_agent": "Order Agent", "priority": "medium",
                    "entities": [], "confidence": "high", "is_followup": false}"#
                    .to_string())
            }
        }

        let dispatch = CaptureDispatch::text_reply("Here you go.");
        let classifier = LlmClassifier::new(
            OneShotLlm(Mutex::new(0)),
            AppConfig::default().agents.descriptors(),
            2,
        );
        let router = ChatRouter::new(classifier, &dispatch, router_config());

        router.route("show me my past orders", "u1", "s1").await;
        for followup in ["yes", "ok", "1"] {
            router.route(followup, "u1", "s1").await;
        }

        let calls = dispatch.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|(agent, _)| *agent == AgentName::Order));
    }

    #[tokio::test]
    async fn both_turns_are_recorded_on_the_session() {
        let dispatch = CaptureDispatch::text_reply("All good.");
        let router =
            ChatRouter::new(StubClassifier::Fixed(AgentName::Query), &dispatch, router_config());

        router.route("hello", "u1", "s1").await;
        router.route("second", "u1", "s1").await;

        let history = &dispatch.calls()[1].1.history;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], ConversationTurn::user("hello"));
        assert_eq!(history[1], ConversationTurn::assistant("All good."));
        assert_eq!(history[2], ConversationTurn::user("second"));
    }

    #[tokio::test]
    async fn clear_session_forgets_history_and_agent() {
        let dispatch = CaptureDispatch::text_reply("noted");
        let router =
            ChatRouter::new(StubClassifier::Fixed(AgentName::Order), &dispatch, router_config());

        router.route("first", "u1", "s1").await;
        router.clear_session("u1", "s1").await;
        router.route("second", "u1", "s1").await;

        let calls = dispatch.calls();
        let history = &calls[1].1.history;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], ConversationTurn::user("second"));
    }
}
