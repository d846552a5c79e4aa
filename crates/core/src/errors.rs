use thiserror::Error;

/// Classifier faults. Transport and model errors are transient and
/// retried by the classifier wrapper; exhaustion is downgraded by the
/// router to "no agent identified" rather than failing the request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier transport failure: {0}")]
    Transport(String),
    #[error("classifier model returned http {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("classifier output could not be parsed: {0}")]
    MalformedOutput(String),
    #[error("classifier retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ClassifierError {
    /// Malformed output means the model answered; re-asking the same
    /// prompt is what gets retried, transport faults included.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http { .. } | Self::MalformedOutput(_))
    }
}

/// Specialist endpoint faults. These never cross the adapter boundary as
/// raised errors; the adapter folds them into a failure-marked reply and
/// the router renders the display form as the error-text turn.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("{agent} returned HTTP {status}")]
    Http { agent: String, status: u16 },
    #[error("{agent} is unreachable: {detail}")]
    Transport { agent: String, detail: String },
    #[error("{agent} reply could not be read: {detail}")]
    UnreadableReply { agent: String, detail: String },
    #[error("{agent} is not configured on this deployment")]
    NotConfigured { agent: String },
}

/// Orchestration faults caught at the router boundary and converted into
/// a user-visible error response.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("no agent identified for the message and default fallback is disabled")]
    NoAgentIdentified,
}

#[cfg(test)]
mod tests {
    use super::{ClassifierError, HandlerError, RouterError};

    #[test]
    fn handler_errors_render_user_facing_text() {
        let http = HandlerError::Http { agent: "Order Agent".to_string(), status: 502 };
        assert_eq!(http.to_string(), "Order Agent returned HTTP 502");

        let transport = HandlerError::Transport {
            agent: "Query Agent".to_string(),
            detail: "connection refused".to_string(),
        };
        assert_eq!(transport.to_string(), "Query Agent is unreachable: connection refused");
    }

    #[test]
    fn transient_classifier_errors_are_retryable() {
        assert!(ClassifierError::Transport("connection refused".into()).is_transient());
        assert!(ClassifierError::Http { status: 503, detail: "overloaded".into() }.is_transient());
        assert!(ClassifierError::MalformedOutput("not json".into()).is_transient());
        assert!(!ClassifierError::RetriesExhausted { attempts: 2, last_error: "timeout".into() }
            .is_transient());
    }

    #[test]
    fn classifier_exhaustion_converts_into_a_router_error() {
        let error = RouterError::from(ClassifierError::RetriesExhausted {
            attempts: 2,
            last_error: "timeout".into(),
        });
        assert!(matches!(error, RouterError::Classifier(_)));
    }
}
