//! Core domain for the triage support-chat router.
//!
//! This crate holds everything that does not perform I/O:
//! - conversation turns, sessions, and the in-memory session store
//! - the classifier output contract (`ClassificationResult`)
//! - the canonical response and widget payload shapes
//! - the response shape resolver (raw agent reply → widgets)
//! - configuration loading and typed error kinds
//!
//! The agent crate layers the classifier, specialist adapters, and the
//! routing loop on top of these types; the server and CLI crates are thin
//! surfaces over the agent crate.

pub mod classification;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod response;
pub mod shape;

pub use classification::{AgentName, ClassificationResult, Confidence, Priority};
pub use config::{AgentEndpoint, AppConfig, HandlerDescriptor, LoadOptions};
pub use conversation::{ConversationTurn, Role, Session, SessionStore, TurnContent};
pub use errors::{ClassifierError, HandlerError, RouterError};
pub use response::{CanonicalResponse, WidgetKind, WidgetPayload};
