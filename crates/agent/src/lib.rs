//! Routing runtime - classification and dispatch for support chat
//!
//! This crate is the "brain" of the triage system:
//! - **Classification** (`classifier`) - decide which of the five
//!   specialist agents should answer, with follow-up continuity for
//!   short utterances ("yes", "ok", "1")
//! - **Dispatch** (`specialist`) - single-shot pass-through adapters to
//!   the remote specialist endpoints
//! - **Orchestration** (`router`) - the routing loop: classify, apply
//!   fallback rules, bound history, dispatch, resolve the reply shape,
//!   and record the turn
//!
//! # Key Types
//!
//! - `ChatRouter` - main orchestrator (see `router` module)
//! - `Classify` / `Dispatch` - seams the server wires with real LLM and
//!   HTTP implementations and tests wire with stubs
//! - `LlmClient` - pluggable model client for the classifier
//!
//! # Safety Principle
//!
//! The LLM only picks an agent. Response shaping, fallback policy, and
//! history bounds are deterministic decisions made by this crate and the
//! core, so a misbehaving model can never produce an unstructured reply.

pub mod classifier;
pub mod llm;
pub mod router;
pub mod specialist;

pub use classifier::{Classify, LlmClassifier};
pub use llm::{LlmClient, OpenAiChatClient};
pub use router::ChatRouter;
pub use specialist::{AgentRegistry, AgentRequest, Dispatch, HandlerReply, SpecialistAgent};
