use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::classification::AgentName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Turn content is either plain display text or the structured payload a
/// specialist agent returned. Structured payloads are kept verbatim so
/// later turns can be re-serialized for the classifier prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Structured(Value),
}

impl TurnContent {
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: TurnContent,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: TurnContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: TurnContent::Text(text.into()) }
    }

    pub fn assistant_structured(payload: Value) -> Self {
        Self { role: Role::Assistant, content: TurnContent::Structured(payload) }
    }
}

/// One chat context. Turns are append-only in conversation order; the last
/// selected agent is remembered for follow-up continuity.
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub user_id: String,
    pub session_id: String,
    turns: Vec<ConversationTurn>,
    last_selected_agent: Option<AgentName>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            turns: Vec::new(),
            last_selected_agent: None,
        }
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last_selected_agent(&self) -> Option<AgentName> {
        self.last_selected_agent
    }

    pub fn record_selected_agent(&mut self, agent: AgentName) {
        self.last_selected_agent = Some(agent);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.last_selected_agent = None;
    }

    /// The newest `max_pairs` user/assistant message pairs, oldest evicted
    /// first. Bounds classifier prompt size and outbound request cost.
    pub fn visible_history(&self, max_pairs: usize) -> Vec<ConversationTurn> {
        let max_turns = max_pairs.saturating_mul(2);
        let start = self.turns.len().saturating_sub(max_turns);
        self.turns[start..].to_vec()
    }
}

/// In-memory session store keyed by `(user_id, session_id)`.
///
/// Sessions never survive a process restart; a persistent store could be
/// substituted behind the same surface without touching the router. A
/// single session's turns are only appended by the one task handling its
/// current request, so the map-level mutex is all the locking needed.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<(String, String), Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, user_id: &str, session_id: &str, turn: ConversationTurn) {
        let mut sessions = self.sessions.lock().await;
        entry(&mut sessions, user_id, session_id).append(turn);
    }

    pub async fn record_selected_agent(&self, user_id: &str, session_id: &str, agent: AgentName) {
        let mut sessions = self.sessions.lock().await;
        entry(&mut sessions, user_id, session_id).record_selected_agent(agent);
    }

    pub async fn last_selected_agent(&self, user_id: &str, session_id: &str) -> Option<AgentName> {
        let sessions = self.sessions.lock().await;
        sessions.get(&key(user_id, session_id)).and_then(Session::last_selected_agent)
    }

    pub async fn visible_history(
        &self,
        user_id: &str,
        session_id: &str,
        max_pairs: usize,
    ) -> Vec<ConversationTurn> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&key(user_id, session_id))
            .map(|session| session.visible_history(max_pairs))
            .unwrap_or_default()
    }

    pub async fn clear(&self, user_id: &str, session_id: &str) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(&key(user_id, session_id)) {
            session.clear();
        }
    }
}

fn key(user_id: &str, session_id: &str) -> (String, String) {
    (user_id.to_string(), session_id.to_string())
}

fn entry<'a>(
    sessions: &'a mut HashMap<(String, String), Session>,
    user_id: &str,
    session_id: &str,
) -> &'a mut Session {
    sessions
        .entry(key(user_id, session_id))
        .or_insert_with(|| Session::new(user_id, session_id))
}
