//! The chat endpoint: `POST /agent-chat` takes `{content, user_id,
//! session_id}` and returns the canonical response JSON. The router
//! already folds every fault into a structured reply; the remaining
//! total-failure case (a panic in the routing task) still yields an
//! `{"error": ...}` object instead of a bare 500.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use triage_agent::classifier::Classify;
use triage_agent::specialist::Dispatch;
use triage_agent::ChatRouter;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    pub user_id: String,
    pub session_id: String,
}

pub fn router<C, D>(state: Arc<ChatRouter<C, D>>) -> Router
where
    C: Classify + 'static,
    D: Dispatch + 'static,
{
    Router::new().route("/agent-chat", post(agent_chat::<C, D>)).with_state(state)
}

pub async fn agent_chat<C, D>(
    State(chat_router): State<Arc<ChatRouter<C, D>>>,
    Json(body): Json<ChatRequest>,
) -> Json<Value>
where
    C: Classify + 'static,
    D: Dispatch + 'static,
{
    let task = tokio::spawn(async move {
        chat_router.route(&body.content, &body.user_id, &body.session_id).await
    });

    match task.await {
        Ok(response) => {
            let payload = serde_json::to_value(&response)
                .unwrap_or_else(|fault| json!({"error": fault.to_string()}));
            Json(payload)
        }
        Err(fault) => {
            error!(%fault, "routing task aborted");
            Json(json!({"error": fault.to_string()}))
        }
    }
}
