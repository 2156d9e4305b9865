use axum::extract::State;
use axum::Json;
use common_problem::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use crate::conversations::{ChatTurn, ConversationStore};
use crate::guard::CurrentUser;
use crate::llm::SYSTEM_PROMPT;

/// Most recent turns fed back into the prompt for context.
const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub sources: Vec<String>,
}

pub async fn chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if request.message.trim().is_empty() {
        return Err(ApiError::validation(
            "chat/empty-message",
            "Message cannot be empty",
        ));
    }

    let conversation_id = request
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(ConversationStore::create_conversation_id);

    // Snapshot the history under the read lock; the LLM call runs without
    // any lock held.
    let history = state
        .conversations
        .recent(&conversation_id, HISTORY_WINDOW)
        .await;

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatTurn::system(SYSTEM_PROMPT));
    messages.extend(history);
    messages.push(ChatTurn::user(request.message.clone()));

    let answer = match state.llm.chat_completion(&messages).await {
        Ok(answer) => {
            state.metrics.chat_request("success");
            answer
        }
        Err(err) => {
            state.metrics.chat_request("upstream_error");
            return Err(err);
        }
    };

    state
        .conversations
        .append(&conversation_id, ChatTurn::user(request.message))
        .await;
    state
        .conversations
        .append(&conversation_id, ChatTurn::assistant(answer.clone()))
        .await;

    info!(user_id = %user.id, conversation_id = %conversation_id, "chat request processed");

    Ok(Json(ChatResponse {
        response: answer,
        conversation_id,
        sources: Vec::new(),
    }))
}

pub async fn chat_health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "devops-chat" }))
}
