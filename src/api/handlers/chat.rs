use crate::{
    types::{AppError, ChatRequest, ChatResponse, Result},
    AppState,
};
use axum::{extract::State, Json};
use tracing::info;
use uuid::Uuid;

/// Ask the session's Orchestrator a question.
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(AppError::InvalidInput(
            "question must not be empty".to_string(),
        ));
    }

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let team = state.sessions.get_or_create(&session_id)?;
    let response = team.orchestrator.query(question, Some(&session_id)).await;
    info!(session_id = %session_id, steps = response.steps.len(), "Chat answered");

    Ok(Json(ChatResponse {
        answer: response.answer,
        steps: response.steps,
        session_id,
    }))
}
