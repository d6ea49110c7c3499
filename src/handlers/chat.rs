use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{ChatRequest, ChatResponse};
use crate::state::AppState;

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload?;
    let response = state.chat.reply(&req.user_input).await?;
    Ok(Json(ChatResponse { response }))
}
