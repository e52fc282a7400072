//! Chat handlers

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use shopbot_core::{ConversationTurn, ProductPayload};
use std::sync::Arc;
use utoipa::ToSchema;

/// Chat request body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Shopper message
    #[schema(example = "I want a hat")]
    pub message: Option<String>,

    /// Turns returned by the previous call, without a system turn
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub conversation_history: Vec<ConversationTurn>,
}

/// Chat response body
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Assistant answer
    pub response: String,

    /// Products the answer is grounded on
    #[schema(value_type = Vec<Object>)]
    pub products: Vec<ProductPayload>,

    /// History to send with the next message
    #[schema(value_type = Vec<Object>)]
    pub conversation_history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    #[schema(example = "Conversation reset")]
    pub message: String,
    #[schema(value_type = Vec<Object>)]
    pub conversation_history: Vec<ConversationTurn>,
}

/// Answer a shopper message using the product index
#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Chat answer", body = ChatResponse),
        (status = 400, description = "Missing message or invalid history", body = crate::error::ApiError),
        (status = 500, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;

    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Message is required".to_string()))?;

    let reply = state
        .chat
        .chat(&message, req.conversation_history)
        .await?;

    Ok(Json(ChatResponse {
        response: reply.response,
        products: reply.products,
        conversation_history: reply.conversation_history,
    }))
}

/// Start a new conversation
#[utoipa::path(
    post,
    path = "/chat/reset",
    tag = "chat",
    responses(
        (status = 200, description = "Empty history", body = ResetResponse)
    )
)]
pub async fn reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ResetResponse {
        message: "Conversation reset".to_string(),
        conversation_history: state.chat.reset(),
    })
}
