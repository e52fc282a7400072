//! Intent classification and intent-routed answers

use crate::error::AppError;
use crate::handlers::search::SearchHit;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use shopbot_rag::Intent;
use std::sync::Arc;
use utoipa::ToSchema;

const DEFAULT_TOP_K: usize = 5;
const MAX_TOP_K: usize = 50;

#[derive(Debug, Deserialize, ToSchema)]
pub struct IntentRequest {
    #[schema(example = "Do you ship to Belgium?")]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntentResponse {
    /// `product_search`, `faq` or `other`
    #[schema(value_type = String, example = "faq")]
    pub intent: Intent,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssistRequest {
    #[schema(example = "I need running shoes under 100€")]
    pub prompt: Option<String>,

    /// Products retrieved for a product search, clamped to 1..=50
    #[schema(example = 5, default = 5)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssistResponse {
    pub response: String,
    pub results: Vec<SearchHit>,
    #[schema(value_type = String, example = "product_search")]
    pub intent: Intent,
}

fn required_prompt(prompt: Option<String>) -> Result<String, AppError> {
    prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Prompt is required".to_string()))
}

/// Classify a shopper prompt
#[utoipa::path(
    post,
    path = "/intent",
    tag = "chat",
    request_body = IntentRequest,
    responses(
        (status = 200, description = "Intent label", body = IntentResponse),
        (status = 400, description = "Missing prompt", body = crate::error::ApiError),
        (status = 500, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn detect_intent(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IntentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let prompt = required_prompt(req.prompt)?;

    let intent = state.chat.classify(&prompt).await?;
    Ok(Json(IntentResponse { intent }))
}

/// Answer a single prompt with intent-specific guidance
#[utoipa::path(
    post,
    path = "/assist",
    tag = "chat",
    request_body = AssistRequest,
    responses(
        (status = 200, description = "Routed answer", body = AssistResponse),
        (status = 400, description = "Missing prompt", body = crate::error::ApiError),
        (status = 500, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn assist(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AssistRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let prompt = required_prompt(req.prompt)?;
    let top_k = req.top_k.unwrap_or(DEFAULT_TOP_K).clamp(1, MAX_TOP_K);

    let reply = state.chat.assist(&prompt, top_k).await?;

    Ok(Json(AssistResponse {
        response: reply.response,
        results: reply.results.into_iter().map(SearchHit::from).collect(),
        intent: reply.intent,
    }))
}
