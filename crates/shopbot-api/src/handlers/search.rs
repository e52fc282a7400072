//! Semantic product search

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use shopbot_core::{ProductId, SearchFilter, SearchResult};
use std::sync::Arc;
use utoipa::ToSchema;

const DEFAULT_TOP_K: usize = 5;
const MAX_TOP_K: usize = 50;
const SNIPPET_CHARS: usize = 220;

/// Search request body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[schema(example = "casque sans fil")]
    pub query: String,

    /// Number of results, clamped to 1..=50
    #[schema(example = 5, default = 5)]
    pub top_k: Option<usize>,

    /// Restrict to one category
    pub category: Option<String>,

    /// Only products with stock
    #[serde(default)]
    pub in_stock_only: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchHit {
    #[schema(value_type = Object)]
    pub id: ProductId,
    pub score: f32,
    pub name: String,
    /// Start of the description
    pub snippet: String,
}

impl From<SearchResult> for SearchHit {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.product.id,
            score: result.score,
            name: result.product.name,
            snippet: result.product.description.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

/// Products closest to a free-text query
#[utoipa::path(
    post,
    path = "/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Ranked products", body = SearchResponse),
        (status = 400, description = "Missing query", body = crate::error::ApiError),
        (status = 500, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;

    if req.query.trim().is_empty() {
        return Err(AppError::BadRequest("Query is required".to_string()));
    }

    let top_k = req.top_k.unwrap_or(DEFAULT_TOP_K).clamp(1, MAX_TOP_K);
    let filter = SearchFilter {
        category: req.category,
        in_stock_only: req.in_stock_only,
    };

    let results = state
        .chat
        .retrieve(req.query.trim(), top_k, Some(&filter))
        .await?;

    Ok(Json(SearchResponse {
        results: results.into_iter().map(SearchHit::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopbot_core::{ProductPayload, ProductRecord};

    #[test]
    fn test_snippet_is_truncated_on_chars() {
        let product = ProductRecord::new(1u64, "Casque").with_description("é".repeat(300));
        let hit = SearchHit::from(SearchResult {
            score: 0.5,
            product: ProductPayload::from(&product),
        });

        assert_eq!(hit.snippet.chars().count(), SNIPPET_CHARS);
        assert_eq!(hit.id, ProductId::Num(1));
    }
}
