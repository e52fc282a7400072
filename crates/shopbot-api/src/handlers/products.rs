//! Bulk indexing handlers

use crate::error::AppError;
use crate::state::AppState;
use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use shopbot_core::ProductRecord;
use shopbot_sync::CatalogOrigin;
use std::sync::Arc;
use utoipa::ToSchema;

/// Reindex request body; omit `products` to read the catalog service
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct IndexRequest {
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub products: Option<Vec<ProductRecord>>,
}

/// Reindex result
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub success: bool,
    #[schema(example = "8 products indexed successfully")]
    pub message: String,
    /// Records in the collection after the run
    pub total_indexed: u64,
    /// Records written by this run
    pub indexed: usize,
    /// `request`, `catalog` or `sample`
    #[schema(value_type = String, example = "catalog")]
    pub source: CatalogOrigin,
}

/// Index readiness
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub indexed: u64,
    pub ready: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

/// Embed and index products
#[utoipa::path(
    post,
    path = "/products/index",
    tag = "products",
    request_body(content = IndexRequest, description = "Products to index; empty body reads the catalog"),
    responses(
        (status = 200, description = "Products indexed", body = IndexResponse),
        (status = 400, description = "Invalid product data", body = crate::error::ApiError),
        (status = 500, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn index_products(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // An empty body is the same as `{}`
    let req: IndexRequest = if body.iter().all(u8::is_ascii_whitespace) {
        IndexRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let report = state.sync.reindex(req.products).await?;

    Ok(Json(IndexResponse {
        success: true,
        message: format!("{} products indexed successfully", report.indexed),
        total_indexed: report.total_indexed,
        indexed: report.indexed,
        source: report.source,
    }))
}

/// Number of indexed products
#[utoipa::path(
    get,
    path = "/products/status",
    tag = "products",
    responses(
        (status = 200, description = "Index status", body = StatusResponse)
    )
)]
pub async fn index_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.sync.status().await;
    Json(StatusResponse {
        indexed: status.indexed,
        ready: status.ready,
    })
}

/// Remove every indexed product
#[utoipa::path(
    delete,
    path = "/products",
    tag = "products",
    responses(
        (status = 200, description = "Index cleared", body = ClearResponse),
        (status = 500, description = "Vector index error", body = crate::error::ApiError)
    )
)]
pub async fn clear_products(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    state.sync.clear().await?;
    Ok(Json(ClearResponse {
        success: true,
        message: "All products removed from the index".to_string(),
    }))
}
