//! Catalog webhook handlers
//!
//! The catalog service calls these on every product change so the index
//! follows without a full reindex.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use shopbot_core::{ProductId, ProductRecord};
use shopbot_sync::WebhookEvent;
use std::sync::Arc;
use utoipa::ToSchema;

/// Product change notification
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookRequest {
    /// `created`, `updated`, `deleted` (or `product.*`); defaults to `updated`
    #[schema(example = "created")]
    pub event: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub product: Option<ProductRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub event: String,
    #[schema(value_type = Object)]
    pub product_id: ProductId,
    pub product_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub product_id: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookHealthResponse {
    pub status: String,
    pub service: String,
    pub endpoints: Vec<String>,
}

/// Apply a product create, update or delete
#[utoipa::path(
    post,
    path = "/webhook/product",
    tag = "webhook",
    request_body = WebhookRequest,
    responses(
        (status = 200, description = "Event applied", body = WebhookResponse),
        (status = 400, description = "Missing product or unknown event", body = crate::error::ApiError),
        (status = 500, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn product_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WebhookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;

    let product = req
        .product
        .ok_or_else(|| AppError::BadRequest("Product data is required".to_string()))?;
    let event_name = req.event.unwrap_or_else(|| "updated".to_string());
    let event: WebhookEvent = event_name.parse()?;

    tracing::info!(event = %event_name, product_id = %product.id, "Webhook received");
    state.sync.sync_product(event, &product).await?;

    let message = match event {
        WebhookEvent::Upsert => "Product indexed successfully",
        WebhookEvent::Delete => "Product deleted successfully",
    };

    Ok(Json(WebhookResponse {
        success: true,
        message: message.to_string(),
        event: event_name,
        product_id: product.id,
        product_name: product.name,
    }))
}

/// Remove a product from the index
#[utoipa::path(
    delete,
    path = "/webhook/product/{id}",
    tag = "webhook",
    params(("id" = u64, Path, description = "Numeric product id")),
    responses(
        (status = 200, description = "Product removed", body = DeleteResponse),
        (status = 400, description = "Non-numeric id", body = crate::error::ApiError),
        (status = 500, description = "Vector index error", body = crate::error::ApiError)
    )
)]
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product_id: u64 = id
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid product id: {id}")))?;

    state.sync.remove_product(&ProductId::Num(product_id)).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Product deleted successfully".to_string(),
        product_id,
    }))
}

/// Webhook liveness
#[utoipa::path(
    get,
    path = "/webhook/health",
    tag = "webhook",
    responses(
        (status = 200, description = "Webhook endpoints are up", body = WebhookHealthResponse)
    )
)]
pub async fn webhook_health() -> impl IntoResponse {
    Json(WebhookHealthResponse {
        status: "ok".to_string(),
        service: "webhook".to_string(),
        endpoints: vec![
            "POST /webhook/product".to_string(),
            "DELETE /webhook/product/:id".to_string(),
        ],
    })
}
