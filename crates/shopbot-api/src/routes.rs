//! API route definitions

use crate::handlers::{assist, chat, health, products, search, webhook};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

/// OpenAPI documentation for the Shopbot API
#[derive(OpenApi)]
#[openapi(
    info(title = "Shopbot API", description = "Catalog vectorization and product chat"),
    paths(
        health::health_check,
        products::index_products,
        products::index_status,
        products::clear_products,
        webhook::product_event,
        webhook::delete_product,
        webhook::webhook_health,
        search::search,
        chat::chat,
        chat::reset,
        assist::detect_intent,
        assist::assist,
    ),
    components(schemas(
        crate::error::ApiError,
        health::HealthResponse,
        products::IndexRequest,
        products::IndexResponse,
        products::StatusResponse,
        products::ClearResponse,
        webhook::WebhookRequest,
        webhook::WebhookResponse,
        webhook::DeleteResponse,
        webhook::WebhookHealthResponse,
        search::SearchRequest,
        search::SearchHit,
        search::SearchResponse,
        chat::ChatRequest,
        chat::ChatResponse,
        chat::ResetResponse,
        assist::IntentRequest,
        assist::IntentResponse,
        assist::AssistRequest,
        assist::AssistResponse,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "products", description = "Bulk indexing"),
        (name = "webhook", description = "Catalog change notifications"),
        (name = "search", description = "Semantic product search"),
        (name = "chat", description = "Retrieval-augmented chat"),
    )
)]
pub struct ApiDoc;

/// Create API routes
pub fn api_routes() -> Router<Arc<AppState>> {
    let product_routes = Router::new()
        .route("/products", delete(products::clear_products))
        .route("/products/index", post(products::index_products))
        .route("/products/status", get(products::index_status));

    let webhook_routes = Router::new()
        .route("/webhook/product", post(webhook::product_event))
        .route("/webhook/product/:id", delete(webhook::delete_product))
        .route("/webhook/health", get(webhook::webhook_health));

    let chat_routes = Router::new()
        .route("/search", post(search::search))
        .route("/chat", post(chat::chat))
        .route("/chat/reset", post(chat::reset))
        .route("/intent", post(assist::detect_intent))
        .route("/assist", post(assist::assist));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(product_routes)
        .merge(webhook_routes)
        .merge(chat_routes)
}
