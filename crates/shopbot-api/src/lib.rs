//! Shopbot API - HTTP gateway
//!
//! Exposes catalog indexing, webhooks, semantic search and chat over HTTP.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    let body_limit = DefaultBodyLimit::max(state.config.server.max_body_size);

    Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", routes::ApiDoc::openapi()),
        )
        .merge(routes::api_routes())
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(allowed)
    }
}

/// Router over in-process fakes: memory index, hashing embedder, scripted
/// chat model and the sample catalog
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(test_state()))
}

/// Application state backed by in-process fakes
#[cfg(feature = "test-utils")]
pub fn test_state() -> AppState {
    use shopbot_core::config::VectorConfig;
    use shopbot_rag::ScriptedClient;
    use shopbot_vector::{HashingEmbedding, MemoryIndex};

    let dimension = VectorConfig::default().dimension;
    test_state_with(
        Arc::new(HashingEmbedding::new(dimension)),
        Arc::new(MemoryIndex::new(dimension)),
        Arc::new(ScriptedClient::new(
            "Here are the products that best match your request.",
        )),
    )
}

/// Application state over the given providers, the memory backend and the
/// sample catalog
#[cfg(feature = "test-utils")]
pub fn test_state_with(
    embedder: Arc<dyn shopbot_vector::EmbeddingClient>,
    index: Arc<dyn shopbot_vector::VectorIndex>,
    llm: Arc<dyn shopbot_core::LlmClient>,
) -> AppState {
    use shopbot_core::config::{AppConfig, VectorBackend};
    use shopbot_rag::ChatEngine;
    use shopbot_sync::{sample_catalog, CatalogSync, StaticCatalog};

    let mut config = AppConfig::default();
    config.vector.backend = VectorBackend::Memory;

    let catalog = Arc::new(StaticCatalog::new(sample_catalog()));
    let sync = CatalogSync::new(embedder.clone(), index.clone(), catalog);
    let chat = ChatEngine::new(embedder, index, llm, config.chat.clone());

    AppState::new(config, Arc::new(sync), Arc::new(chat))
}
