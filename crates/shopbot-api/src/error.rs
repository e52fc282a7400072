//! API error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shopbot_core::ShopbotError;
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Short summary
    #[schema(example = "Message is required")]
    pub error: String,
    /// Error code
    #[schema(example = "BAD_REQUEST")]
    pub code: String,
    /// Upstream error text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    VectorIndex(String),
    Embedding(String),
    Llm(String),
    Catalog(String),
    Config(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(&msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::VectorIndex(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("VECTOR_INDEX_ERROR", "Vector index operation failed")
                    .with_details(msg),
            ),
            AppError::Embedding(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("EMBEDDING_ERROR", "Failed to generate embeddings").with_details(msg),
            ),
            AppError::Llm(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("LLM_ERROR", "Failed to process chat request").with_details(msg),
            ),
            AppError::Catalog(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("CATALOG_ERROR", "Failed to read the product catalog")
                    .with_details(msg),
            ),
            AppError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("CONFIG_ERROR", "Service is misconfigured").with_details(msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal_error().with_details(msg),
            ),
        };

        if status.is_server_error() {
            tracing::error!(code = %error.code, details = ?error.details, "{}", error.error);
        }

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<ShopbotError> for AppError {
    fn from(err: ShopbotError) -> Self {
        match err {
            ShopbotError::NotFound(msg) => AppError::NotFound(msg),
            ShopbotError::ValidationError(msg) => AppError::BadRequest(msg),
            ShopbotError::VectorError(msg) => AppError::VectorIndex(msg),
            ShopbotError::EmbeddingError(msg) => AppError::Embedding(msg),
            ShopbotError::LlmError(msg) => AppError::Llm(msg),
            ShopbotError::CatalogError(msg) => AppError::Catalog(msg),
            ShopbotError::ConfigError(msg) => AppError::Config(msg),
            ShopbotError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}
