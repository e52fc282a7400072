//! Shopbot Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout Shopbot:
//! - Catalog models (product records, ids, display payloads)
//! - Vector index records and search results
//! - Conversation turns for the stateless chat contract
//! - Common error types
//! - The chat-completion client trait
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, CatalogConfig, ChatConfig, ConfigError, LlmConfig, LlmProvider, LoggingConfig,
    ServerConfig, VectorBackend, VectorConfig,
};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Shopbot operations
#[derive(Error, Debug)]
pub enum ShopbotError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Vector index error: {0}")]
    VectorError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ShopbotError>;

// ============================================================================
// Catalog Models
// ============================================================================

/// Externally assigned product identifier
///
/// The catalog hands out numeric ids, but string ids are accepted too.
/// Numeric strings are normalised to `Num` so `"7"` and `7` address the
/// same indexed record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ProductId {
    Num(u64),
    Text(String),
}

impl ProductId {
    /// Stable UUID for string ids, used where the vector engine only accepts
    /// unsigned integers or UUIDs.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Num(_) => None,
            Self::Text(s) => Some(
                Uuid::parse_str(s)
                    .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, s.as_bytes())),
            ),
        }
    }
}

impl From<u64> for ProductId {
    fn from(id: u64) -> Self {
        Self::Num(id)
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        match id.trim().parse::<u64>() {
            Ok(n) => Self::Num(n),
            Err(_) => Self::Text(id),
        }
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::from(id.to_string())
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Self::Num(n),
            Raw::Text(s) => Self::from(s),
        })
    }
}

/// A product as read from the catalog service
///
/// The catalog is the source of truth; Shopbot only mirrors these records
/// into its vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Catalog id, also the vector index key
    pub id: ProductId,

    /// Product name
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Category label
    #[serde(default)]
    pub category: String,

    /// Unit price in euros
    #[serde(default)]
    pub price: Option<f64>,

    /// Units in stock
    #[serde(default)]
    pub stock: Option<i64>,

    /// Image reference (path or URL)
    #[serde(default, alias = "imageUrl", alias = "image_url")]
    pub image: Option<String>,
}

impl ProductRecord {
    /// Create a product with only the required fields set
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            price: None,
            stock: None,
            image: None,
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set price
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Set stock
    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }

    /// Set image reference
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Check the record before it enters the indexing pipeline
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ShopbotError::ValidationError(format!(
                "Product {} has an empty name",
                self.id
            )));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(ShopbotError::ValidationError(format!(
                    "Product {} has an invalid price: {price}",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Product fields stored alongside each vector for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub image: Option<String>,
}

impl ProductPayload {
    /// Whether at least one unit is in stock
    pub fn in_stock(&self) -> bool {
        self.stock.is_some_and(|s| s > 0)
    }
}

impl From<&ProductRecord> for ProductPayload {
    fn from(product: &ProductRecord) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            price: product.price,
            stock: product.stock,
            image: product.image.clone(),
        }
    }
}

// ============================================================================
// Vector Index Types
// ============================================================================

/// A product embedding ready to be written to the vector index
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Same id as the owning product
    pub id: ProductId,

    /// Embedding, length must match the collection dimension
    pub vector: Vec<f32>,

    /// Display payload
    pub payload: ProductPayload,
}

impl VectorRecord {
    /// Attach an embedding to a product
    pub fn new(product: &ProductRecord, vector: Vec<f32>) -> Self {
        Self {
            id: product.id.clone(),
            vector,
            payload: ProductPayload::from(product),
        }
    }
}

/// Nearest-neighbour hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Similarity (higher is more relevant)
    pub score: f32,

    /// Stored product payload
    pub product: ProductPayload,
}

/// Optional restrictions applied to a similarity search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Only products in this category
    pub category: Option<String>,

    /// Only products with stock > 0
    #[serde(default)]
    pub in_stock_only: bool,
}

impl SearchFilter {
    /// Whether the filter restricts anything
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && !self.in_stock_only
    }

    /// Evaluate the filter against a payload
    pub fn matches(&self, product: &ProductPayload) -> bool {
        let category_ok = self
            .category
            .as_ref()
            .map(|c| product.category == *c)
            .unwrap_or(true);

        category_ok && (!self.in_stock_only || product.in_stock())
    }
}

// ============================================================================
// Conversation Types
// ============================================================================

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for chat-completion clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate the assistant reply for an ordered message list
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String>;

    /// Generate a response to a single user prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(&[ConversationTurn::user(prompt)]).await
    }

    /// Model name for logging
    fn model(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
