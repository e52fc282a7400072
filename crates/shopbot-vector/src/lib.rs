//! Shopbot Vector - Embeddings and vector index abstraction
//!
//! Provides the embedding clients that turn product text into vectors and
//! the index abstraction over the vector engine (Qdrant, or an in-process
//! index for development and tests).

use async_trait::async_trait;
use shopbot_core::{
    ProductId, Result, SearchFilter, SearchResult, VectorBackend, VectorConfig, VectorRecord,
};
use std::sync::Arc;

pub mod embedding;
pub mod memory_store;
pub mod qdrant_store;

pub use embedding::{create_embedding_client, EmbeddingClient, OllamaEmbedding, OpenAiEmbedding};
#[cfg(any(test, feature = "test-utils"))]
pub use embedding::{FailingEmbedding, HashingEmbedding};
#[cfg(any(test, feature = "test-utils"))]
pub use memory_store::FailingIndex;
pub use memory_store::MemoryIndex;
pub use qdrant_store::QdrantIndex;

/// Trait for vector index operations
///
/// Writes are acknowledged only once the engine has applied them, so a
/// `search` or `count` issued after `upsert`/`delete` returns observes the
/// change.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self) -> Result<()>;

    /// Insert or replace records keyed by id
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Nearest records to `query_vector`, best first, at most `limit`
    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Remove records by id; unknown ids are ignored
    async fn delete(&self, ids: &[ProductId]) -> Result<()>;

    /// Remove every record in the collection
    async fn delete_all(&self) -> Result<()>;

    /// Number of indexed records, 0 if the engine cannot answer
    async fn count(&self) -> u64;

    /// Configured vector dimension
    fn dimension(&self) -> usize;
}

/// Create the configured vector index
pub fn create_vector_index(config: &VectorConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.backend {
        VectorBackend::Qdrant => Ok(Arc::new(QdrantIndex::new(config)?)),
        VectorBackend::Memory => {
            tracing::warn!("Using in-memory vector index; data is lost on restart");
            Ok(Arc::new(MemoryIndex::new(config.dimension)))
        }
    }
}

pub(crate) fn check_dimensions(records: &[VectorRecord], dimension: usize) -> Result<()> {
    match records.iter().find(|r| r.vector.len() != dimension) {
        Some(record) => Err(shopbot_core::ShopbotError::ValidationError(format!(
            "Vector for product {} has dimension {}, collection expects {dimension}",
            record.id,
            record.vector.len()
        ))),
        None => Ok(()),
    }
}
