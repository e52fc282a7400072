//! Shopbot Sync - Catalog to vector index synchronisation
//!
//! Turns product records into searchable text, embeds them and writes them
//! to the vector index, either in bulk (reindex) or one product at a time
//! (webhook events from the catalog service).

use serde::{Deserialize, Serialize};
use shopbot_core::{ProductId, ProductRecord, Result, ShopbotError, VectorRecord};
use shopbot_vector::{EmbeddingClient, VectorIndex};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod catalog;
pub mod text;

pub use catalog::{sample_catalog, CatalogSource, HttpCatalog, StaticCatalog};
pub use text::build_searchable_text;

// ============================================================================
// Types
// ============================================================================

/// Where a reindex batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogOrigin {
    /// Supplied by the caller
    Request,
    /// Fetched from the catalog service
    Catalog,
    /// Built-in sample catalog
    Sample,
}

impl fmt::Display for CatalogOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Catalog => write!(f, "catalog"),
            Self::Sample => write!(f, "sample"),
        }
    }
}

/// Outcome of a bulk reindex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReindexReport {
    /// Records written by this run
    pub indexed: usize,

    /// Records in the collection afterwards
    pub total_indexed: u64,

    pub source: CatalogOrigin,
}

/// Index readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub indexed: u64,
    pub ready: bool,
}

/// Product change notified by the catalog service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Product created or updated
    Upsert,
    /// Product deleted
    Delete,
}

impl FromStr for WebhookEvent {
    type Err = ShopbotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "create" | "created" | "update" | "updated" | "product.created"
            | "product.updated" => Ok(Self::Upsert),
            "delete" | "deleted" | "product.deleted" => Ok(Self::Delete),
            other => Err(ShopbotError::ValidationError(format!(
                "Unknown webhook event: {other}"
            ))),
        }
    }
}

// ============================================================================
// Sync Orchestrator
// ============================================================================

/// Keeps the vector index in line with the catalog
pub struct CatalogSync {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    catalog: Arc<dyn CatalogSource>,
    fallback_to_sample: bool,
}

impl CatalogSync {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        catalog: Arc<dyn CatalogSource>,
    ) -> Self {
        Self {
            embedder,
            index,
            catalog,
            fallback_to_sample: true,
        }
    }

    /// Use the sample catalog when the catalog service cannot be read
    pub fn with_sample_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_sample = enabled;
        self
    }

    /// Make sure the vector collection exists
    pub async fn prepare(&self) -> Result<()> {
        self.index.ensure_collection().await
    }

    /// Embed and index a batch of products
    ///
    /// With no products supplied the catalog source is read instead.
    pub async fn reindex(&self, products: Option<Vec<ProductRecord>>) -> Result<ReindexReport> {
        let (products, source) = match products {
            Some(products) if !products.is_empty() => (products, CatalogOrigin::Request),
            _ => self.load_catalog().await?,
        };

        let products = dedup_last_wins(products);
        for product in &products {
            product.validate()?;
        }

        tracing::info!(count = products.len(), %source, "Reindexing products");

        if !products.is_empty() {
            let texts: Vec<String> = products.iter().map(build_searchable_text).collect();

            tracing::debug!("Generating {} embeddings", texts.len());
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != products.len() {
                return Err(ShopbotError::EmbeddingError(format!(
                    "Embedder returned {} vectors for {} products",
                    vectors.len(),
                    products.len()
                )));
            }

            let records: Vec<VectorRecord> = products
                .iter()
                .zip(vectors)
                .map(|(product, vector)| VectorRecord::new(product, vector))
                .collect();

            self.index.upsert(records).await?;
        }

        let total_indexed = self.index.count().await;
        tracing::info!(indexed = products.len(), total_indexed, "Reindex complete");

        Ok(ReindexReport {
            indexed: products.len(),
            total_indexed,
            source,
        })
    }

    /// Apply a single webhook event
    pub async fn sync_product(&self, event: WebhookEvent, product: &ProductRecord) -> Result<()> {
        match event {
            WebhookEvent::Upsert => self.index_product(product).await,
            WebhookEvent::Delete => self.remove_product(&product.id).await,
        }
    }

    /// Embed and upsert one product
    pub async fn index_product(&self, product: &ProductRecord) -> Result<()> {
        product.validate()?;

        let text = build_searchable_text(product);
        let vector = self.embedder.embed(&text).await?;
        self.index
            .upsert(vec![VectorRecord::new(product, vector)])
            .await?;

        tracing::info!(product_id = %product.id, name = %product.name, "Product indexed");
        Ok(())
    }

    /// Remove one product; unknown ids are not an error
    pub async fn remove_product(&self, id: &ProductId) -> Result<()> {
        self.index.delete(std::slice::from_ref(id)).await?;
        tracing::info!(product_id = %id, "Product removed from index");
        Ok(())
    }

    /// Remove every indexed product
    pub async fn clear(&self) -> Result<()> {
        self.index.delete_all().await?;
        tracing::info!("Vector index cleared");
        Ok(())
    }

    pub async fn status(&self) -> IndexStatus {
        let indexed = self.index.count().await;
        IndexStatus {
            indexed,
            ready: indexed > 0,
        }
    }

    async fn load_catalog(&self) -> Result<(Vec<ProductRecord>, CatalogOrigin)> {
        match self.catalog.fetch_all().await {
            Ok(products) => Ok((products, CatalogOrigin::Catalog)),
            Err(e) if self.fallback_to_sample => {
                tracing::warn!(
                    catalog = %self.catalog.describe(),
                    error = %e,
                    "Catalog unavailable, indexing sample products"
                );
                Ok((sample_catalog(), CatalogOrigin::Sample))
            }
            Err(e) => Err(e),
        }
    }
}

/// Keep one record per id, the last one supplied, at the position of the
/// first occurrence
fn dedup_last_wins(products: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let mut positions: HashMap<ProductId, usize> = HashMap::new();
    let mut unique: Vec<ProductRecord> = Vec::with_capacity(products.len());

    for product in products {
        match positions.get(&product.id) {
            Some(&pos) => unique[pos] = product,
            None => {
                positions.insert(product.id.clone(), unique.len());
                unique.push(product);
            }
        }
    }
    unique
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shopbot_vector::{FailingEmbedding, FailingIndex, HashingEmbedding, MemoryIndex};

    const DIM: usize = 64;

    /// Drops the last vector of every batch
    struct ShortEmbedding(HashingEmbedding);

    #[async_trait]
    impl EmbeddingClient for ShortEmbedding {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut vectors = self.0.embed_batch(texts).await?;
            vectors.pop();
            Ok(vectors)
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }
    }

    struct DownCatalog;

    #[async_trait]
    impl CatalogSource for DownCatalog {
        async fn fetch_all(&self) -> Result<Vec<ProductRecord>> {
            Err(ShopbotError::CatalogError("connection refused".to_string()))
        }

        fn describe(&self) -> String {
            "down".to_string()
        }
    }

    fn sync_with(catalog: Arc<dyn CatalogSource>) -> (CatalogSync, Arc<MemoryIndex>) {
        let index = Arc::new(MemoryIndex::new(DIM));
        let sync = CatalogSync::new(
            Arc::new(HashingEmbedding::new(DIM)),
            index.clone(),
            catalog,
        );
        (sync, index)
    }

    fn shoe_and_hat() -> Vec<ProductRecord> {
        vec![
            ProductRecord::new(1u64, "Red Shoe").with_price(50.0),
            ProductRecord::new(2u64, "Blue Hat").with_price(20.0),
        ]
    }

    #[test]
    fn test_webhook_event_parsing() {
        assert_eq!("created".parse::<WebhookEvent>().unwrap(), WebhookEvent::Upsert);
        assert_eq!("product.updated".parse::<WebhookEvent>().unwrap(), WebhookEvent::Upsert);
        assert_eq!("DELETE".parse::<WebhookEvent>().unwrap(), WebhookEvent::Delete);
        assert!(matches!(
            "archived".parse::<WebhookEvent>(),
            Err(ShopbotError::ValidationError(_))
        ));
    }

    #[test]
    fn test_dedup_keeps_last_record() {
        let products = vec![
            ProductRecord::new(1u64, "Red Shoe"),
            ProductRecord::new(2u64, "Blue Hat"),
            ProductRecord::new(1u64, "Crimson Shoe"),
        ];
        let unique = dedup_last_wins(products);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name, "Crimson Shoe");
        assert_eq!(unique[1].name, "Blue Hat");
    }

    #[tokio::test]
    async fn test_reindex_supplied_products() {
        let (sync, _) = sync_with(Arc::new(DownCatalog));
        let report = sync.reindex(Some(shoe_and_hat())).await.unwrap();

        assert_eq!(report.indexed, 2);
        assert_eq!(report.total_indexed, 2);
        assert_eq!(report.source, CatalogOrigin::Request);
        assert_eq!(
            sync.status().await,
            IndexStatus {
                indexed: 2,
                ready: true
            }
        );
    }

    #[tokio::test]
    async fn test_reindex_twice_is_idempotent() {
        let (sync, _) = sync_with(Arc::new(DownCatalog));
        sync.reindex(Some(shoe_and_hat())).await.unwrap();
        let report = sync.reindex(Some(shoe_and_hat())).await.unwrap();
        assert_eq!(report.total_indexed, 2);
    }

    #[tokio::test]
    async fn test_reindex_falls_back_to_sample() {
        let (sync, _) = sync_with(Arc::new(DownCatalog));
        let report = sync.reindex(None).await.unwrap();

        assert_eq!(report.source, CatalogOrigin::Sample);
        assert_eq!(report.indexed, 8);
        assert_eq!(report.total_indexed, 8);
    }

    #[tokio::test]
    async fn test_reindex_without_fallback_fails() {
        let (sync, index) = sync_with(Arc::new(DownCatalog));
        let sync = sync.with_sample_fallback(false);

        let err = sync.reindex(Some(Vec::new())).await.unwrap_err();
        assert!(matches!(err, ShopbotError::CatalogError(_)));
        assert_eq!(index.count().await, 0);
    }

    #[tokio::test]
    async fn test_reindex_from_catalog() {
        let (sync, _) = sync_with(Arc::new(StaticCatalog::new(shoe_and_hat())));
        let report = sync.reindex(None).await.unwrap();
        assert_eq!(report.source, CatalogOrigin::Catalog);
        assert_eq!(report.indexed, 2);
    }

    #[tokio::test]
    async fn test_invalid_product_aborts_batch() {
        let (sync, index) = sync_with(Arc::new(DownCatalog));
        let mut products = shoe_and_hat();
        products.push(ProductRecord::new(3u64, "  "));

        let err = sync.reindex(Some(products)).await.unwrap_err();
        assert!(matches!(err, ShopbotError::ValidationError(_)));
        assert_eq!(index.count().await, 0);
    }

    #[tokio::test]
    async fn test_webhook_upsert_then_delete() {
        let (sync, index) = sync_with(Arc::new(DownCatalog));
        sync.reindex(Some(shoe_and_hat())).await.unwrap();

        let scarf = ProductRecord::new(3u64, "Wool Scarf").with_stock(2);
        sync.sync_product(WebhookEvent::Upsert, &scarf).await.unwrap();
        assert_eq!(index.count().await, 3);

        sync.sync_product(WebhookEvent::Delete, &scarf).await.unwrap();
        assert_eq!(index.count().await, 2);

        // Deleting again is a no-op
        sync.remove_product(&ProductId::Num(3)).await.unwrap();
        assert_eq!(index.count().await, 2);
    }

    #[tokio::test]
    async fn test_short_embedding_batch_aborts_reindex() {
        let index = Arc::new(MemoryIndex::new(DIM));
        let sync = CatalogSync::new(
            Arc::new(ShortEmbedding(HashingEmbedding::new(DIM))),
            index.clone(),
            Arc::new(DownCatalog),
        );

        let err = sync.reindex(Some(shoe_and_hat())).await.unwrap_err();
        assert!(matches!(err, ShopbotError::EmbeddingError(_)));
        assert_eq!(index.count().await, 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_index_unchanged() {
        let (healthy, index) = sync_with(Arc::new(DownCatalog));
        healthy.reindex(Some(shoe_and_hat())).await.unwrap();

        let broken = CatalogSync::new(
            Arc::new(FailingEmbedding::new(DIM)),
            index.clone(),
            Arc::new(DownCatalog),
        );

        let renamed = ProductRecord::new(1u64, "Crimson Shoe");
        let err = broken
            .sync_product(WebhookEvent::Upsert, &renamed)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopbotError::EmbeddingError(_)));

        let err = broken.reindex(None).await.unwrap_err();
        assert!(matches!(err, ShopbotError::EmbeddingError(_)));

        assert_eq!(index.count().await, 2);
        let hits = index.search(&[1.0; DIM], 10, None).await.unwrap();
        assert!(hits.iter().any(|h| h.product.name == "Red Shoe"));
        assert!(hits.iter().all(|h| h.product.name != "Crimson Shoe"));
    }

    #[tokio::test]
    async fn test_status_degrades_when_index_is_down() {
        let sync = CatalogSync::new(
            Arc::new(HashingEmbedding::new(DIM)),
            Arc::new(FailingIndex::new(DIM)),
            Arc::new(DownCatalog),
        );

        assert_eq!(
            sync.status().await,
            IndexStatus {
                indexed: 0,
                ready: false
            }
        );
        let err = sync.reindex(Some(shoe_and_hat())).await.unwrap_err();
        assert!(matches!(err, ShopbotError::VectorError(_)));
    }

    #[tokio::test]
    async fn test_clear() {
        let (sync, _) = sync_with(Arc::new(DownCatalog));
        sync.reindex(Some(shoe_and_hat())).await.unwrap();
        sync.clear().await.unwrap();

        assert_eq!(
            sync.status().await,
            IndexStatus {
                indexed: 0,
                ready: false
            }
        );
    }
}
