//! In-process vector index
//!
//! Brute-force cosine search over a map guarded by a read/write lock. Used
//! for local development without Qdrant and by the integration tests.

use async_trait::async_trait;
use shopbot_core::{ProductId, Result, SearchFilter, SearchResult, VectorRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Vector index held entirely in memory
pub struct MemoryIndex {
    records: RwLock<HashMap<ProductId, VectorRecord>>,
    dimension: usize,
}

impl MemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            dimension,
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl super::VectorIndex for MemoryIndex {
    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        super::check_dimensions(&records, self.dimension)?;

        let mut map = self.records.write().await;
        for record in records {
            map.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>> {
        let map = self.records.read().await;

        let mut scored: Vec<(&ProductId, SearchResult)> = map
            .values()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.payload)))
            .map(|r| {
                (
                    &r.id,
                    SearchResult {
                        score: cosine_similarity(query_vector, &r.vector),
                        product: r.payload.clone(),
                    },
                )
            })
            .collect();

        // Ties are broken by id so results are stable across calls
        scored.sort_by(|(id_a, a), (id_b, b)| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| id_a.cmp(id_b))
        });
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(_, hit)| hit).collect())
    }

    async fn delete(&self, ids: &[ProductId]) -> Result<()> {
        let mut map = self.records.write().await;
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> u64 {
        self.records.read().await.len() as u64
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Index whose engine is down: every call fails and `count` reports 0
#[cfg(any(test, feature = "test-utils"))]
pub struct FailingIndex {
    dimension: usize,
}

#[cfg(any(test, feature = "test-utils"))]
impl FailingIndex {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn unavailable<T>() -> Result<T> {
        Err(shopbot_core::ShopbotError::VectorError(
            "transport error: connection refused".to_string(),
        ))
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl super::VectorIndex for FailingIndex {
    async fn ensure_collection(&self) -> Result<()> {
        Self::unavailable()
    }

    async fn upsert(&self, _records: Vec<VectorRecord>) -> Result<()> {
        Self::unavailable()
    }

    async fn search(
        &self,
        _query_vector: &[f32],
        _limit: usize,
        _filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>> {
        Self::unavailable()
    }

    async fn delete(&self, _ids: &[ProductId]) -> Result<()> {
        Self::unavailable()
    }

    async fn delete_all(&self) -> Result<()> {
        Self::unavailable()
    }

    async fn count(&self) -> u64 {
        tracing::warn!("Failed to count vectors: connection refused");
        0
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VectorIndex;
    use proptest::prelude::*;
    use shopbot_core::{ProductRecord, ShopbotError};

    fn record(id: u64, name: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord::new(&ProductRecord::new(id, name), vector)
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let index = MemoryIndex::new(2);
        let r = record(1, "Red Shoe", vec![1.0, 0.0]);

        index.upsert(vec![r.clone()]).await.unwrap();
        index.upsert(vec![r]).await.unwrap();

        assert_eq!(index.count().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_payload() {
        let index = MemoryIndex::new(2);
        index
            .upsert(vec![record(1, "Red Shoe", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(vec![record(1, "Crimson Shoe", vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].product.name, "Crimson Shoe");
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let index = MemoryIndex::new(2);
        index
            .upsert(vec![
                record(1, "Red Shoe", vec![1.0, 0.0]),
                record(2, "Blue Hat", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[0.1, 0.9], 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].product.name, "Blue Hat");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let index = MemoryIndex::new(2);
        index
            .upsert(vec![
                record(1, "Red Shoe", vec![1.0, 0.0]),
                record(2, "Blue Hat", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        index
            .delete(&[ProductId::Num(1), ProductId::Num(99)])
            .await
            .unwrap();

        assert_eq!(index.count().await, 1);
        let hits = index.search(&[1.0, 0.0], 5, None).await.unwrap();
        assert!(hits.iter().all(|h| h.product.id != ProductId::Num(1)));
    }

    #[tokio::test]
    async fn test_delete_all() {
        let index = MemoryIndex::new(2);
        index
            .upsert(vec![record(1, "Red Shoe", vec![1.0, 0.0])])
            .await
            .unwrap();
        index.delete_all().await.unwrap();
        assert_eq!(index.count().await, 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = MemoryIndex::new(3);
        let err = index
            .upsert(vec![record(1, "Red Shoe", vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, ShopbotError::ValidationError(_)));
        assert_eq!(index.count().await, 0);
    }

    #[tokio::test]
    async fn test_search_applies_filter() {
        let index = MemoryIndex::new(2);
        let shoe = ProductRecord::new(1u64, "Red Shoe")
            .with_category("Shoes")
            .with_stock(0);
        let hat = ProductRecord::new(2u64, "Blue Hat")
            .with_category("Hats")
            .with_stock(4);
        index
            .upsert(vec![
                VectorRecord::new(&shoe, vec![1.0, 0.0]),
                VectorRecord::new(&hat, vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let filter = SearchFilter {
            category: None,
            in_stock_only: true,
        };
        let hits = index.search(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].product.name, "Blue Hat");
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    proptest! {
        #[test]
        fn prop_search_is_bounded_and_sorted(
            vectors in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 0..20),
            query in prop::collection::vec(-1.0f32..1.0, 4),
            k in 0usize..10,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let hits = rt.block_on(async {
                let index = MemoryIndex::new(4);
                let records = vectors
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| record(i as u64, "Item", v))
                    .collect::<Vec<_>>();
                let total = records.len();
                index.upsert(records).await.unwrap();
                let hits = index.search(&query, k, None).await.unwrap();
                (hits, total)
            });

            let (hits, total) = hits;
            prop_assert!(hits.len() <= k);
            prop_assert_eq!(hits.len(), k.min(total));
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
