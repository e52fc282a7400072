//! Qdrant implementation of the product vector index
//!
//! Points are keyed by product id (numeric ids map to integer point ids,
//! string ids to a stable UUID) and carry the product payload, so a search
//! hit can be rendered without calling back into the catalog.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    self, Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    Filter, PointId, PointStruct, Range, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use shopbot_core::{
    ProductId, ProductPayload, Result, SearchFilter, SearchResult, ShopbotError, VectorConfig,
    VectorRecord,
};
use std::collections::HashMap;
use std::time::Duration;

/// Qdrant vector index
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantIndex {
    /// Build a client for the configured Qdrant instance
    ///
    /// No request is sent here; connectivity problems surface on the first
    /// call.
    pub fn new(config: &VectorConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.qdrant_url);

        if let Some(api_key) = &config.qdrant_api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ShopbotError::VectorError(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension: config.dimension,
        })
    }

    async fn collection_exists(&self) -> Result<bool> {
        let collections = self.client.list_collections().await.map_err(|e| {
            ShopbotError::VectorError(format!("Failed to list collections: {e}"))
        })?;

        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }

    async fn existing_dimension(&self) -> Result<Option<u64>> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| ShopbotError::VectorError(format!("Failed to read collection: {e}")))?;

        Ok(info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|vc| vc.config)
            .and_then(|config| match config {
                qdrant::vectors_config::Config::Params(p) => Some(p.size),
                qdrant::vectors_config::Config::ParamsMap(_) => None,
            }))
    }
}

fn point_id(id: &ProductId) -> PointId {
    match id {
        ProductId::Num(n) => PointId::from(*n),
        ProductId::Text(s) => match id.as_uuid() {
            Some(uuid) => PointId::from(uuid.to_string()),
            None => PointId::from(s.clone()),
        },
    }
}

fn build_filter(filter: &SearchFilter) -> Filter {
    let mut conditions = Vec::new();

    if let Some(category) = &filter.category {
        conditions.push(Condition::matches("category", category.clone()));
    }

    if filter.in_stock_only {
        conditions.push(Condition::range(
            "stock",
            Range {
                gt: Some(0.0),
                ..Default::default()
            },
        ));
    }

    Filter::must(conditions)
}

fn payload_to_qdrant(payload: &ProductPayload) -> Result<HashMap<String, QdrantValue>> {
    let value = serde_json::to_value(payload)
        .map_err(|e| ShopbotError::VectorError(format!("Failed to encode payload: {e}")))?;

    let mut result = HashMap::new();
    if let serde_json::Value::Object(map) = value {
        for (key, val) in map {
            if let Some(qdrant_val) = json_to_qdrant_value(val) {
                result.insert(key, qdrant_val);
            }
        }
    }
    Ok(result)
}

fn qdrant_to_payload(payload: HashMap<String, QdrantValue>) -> Option<ProductPayload> {
    let map: serde_json::Map<String, serde_json::Value> = payload
        .into_iter()
        .filter_map(|(k, v)| qdrant_value_to_json(v).map(|json| (k, json)))
        .collect();

    serde_json::from_value(serde_json::Value::Object(map)).ok()
}

fn json_to_qdrant_value(val: serde_json::Value) -> Option<QdrantValue> {
    match val {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(QdrantValue::from(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(QdrantValue::from(i))
            } else if let Some(u) = n.as_u64() {
                // Qdrant integers are signed; larger ids round-trip as text
                Some(QdrantValue::from(u.to_string()))
            } else {
                n.as_f64().map(QdrantValue::from)
            }
        }
        serde_json::Value::String(s) => Some(QdrantValue::from(s)),
        other => Some(QdrantValue::from(other.to_string())),
    }
}

fn qdrant_value_to_json(val: QdrantValue) -> Option<serde_json::Value> {
    use qdrant::value::Kind;

    match val.kind {
        Some(Kind::NullValue(_)) => Some(serde_json::Value::Null),
        Some(Kind::BoolValue(b)) => Some(serde_json::Value::Bool(b)),
        Some(Kind::IntegerValue(i)) => Some(serde_json::Value::Number(i.into())),
        Some(Kind::DoubleValue(f)) => {
            serde_json::Number::from_f64(f).map(serde_json::Value::Number)
        }
        Some(Kind::StringValue(s)) => Some(serde_json::Value::String(s)),
        _ => None,
    }
}

#[async_trait]
impl super::VectorIndex for QdrantIndex {
    async fn ensure_collection(&self) -> Result<()> {
        if self.collection_exists().await? {
            if let Some(size) = self.existing_dimension().await? {
                if size != self.dimension as u64 {
                    return Err(ShopbotError::ConfigError(format!(
                        "Collection '{}' has dimension {size}, configured dimension is {}",
                        self.collection, self.dimension
                    )));
                }
            }
            return Ok(());
        }

        let created = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await;

        match created {
            Ok(_) => {
                tracing::info!(
                    collection = %self.collection,
                    dimension = self.dimension,
                    "Created vector collection"
                );
                Ok(())
            }
            Err(e) => {
                // Another instance may have created it between the list and the create
                if self.collection_exists().await.unwrap_or(false) {
                    tracing::debug!(
                        collection = %self.collection,
                        error = %e,
                        "Collection created concurrently"
                    );
                    return Ok(());
                }
                Err(ShopbotError::VectorError(format!(
                    "Failed to create collection: {e}"
                )))
            }
        }
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        super::check_dimensions(&records, self.dimension)?;

        let points = records
            .into_iter()
            .map(|record| {
                Ok(PointStruct::new(
                    point_id(&record.id),
                    record.vector,
                    payload_to_qdrant(&record.payload)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| ShopbotError::VectorError(format!("Failed to upsert vectors: {e}")))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut builder =
            SearchPointsBuilder::new(&self.collection, query_vector.to_vec(), limit as u64)
                .with_payload(true);

        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            builder = builder.filter(build_filter(filter));
        }

        let results = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| ShopbotError::VectorError(format!("Vector search failed: {e}")))?;

        let hits = results
            .result
            .into_iter()
            .filter_map(|point| {
                let score = point.score;
                match qdrant_to_payload(point.payload) {
                    Some(product) => Some(SearchResult { score, product }),
                    None => {
                        tracing::warn!(point = ?point.id, "Skipping point with unreadable payload");
                        None
                    }
                }
            })
            .collect();

        Ok(hits)
    }

    async fn delete(&self, ids: &[ProductId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let points: Vec<PointId> = ids.iter().map(point_id).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(points)
                    .wait(true),
            )
            .await
            .map_err(|e| ShopbotError::VectorError(format!("Failed to delete vectors: {e}")))?;

        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        // An empty filter selects every point
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Filter::default())
                    .wait(true),
            )
            .await
            .map_err(|e| ShopbotError::VectorError(format!("Failed to clear collection: {e}")))?;

        Ok(())
    }

    async fn count(&self) -> u64 {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await;

        match response {
            Ok(response) => response.result.map(|r| r.count).unwrap_or(0),
            Err(e) => {
                tracing::warn!(
                    collection = %self.collection,
                    error = %e,
                    "Failed to count vectors"
                );
                0
            }
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
