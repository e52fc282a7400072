//! Embedding client for generating vector representations
//!
//! Supports Mistral and OpenAI (same wire format) and Ollama embedding APIs.
//! Batches always go out as a single provider call so a failure fails the
//! whole batch.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shopbot_core::{ConfigError, LlmConfig, LlmProvider, Result, ShopbotError};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| ShopbotError::EmbeddingError("No embedding returned".to_string()))
    }

    /// Generate embeddings for multiple texts, one per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

fn check_inputs(texts: &[String]) -> Result<()> {
    match texts.iter().position(|t| t.trim().is_empty()) {
        Some(i) => Err(ShopbotError::ValidationError(format!(
            "Cannot embed empty text (input {i})"
        ))),
        None => Ok(()),
    }
}

fn check_output(expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
    if embeddings.len() != expected {
        return Err(ShopbotError::EmbeddingError(format!(
            "Provider returned {} embeddings for {expected} inputs",
            embeddings.len()
        )));
    }
    Ok(())
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ShopbotError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

// ============================================================================
// OpenAI-compatible Embedding Client (Mistral, OpenAI)
// ============================================================================

/// Embedding client for `/embeddings` endpoints in the OpenAI format
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    /// Create a new client against `base_url` (e.g. `https://api.mistral.ai/v1`)
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig, dimension: usize) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            let key = match config.provider {
                LlmProvider::OpenAI => "OPENAI_API_KEY",
                _ => "MISTRAL_API_KEY",
            };
            ShopbotError::from(ConfigError::MissingRequired(key.to_string()))
        })?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key.to_string(),
            base_url: config.api_base_url(),
            model: config.embedding_model.clone(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        check_inputs(texts)?;

        let request = OpenAiEmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ShopbotError::EmbeddingError(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ShopbotError::EmbeddingError(format!(
                "Embedding provider returned {status}: {error_text}"
            )));
        }

        let result: OpenAiEmbeddingResponse = response.json().await.map_err(|e| {
            ShopbotError::EmbeddingError(format!("Failed to parse embedding response: {e}"))
        })?;

        let embeddings = ordered_embeddings(result);
        check_output(texts.len(), &embeddings)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn ordered_embeddings(response: OpenAiEmbeddingResponse) -> Vec<Vec<f32>> {
    let mut data = response.data;
    data.sort_by_key(|e| e.index);
    data.into_iter().map(|e| e.embedding).collect()
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig, dimension: usize) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.api_base_url(),
            model: config.embedding_model.clone(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        check_inputs(texts)?;

        // /api/embed accepts a list, so the batch stays a single call
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ShopbotError::EmbeddingError(format!("Ollama embedding request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ShopbotError::EmbeddingError(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            ShopbotError::EmbeddingError(format!("Failed to parse embedding response: {e}"))
        })?;

        check_output(texts.len(), &result.embeddings)?;
        Ok(result.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Hashing Embedding (tests)
// ============================================================================

/// Deterministic bag-of-words embedder that needs no network
///
/// Each lowercase token is hashed into one bucket, so texts sharing words
/// get a positive cosine similarity.
#[cfg(any(test, feature = "test-utils"))]
pub struct HashingEmbedding {
    dimension: usize,
}

#[cfg(any(test, feature = "test-utils"))]
impl HashingEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl EmbeddingClient for HashingEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        check_inputs(texts)?;
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedder whose every call fails like an unreachable provider
#[cfg(any(test, feature = "test-utils"))]
pub struct FailingEmbedding {
    dimension: usize,
}

#[cfg(any(test, feature = "test-utils"))]
impl FailingEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl EmbeddingClient for FailingEmbedding {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(ShopbotError::EmbeddingError(
            "Embedding provider returned 503 Service Unavailable".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
///
/// `dimension` is the collection dimension; it must match what the model
/// produces.
pub fn create_embedding_client(
    config: &LlmConfig,
    dimension: usize,
) -> Result<Arc<dyn EmbeddingClient>> {
    if dimension != config.embedding_dimension() {
        tracing::warn!(
            model = %config.embedding_model,
            configured = dimension,
            expected = config.embedding_dimension(),
            "Vector dimension differs from the known output size of the embedding model"
        );
    }

    match config.provider {
        LlmProvider::Mistral | LlmProvider::OpenAI => {
            Ok(Arc::new(OpenAiEmbedding::from_config(config, dimension)?))
        }
        LlmProvider::Ollama => Ok(Arc::new(OllamaEmbedding::from_config(config, dimension)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_reordered_by_index() {
        let response: OpenAiEmbeddingResponse = serde_json::from_str(
            r#"{"data": [
                {"object": "embedding", "embedding": [0.0, 1.0], "index": 1},
                {"object": "embedding", "embedding": [1.0, 0.0], "index": 0}
            ], "model": "mistral-embed"}"#,
        )
        .unwrap();

        assert_eq!(
            ordered_embeddings(response),
            vec![vec![1.0, 0.0], vec![0.0, 1.0]]
        );
    }

    #[test]
    fn test_short_batch_is_an_error() {
        let err = check_output(3, &[vec![0.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, ShopbotError::EmbeddingError(_)));
    }

    #[test]
    fn test_empty_text_rejected() {
        let err = check_inputs(&["ok".to_string(), "  ".to_string()]).unwrap_err();
        assert!(matches!(err, ShopbotError::ValidationError(_)));
    }

    #[test]
    fn test_mistral_requires_api_key() {
        let config = LlmConfig::default();
        let err = create_embedding_client(&config, 1024).err().unwrap();
        assert!(matches!(err, ShopbotError::ConfigError(_)));
    }

    #[test]
    fn test_factory_builds_ollama_without_key() {
        let config = LlmConfig::for_provider(LlmProvider::Ollama);
        let client = create_embedding_client(&config, 1024).unwrap();
        assert_eq!(client.dimension(), 1024);
    }

    #[test]
    fn test_request_serialization() {
        let texts = vec!["Red Shoe".to_string()];
        let body = serde_json::to_value(OpenAiEmbeddingRequest {
            input: &texts,
            model: "mistral-embed",
        })
        .unwrap();
        assert_eq!(body["input"][0], "Red Shoe");
        assert_eq!(body["model"], "mistral-embed");
    }

    #[tokio::test]
    async fn test_hashing_embedding_is_deterministic() {
        let embedder = HashingEmbedding::new(64);
        let a = embedder.embed("Blue Hat").await.unwrap();
        let b = embedder.embed("blue hat").await.unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hashing_embedding_batch_order() {
        let embedder = HashingEmbedding::new(64);
        let texts = vec!["Red Shoe".to_string(), "Blue Hat".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch[0], embedder.embed("Red Shoe").await.unwrap());
        assert_eq!(batch[1], embedder.embed("Blue Hat").await.unwrap());
    }
}
