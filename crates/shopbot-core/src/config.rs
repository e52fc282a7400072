//! Shopbot Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Vector index configuration
    pub vector: VectorConfig,

    /// Embedding and chat-completion provider configuration
    pub llm: LlmConfig,

    /// Catalog service configuration
    pub catalog: CatalogConfig,

    /// Chat pipeline configuration
    pub chat: ChatConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load from `SHOPBOT_CONFIG` if set, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("SHOPBOT_CONFIG") {
            Ok(path) => Self::from_file(path)?.with_env_override(),
            Err(_) => Self::from_env(),
        }
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Server
        env_string("API_HOST", &mut self.server.host);
        env_parse("API_PORT", &mut self.server.port)?;
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Vector index
        env_parse("VECTOR_BACKEND", &mut self.vector.backend)?;
        env_string("QDRANT_URL", &mut self.vector.qdrant_url);
        env_option("QDRANT_API_KEY", &mut self.vector.qdrant_api_key);
        env_string("QDRANT_COLLECTION", &mut self.vector.collection);

        // Providers
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
            let defaults = LlmConfig::for_provider(self.llm.provider);
            self.llm.model = defaults.model;
            self.llm.embedding_model = defaults.embedding_model;
            self.vector.dimension = self.llm.embedding_dimension();
        }
        env_option("MISTRAL_API_KEY", &mut self.llm.mistral_api_key);
        env_option("OPENAI_API_KEY", &mut self.llm.openai_api_key);
        env_option("LLM_BASE_URL", &mut self.llm.base_url);
        env_string("OLLAMA_URL", &mut self.llm.ollama_url);
        env_string("LLM_MODEL", &mut self.llm.model);
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
            self.vector.dimension = self.llm.embedding_dimension();
        }
        // Explicit dimension wins over the model table
        env_parse("VECTOR_DIMENSION", &mut self.vector.dimension)?;
        env_parse("LLM_TEMPERATURE", &mut self.llm.temperature)?;
        env_parse("LLM_MAX_TOKENS", &mut self.llm.max_tokens)?;
        env_parse("LLM_TIMEOUT_SECS", &mut self.llm.timeout_secs)?;

        // Catalog
        env_string("PRODUCT_SERVICE_URL", &mut self.catalog.url);
        env_parse("CATALOG_FALLBACK", &mut self.catalog.fallback_to_sample)?;

        // Chat
        env_parse("CHAT_TOP_K", &mut self.chat.top_k)?;
        env_parse("CHAT_MAX_HISTORY", &mut self.chat.max_history_turns)?;

        // Logging
        env_string("LOG_LEVEL", &mut self.logging.level);
        env_parse("LOG_JSON", &mut self.logging.json_format)?;

        Ok(self)
    }
}

fn env_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn env_option(key: &str, target: &mut Option<String>) {
    if let Ok(value) = std::env::var(key) {
        if !value.trim().is_empty() {
            *target = Some(value);
        }
    }
}

fn env_parse<T: FromStr>(key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(key) {
        *target = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        })?;
    }
    Ok(())
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Allowed origins for CORS (empty allows any origin)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_body_size: 2 * 1024 * 1024, // 2MB
            cors_origins: vec![],
        }
    }
}

/// Which vector index implementation to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Qdrant over gRPC
    Qdrant,
    /// In-process index, lost on restart
    Memory,
}

impl FromStr for VectorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "VECTOR_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Backend selection
    pub backend: VectorBackend,

    /// Qdrant gRPC URL
    pub qdrant_url: String,

    /// Qdrant API key (Qdrant Cloud)
    pub qdrant_api_key: Option<String>,

    /// Collection holding product vectors
    pub collection: String,

    /// Vector dimension (must match embedding model)
    pub dimension: usize,

    /// Qdrant request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Qdrant,
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_api_key: None,
            collection: "products".to_string(),
            dimension: 1024, // mistral-embed
            timeout_secs: 10,
        }
    }
}

/// Embedding and chat-completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider to use for both embeddings and chat
    pub provider: LlmProvider,

    /// Mistral API key
    pub mistral_api_key: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Base URL override for OpenAI-compatible APIs
    pub base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Chat model name
    pub model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::for_provider(LlmProvider::Mistral)
    }
}

impl LlmConfig {
    /// Defaults for a given provider
    pub fn for_provider(provider: LlmProvider) -> Self {
        let (model, embedding_model) = match provider {
            LlmProvider::Mistral => ("mistral-large-latest", "mistral-embed"),
            LlmProvider::OpenAI => ("gpt-4o-mini", "text-embedding-3-small"),
            LlmProvider::Ollama => ("llama3.1", "mxbai-embed-large"),
        };

        Self {
            provider,
            mistral_api_key: None,
            openai_api_key: None,
            base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: model.to_string(),
            embedding_model: embedding_model.to_string(),
            max_tokens: 500,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }

    /// API key for the configured provider, if it needs one
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            LlmProvider::Mistral => self.mistral_api_key.as_deref(),
            LlmProvider::OpenAI => self.openai_api_key.as_deref(),
            LlmProvider::Ollama => None,
        }
    }

    /// Base URL for the provider's HTTP API
    pub fn api_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider {
            LlmProvider::Mistral => "https://api.mistral.ai/v1".to_string(),
            LlmProvider::OpenAI => "https://api.openai.com/v1".to_string(),
            LlmProvider::Ollama => self.ollama_url.trim_end_matches('/').to_string(),
        }
    }

    /// Output dimension of the configured embedding model
    pub fn embedding_dimension(&self) -> usize {
        match self.embedding_model.as_str() {
            "mistral-embed" => 1024,
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 1024,
        }
    }
}

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Mistral,
    OpenAI,
    Ollama,
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mistral" => Ok(Self::Mistral),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Catalog service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Endpoint returning the product list as JSON
    pub url: String,

    /// Use the built-in sample catalog when the service is unreachable
    pub fallback_to_sample: bool,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api/products".to_string(),
            fallback_to_sample: true,
            timeout_secs: 10,
        }
    }
}

/// Chat pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Products retrieved per question
    pub top_k: usize,

    /// Most recent history turns kept per request
    pub max_history_turns: usize,

    /// Maximum characters in one message or history turn
    pub max_message_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_history_turns: 20,
            max_message_chars: 4000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl From<ConfigError> for crate::ShopbotError {
    fn from(err: ConfigError) -> Self {
        crate::ShopbotError::ConfigError(err.to_string())
    }
}
