//! Chat-completion clients
//!
//! Mistral and OpenAI share the `/chat/completions` wire format; Ollama is
//! served through its native `/api/chat` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shopbot_core::{
    ConfigError, ConversationTurn, LlmClient, LlmConfig, LlmProvider, Result, ShopbotError,
};
use std::sync::Arc;
use std::time::Duration;

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ShopbotError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

impl From<&ConversationTurn> for Message {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role.to_string(),
            content: turn.content.clone(),
        }
    }
}

// ============================================================================
// OpenAI-compatible Client (Mistral, OpenAI)
// ============================================================================

/// Client for OpenAI-style chat completion APIs
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Choice {
    message: Message,
    finish_reason: Option<String>,
}

impl OpenAiClient {
    /// Create a client against the OpenAI endpoint
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
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
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Set custom base URL (Mistral or another compatible API)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request(&self, messages: &[ConversationTurn]) -> OpenAiRequest {
        OpenAiRequest {
            model: self.model.clone(),
            messages: messages.iter().map(Message::from).collect(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request(messages))
            .send()
            .await
            .map_err(|e| ShopbotError::LlmError(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ShopbotError::LlmError(format!(
                "Completion API returned {status}: {error_text}"
            )));
        }

        let result: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ShopbotError::LlmError(format!("Failed to parse response: {e}")))?;

        first_choice(result)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn first_choice(response: OpenAiResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ShopbotError::LlmError("No response generated".to_string()))
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Message,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.api_base_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            messages: messages.iter().map(Message::from).collect(),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ShopbotError::LlmError(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ShopbotError::LlmError(format!("Ollama error: {error_text}")));
        }

        let result: OllamaResponse = response.json().await.map_err(|e| {
            ShopbotError::LlmError(format!("Failed to parse Ollama response: {e}"))
        })?;

        Ok(result.message.content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Scripted Client (tests)
// ============================================================================

/// Chat client that answers with a fixed reply and records every request
#[cfg(any(test, feature = "test-utils"))]
pub struct ScriptedClient {
    reply: String,
    requests: std::sync::Mutex<Vec<Vec<ConversationTurn>>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ScriptedClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Messages of the most recent request
    pub fn last_request(&self) -> Option<Vec<ConversationTurn>> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Chat client that always fails like a provider outage
#[cfg(any(test, feature = "test-utils"))]
pub struct FailingClient;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl LlmClient for FailingClient {
    async fn complete(&self, _messages: &[ConversationTurn]) -> Result<String> {
        Err(ShopbotError::LlmError(
            "OpenAI API error: 429 Too Many Requests".to_string(),
        ))
    }

    fn model(&self) -> &str {
        "failing"
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create a chat-completion client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Mistral | LlmProvider::OpenAI => {
            Ok(Arc::new(OpenAiClient::from_config(config)?))
        }
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================
