//! Intent-routed assistance
//!
//! A single-turn entry point: the chat model first labels the prompt, then
//! answers with a system prompt chosen for that label. Only product searches
//! touch the vector index, and a failing index degrades to a plain answer.

use crate::{build_context, ChatEngine};
use serde::{Deserialize, Serialize};
use shopbot_core::{ConversationTurn, Result, SearchResult, ShopbotError};
use std::fmt;

const ASSISTANT_PROMPT: &str = "You are an e-commerce assistant specializing in helping \
customers find products. Your role is to clarify customer needs, answer questions, and guide \
them to relevant products.

Guidelines:
- Maintain a professional, friendly, and reassuring tone.
- Never invent product details.
- If a customer is searching for something, rephrase their request into a clear intent.
- If product information is missing, ask for details such as size, color, budget, or intended use.
- Keep responses concise: 2 to 4 sentences maximum.
- Never mention anything about your internal workings.";

const INTENT_PROMPT: &str = "You are an intent classifier for an e-commerce chatbot.
Classify the user's message into exactly ONE of these labels:

- product_search: the message is about finding, browsing, or searching for a product.
- faq: the message asks about the store, policies, shipping, returns, payment methods, or how \
the service works.
- other: anything else, including greetings, small talk and off-topic messages.

Output must be STRICT JSON with this schema and nothing else:
{\"intent\":\"faq|product_search|other\"}";

const NO_MATCH_GUIDANCE: &str = "No matching products were found. Ask the customer for more \
specific details such as category, price range, size, color, or intended use.";

const FAQ_GUIDANCE: &str = "The customer is asking about store policies or general information:
- Shipping: Standard (5-7 days, free over 50€), Express (2-3 days, 15€)
- Returns: 30-day return policy, items must be unused with tags
- Payment: all major credit cards, PayPal and Apple Pay
- Order tracking: via the confirmation email link or the account dashboard
- Customer service: Mon-Fri 9am-6pm via chat or email
Keep your answer concise and helpful.";

const OTHER_GUIDANCE: &str = "The customer's message is a greeting or off-topic. Respond \
politely and guide them toward browsing products or asking about store policies. Keep it brief \
and welcoming.";

/// What the shopper is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Looking for a product
    ProductSearch,
    /// Store policy question
    Faq,
    /// Greeting or off-topic
    Other,
}

impl Intent {
    /// Read a label out of the classifier output
    ///
    /// Models do not reliably return strict JSON, so the label is matched
    /// anywhere in the text; anything unrecognised is `Other`.
    pub fn from_label(raw: &str) -> Self {
        let raw = raw.to_lowercase();
        if raw.contains("product_search") {
            Self::ProductSearch
        } else if raw.contains("faq") {
            Self::Faq
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductSearch => write!(f, "product_search"),
            Self::Faq => write!(f, "faq"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Answer to a single-turn assist request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistReply {
    pub intent: Intent,
    pub response: String,
    /// Products retrieved for a product search, empty otherwise
    pub results: Vec<SearchResult>,
}

/// System prompt for an intent and its retrieved products
pub fn assist_system_prompt(intent: Intent, results: &[SearchResult]) -> String {
    let guidance = match intent {
        Intent::ProductSearch if results.is_empty() => NO_MATCH_GUIDANCE.to_string(),
        Intent::ProductSearch => format!(
            "Context:\n{}\n\nDo not invent details. Cite 2 to 4 of the most relevant items by \
             name and keep it concise.",
            build_context(results)
        ),
        Intent::Faq => FAQ_GUIDANCE.to_string(),
        Intent::Other => OTHER_GUIDANCE.to_string(),
    };
    format!("{ASSISTANT_PROMPT}\n\n{guidance}")
}

impl ChatEngine {
    /// Label a prompt with the chat model
    pub async fn classify(&self, prompt: &str) -> Result<Intent> {
        let prompt = self.check_prompt(prompt)?;

        let raw = self
            .llm_client
            .complete(&[
                ConversationTurn::system(INTENT_PROMPT),
                ConversationTurn::user(prompt),
            ])
            .await?;

        let intent = Intent::from_label(&raw);
        tracing::debug!(raw = %raw.trim(), %intent, "Intent classified");
        Ok(intent)
    }

    /// Classify, retrieve for product searches, then answer
    pub async fn assist(&self, prompt: &str, top_k: usize) -> Result<AssistReply> {
        let prompt = self.check_prompt(prompt)?;
        let intent = self.classify(prompt).await?;

        let results = match intent {
            Intent::ProductSearch => match self.retrieve(prompt, top_k, None).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Product search failed, answering without context"
                    );
                    Vec::new()
                }
            },
            Intent::Faq | Intent::Other => Vec::new(),
        };

        let response = self
            .llm_client
            .complete(&[
                ConversationTurn::system(assist_system_prompt(intent, &results)),
                ConversationTurn::user(prompt),
            ])
            .await?;

        tracing::info!(%intent, products = results.len(), "Assist response generated");
        Ok(AssistReply {
            intent,
            response,
            results,
        })
    }

    fn check_prompt<'a>(&self, prompt: &'a str) -> Result<&'a str> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ShopbotError::ValidationError("Prompt is required".to_string()));
        }
        self.check_length(prompt)?;
        Ok(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FailingClient, ScriptedClient};
    use shopbot_core::{ChatConfig, ProductRecord, Role, VectorRecord};
    use shopbot_vector::{
        EmbeddingClient, FailingIndex, HashingEmbedding, MemoryIndex, VectorIndex,
    };
    use std::sync::Arc;

    const DIM: usize = 1024;

    async fn hat_index(embedder: &HashingEmbedding) -> Arc<MemoryIndex> {
        let index = Arc::new(MemoryIndex::new(DIM));
        let hat = ProductRecord::new(2u64, "Blue Hat").with_price(20.0);
        let vector = embedder.embed("Blue Hat").await.unwrap();
        index.upsert(vec![VectorRecord::new(&hat, vector)]).await.unwrap();
        index
    }

    #[test]
    fn test_intent_from_label() {
        assert_eq!(
            Intent::from_label(r#"{"intent":"product_search"}"#),
            Intent::ProductSearch
        );
        assert_eq!(Intent::from_label("FAQ"), Intent::Faq);
        assert_eq!(Intent::from_label("{\"intent\":\"other\"}"), Intent::Other);
        assert_eq!(Intent::from_label("no idea"), Intent::Other);
    }

    #[test]
    fn test_system_prompt_per_intent() {
        let faq = assist_system_prompt(Intent::Faq, &[]);
        assert!(faq.contains("30-day return policy"));

        let no_match = assist_system_prompt(Intent::ProductSearch, &[]);
        assert!(no_match.contains("No matching products were found"));

        let greeting = assist_system_prompt(Intent::Other, &[]);
        assert!(greeting.starts_with("You are an e-commerce assistant"));
        assert!(greeting.contains("greeting or off-topic"));
    }

    #[tokio::test]
    async fn test_product_search_retrieves_products() {
        let embedder = HashingEmbedding::new(DIM);
        let index = hat_index(&embedder).await;
        let llm = Arc::new(ScriptedClient::new(r#"{"intent":"product_search"}"#));
        let engine = ChatEngine::new(
            Arc::new(embedder),
            index,
            llm.clone(),
            ChatConfig::default(),
        );

        let reply = engine.assist("a blue hat", 5).await.unwrap();
        assert_eq!(reply.intent, Intent::ProductSearch);
        assert_eq!(reply.results[0].product.name, "Blue Hat");

        let messages = llm.last_request().unwrap();
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("1. Blue Hat - 20€"));
        assert_eq!(messages[1], ConversationTurn::user("a blue hat"));
    }

    #[tokio::test]
    async fn test_faq_skips_retrieval() {
        let embedder = HashingEmbedding::new(DIM);
        let index = hat_index(&embedder).await;
        let llm = Arc::new(ScriptedClient::new("faq"));
        let engine = ChatEngine::new(Arc::new(embedder), index, llm, ChatConfig::default());

        let reply = engine.assist("How long does shipping take?", 5).await.unwrap();
        assert_eq!(reply.intent, Intent::Faq);
        assert!(reply.results.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_degrades_to_plain_answer() {
        let llm = Arc::new(ScriptedClient::new("product_search"));
        let engine = ChatEngine::new(
            Arc::new(HashingEmbedding::new(DIM)),
            Arc::new(FailingIndex::new(DIM)),
            llm.clone(),
            ChatConfig::default(),
        );

        let reply = engine.assist("a blue hat", 5).await.unwrap();
        assert_eq!(reply.intent, Intent::ProductSearch);
        assert!(reply.results.is_empty());
        let messages = llm.last_request().unwrap();
        assert!(messages[0].content.contains("No matching products were found"));
    }

    #[tokio::test]
    async fn test_classifier_failure_is_an_error() {
        let engine = ChatEngine::new(
            Arc::new(HashingEmbedding::new(DIM)),
            Arc::new(MemoryIndex::new(DIM)),
            Arc::new(FailingClient),
            ChatConfig::default(),
        );

        let err = engine.classify("hello").await.unwrap_err();
        assert!(matches!(err, ShopbotError::LlmError(_)));
        let blank = engine.assist("  ", 5).await.unwrap_err();
        assert!(matches!(blank, ShopbotError::ValidationError(_)));
    }
}
