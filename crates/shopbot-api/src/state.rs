//! Application state management

use shopbot_core::config::AppConfig;
use shopbot_core::Result;
use shopbot_rag::{create_llm_client, ChatEngine};
use shopbot_sync::{CatalogSync, HttpCatalog};
use shopbot_vector::{create_embedding_client, create_vector_index};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Catalog synchronisation
    pub sync: Arc<CatalogSync>,
    /// Retrieval-augmented chat
    pub chat: Arc<ChatEngine>,
}

impl AppState {
    /// Create application state from already built components
    pub fn new(config: AppConfig, sync: Arc<CatalogSync>, chat: Arc<ChatEngine>) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            sync,
            chat,
        }
    }

    /// Build every provider client from configuration
    ///
    /// Nothing is contacted here; the collection is created by
    /// [`CatalogSync::prepare`].
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let index = create_vector_index(&config.vector)?;
        let embedder = create_embedding_client(&config.llm, config.vector.dimension)?;
        let llm_client = create_llm_client(&config.llm)?;
        let catalog = Arc::new(HttpCatalog::from_config(&config.catalog)?);

        let sync = CatalogSync::new(embedder.clone(), index.clone(), catalog)
            .with_sample_fallback(config.catalog.fallback_to_sample);
        let chat = ChatEngine::new(embedder, index, llm_client, config.chat.clone());

        tracing::info!(
            backend = ?config.vector.backend,
            collection = %config.vector.collection,
            provider = ?config.llm.provider,
            model = %config.llm.model,
            "Application state initialized"
        );

        Ok(Self::new(config, Arc::new(sync), Arc::new(chat)))
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
