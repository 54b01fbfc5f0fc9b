//! Shared application state for Axum handlers.

use std::sync::Arc;

use harbor_storage::{HarborDbClient, InMemoryStore, KeyValueStore};

use crate::config::ApiConfig;

/// State cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub client: HarborDbClient,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(client: HarborDbClient, config: ApiConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// State over `store` with default configuration.
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(HarborDbClient::new(store), ApiConfig::default())
    }

    /// State over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }
}

crate::impl_from_ref!(HarborDbClient, client);
crate::impl_from_ref!(Arc<ApiConfig>, config);
