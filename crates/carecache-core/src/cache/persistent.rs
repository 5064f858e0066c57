//! Persistent tier: the key-value store interface and its adapter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::StoreError;

/// Port for the device's persistent string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;
    async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError>;
}

/// Wraps a [`KeyValueStore`] so that its failures never reach cache callers.
///
/// Write failures are logged and swallowed, a failed `get` reads as a miss
/// and a failed `list_keys` as an empty store. The memory tier stays
/// authoritative for the rest of the session either way.
#[derive(Clone)]
pub struct PersistentTier {
    store: Arc<dyn KeyValueStore>,
}

impl PersistentTier {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Persistent read failed, treating as miss");
                None
            }
        }
    }

    /// Returns whether the write reached the store.
    pub async fn set(&self, key: &str, value: &str) -> bool {
        match self.store.set(key, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Persistent write failed, entry kept in memory only");
                false
            }
        }
    }

    pub async fn remove(&self, key: &str) -> bool {
        match self.store.remove(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Persistent remove failed");
                false
            }
        }
    }

    pub async fn list_keys(&self) -> Vec<String> {
        match self.store.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Listing persistent keys failed, treating store as empty");
                Vec::new()
            }
        }
    }

    pub async fn remove_many(&self, keys: &[String]) -> bool {
        if keys.is_empty() {
            return true;
        }
        match self.store.remove_many(keys).await {
            Ok(()) => {
                debug!(count = keys.len(), "Removed persistent keys");
                true
            }
            Err(e) => {
                warn!(count = keys.len(), error = %e, "Persistent bulk remove failed");
                false
            }
        }
    }
}

/// Process-local [`KeyValueStore`].
///
/// Useful for sessions that should leave nothing on disk, and as the
/// backing store in tests (share one `Arc<MemoryStore>` between two
/// managers to simulate a restart).
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.values.read().await.keys().cloned().collect())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        for key in keys {
            values.remove(key);
        }
        Ok(())
    }
}
