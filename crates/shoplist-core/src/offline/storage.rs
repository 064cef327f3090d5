//! Named, versioned cache stores.
//!
//! A `CacheStorage` holds any number of stores, each addressed by name.
//! The manager only ever writes to the store named after its own version,
//! so two versions running side by side never touch the same entries.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CapturedResponse, RequestKey, StorageError};

#[async_trait]
pub trait CacheStorage: Send + Sync + 'static {
    /// Create the store if it does not exist yet
    async fn open(&self, name: &str) -> Result<(), StorageError>;

    /// Names of all existing stores
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Delete a store and every entry in it. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;

    /// Look up a captured response. A missing store is a miss.
    async fn match_request(
        &self,
        name: &str,
        key: &RequestKey,
    ) -> Result<Option<CapturedResponse>, StorageError>;

    /// Store a response, replacing any previous entry. Opens the store if needed.
    async fn put(
        &self,
        name: &str,
        key: &RequestKey,
        response: &CapturedResponse,
    ) -> Result<(), StorageError>;

    /// Request keys held by a store
    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, StorageError>;
}

/// In-process storage. Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stores: RwLock<BTreeMap<String, HashMap<RequestKey, CapturedResponse>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), StorageError> {
        self.stores
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.stores.write().await.remove(name).is_some())
    }

    async fn match_request(
        &self,
        name: &str,
        key: &RequestKey,
    ) -> Result<Option<CapturedResponse>, StorageError> {
        let stores = self.stores.read().await;
        Ok(stores.get(name).and_then(|store| store.get(key)).cloned())
    }

    async fn put(
        &self,
        name: &str,
        key: &RequestKey,
        response: &CapturedResponse,
    ) -> Result<(), StorageError> {
        self.stores
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, StorageError> {
        let stores = self.stores.read().await;
        let store = stores
            .get(name)
            .ok_or_else(|| StorageError::NotOpen(name.to_string()))?;
        let mut keys: Vec<RequestKey> = store.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
