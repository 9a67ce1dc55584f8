//! In-memory namespace store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::backend::{CacheStorage, ensure_storable, validate_namespace};
use crate::error::StorageError;
use crate::response::CachedResponse;

type Namespace = HashMap<String, CachedResponse>;

/// In-memory namespace store
///
/// Contents live for the lifetime of the process. Useful for tests and
/// for hosts that only need a warm cache while running.
#[derive(Default)]
pub struct MemoryStorage {
    namespaces: RwLock<BTreeMap<String, Namespace>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, namespace: &str) -> Result<(), StorageError> {
        validate_namespace(namespace)?;
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default();
        Ok(())
    }

    async fn has(&self, namespace: &str) -> Result<bool, StorageError> {
        Ok(self.namespaces.read().contains_key(namespace))
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.namespaces.read().keys().cloned().collect())
    }

    async fn delete(&self, namespace: &str) -> Result<bool, StorageError> {
        debug!("Deleting namespace {}", namespace);
        Ok(self.namespaces.write().remove(namespace).is_some())
    }

    async fn match_entry(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<CachedResponse>, StorageError> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        response: CachedResponse,
    ) -> Result<(), StorageError> {
        validate_namespace(namespace)?;
        ensure_storable(key, &response)?;

        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn delete_entry(&self, namespace: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .namespaces
            .write()
            .get_mut(namespace)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn entry_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .namespaces
            .read()
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}
