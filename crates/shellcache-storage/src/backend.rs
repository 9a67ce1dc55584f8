//! Namespace store trait

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::response::CachedResponse;

/// Namespace store trait
///
/// A store holds any number of named namespaces, each an independent
/// key -> response mapping. Operations on different keys are independent;
/// concurrent writes to the same key resolve last-write-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a namespace, creating it if absent
    async fn open(&self, namespace: &str) -> Result<(), StorageError>;

    /// Check if a namespace exists
    async fn has(&self, namespace: &str) -> Result<bool, StorageError>;

    /// List all namespace names
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Delete a namespace and all of its entries
    async fn delete(&self, namespace: &str) -> Result<bool, StorageError>;

    /// Look up an entry; a missing namespace behaves like an empty one
    async fn match_entry(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<CachedResponse>, StorageError>;

    /// Store an entry, overwriting any existing one (creates the namespace)
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        response: CachedResponse,
    ) -> Result<(), StorageError>;

    /// Delete a single entry
    async fn delete_entry(&self, namespace: &str, key: &str) -> Result<bool, StorageError>;

    /// List the keys stored in a namespace
    async fn entry_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError>;
}

/// Validate a namespace name
pub fn validate_namespace(namespace: &str) -> Result<(), StorageError> {
    if namespace.trim().is_empty() {
        return Err(StorageError::InvalidNamespace(namespace.to_string()));
    }
    if namespace.chars().any(|c| c.is_control()) {
        return Err(StorageError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}

/// Reject responses that must never be persisted
pub fn ensure_storable(key: &str, response: &CachedResponse) -> Result<(), StorageError> {
    if !response.is_ok() {
        return Err(StorageError::UnstorableResponse {
            key: key.to_string(),
            status: response.status.as_u16(),
        });
    }
    Ok(())
}

/// Compute the hex SHA256 of some data
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
