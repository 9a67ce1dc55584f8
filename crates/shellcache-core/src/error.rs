//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] shellcache_storage::StorageError),

    #[error("Network error: {0}")]
    Proxy(#[from] shellcache_proxy::ProxyError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Install failed for {url}: {reason}")]
    Install { url: String, reason: String },

    #[error("Invalid lifecycle transition: {0}")]
    Lifecycle(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
