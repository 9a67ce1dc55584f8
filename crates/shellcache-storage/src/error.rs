//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid namespace name: {0}")]
    InvalidNamespace(String),

    #[error("Refusing to store unsuccessful response ({status}) for {key}")]
    UnstorableResponse { key: String, status: u16 },

    #[error("Corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
