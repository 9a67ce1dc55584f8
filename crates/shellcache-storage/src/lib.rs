//! Shellcache Storage Layer
//!
//! This crate provides the namespace store used by the caching agent:
//! named, durable key -> response mappings, with in-memory and local
//! disk backends.

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;
pub mod response;

pub use backend::CacheStorage;
pub use error::StorageError;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use response::{CachedResponse, ResponseKind};
