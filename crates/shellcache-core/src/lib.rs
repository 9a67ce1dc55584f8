//! Shellcache Core Caching Policy
//!
//! This crate provides the caching policy engine: versioned cache
//! namespaces, the cache-first and stale-while-revalidate strategies,
//! request routing, the audio priming channel, and the lifecycle agent
//! that a host drives through install, activate, fetch and message.

pub mod agent;
pub mod classify;
pub mod config;
pub mod error;
pub mod identity;
pub mod namespace;
pub mod priming;
pub mod router;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use agent::{LifecycleState, OfflineAgent};
pub use classify::{Classification, Classifier};
pub use config::{AgentConfig, ClassificationConfig, NamespaceConfig, PrimingConfig};
pub use error::CoreError;
pub use identity::request_identity;
pub use namespace::{Namespace, NamespaceManager, NamespaceSummary};
pub use priming::{IgnoreReason, PrimeOutcome, PrimingChannel, PrimingInstruction};
pub use router::{Intercept, PassReason, RequestRouter, Route};
pub use strategy::{CacheFirst, ResponseSource, Served, StaleWhileRevalidate};
