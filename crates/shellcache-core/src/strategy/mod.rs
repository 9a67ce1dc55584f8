//! Caching strategies

mod cache_first;
mod stale_while_revalidate;

pub use cache_first::CacheFirst;
pub use stale_while_revalidate::StaleWhileRevalidate;

use serde::Serialize;
use shellcache_proxy::{FetchRequest, Fetcher};
use shellcache_storage::CachedResponse;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::namespace::Namespace;

/// Where a served response came from
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Cache,
    Network,
    OfflineFallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::OfflineFallback => "offline-fallback",
        }
    }
}

/// Result of running a strategy
#[derive(Debug)]
pub struct Served {
    pub response: CachedResponse,
    pub source: ResponseSource,
    /// Detached refresh started for this request, if any.
    ///
    /// It runs to completion whether or not the handle is awaited.
    pub revalidation: Option<JoinHandle<()>>,
}

impl Served {
    fn new(response: CachedResponse, source: ResponseSource) -> Self {
        Self {
            response,
            source,
            revalidation: None,
        }
    }
}

/// Look up `key`, treating a storage failure as a miss
async fn lookup_or_miss(namespace: &Namespace, key: &str) -> Option<CachedResponse> {
    match namespace.lookup(key).await {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Lookup of {} in {} failed, treating as miss: {}", key, namespace.name(), e);
            None
        }
    }
}

/// Fetch and store on a detached task, waiting for its result.
///
/// Dropping the returned future does not cancel the task, so a fetch that
/// completes after the caller has gone away is still written.
async fn fetch_and_store(
    namespace: &Namespace,
    fetcher: &Arc<dyn Fetcher>,
    request: &FetchRequest,
    key: &str,
) -> Result<CachedResponse, CoreError> {
    let namespace = namespace.clone();
    let fetcher = fetcher.clone();
    let request = request.clone();
    let key = key.to_string();

    tokio::spawn(async move { fetch_then_store(&namespace, fetcher.as_ref(), &request, &key).await })
        .await?
}

/// Fetch from the network and store a copy when the response is a success.
///
/// Transport failures propagate. Unsuccessful responses are returned
/// unstored. A failed write is logged and the response is still returned.
async fn fetch_then_store(
    namespace: &Namespace,
    fetcher: &dyn Fetcher,
    request: &FetchRequest,
    key: &str,
) -> Result<CachedResponse, CoreError> {
    let response = fetcher.fetch(request).await?;

    if response.is_ok() {
        match namespace.store(key, response.clone()).await {
            Ok(()) => debug!("Stored {} in {}", key, namespace.name()),
            Err(e) => warn!("Failed to store {} in {}: {}", key, namespace.name(), e),
        }
    } else {
        debug!(
            "Not storing {} ({}, {})",
            key,
            response.status,
            response.kind.as_str()
        );
    }

    Ok(response)
}
