//! Test doubles shared by the core unit tests

use async_trait::async_trait;
use http::StatusCode;
use parking_lot::Mutex;
use shellcache_proxy::{FetchRequest, Fetcher, ProxyError};
use shellcache_storage::{CacheStorage, CachedResponse, MemoryStorage};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

use crate::config::AgentConfig;

pub const SCOPE: &str = "https://app.test/";

pub fn url(path: &str) -> Url {
    Url::parse(SCOPE).unwrap().join(path).unwrap()
}

pub fn config() -> AgentConfig {
    AgentConfig::new(Url::parse(SCOPE).unwrap())
}

pub fn ok(path: &str, body: &str) -> CachedResponse {
    CachedResponse::new(url(path).as_str(), StatusCode::OK).with_body(body.to_string())
}

/// Scripted network: serves registered responses, 404 otherwise, and
/// fails every request while offline.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, CachedResponse>>,
    calls: Mutex<Vec<FetchRequest>>,
    offline: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, path: &str, body: &str) {
        self.respond(path, ok(path, body));
    }

    pub fn respond(&self, path: &str, response: CachedResponse) {
        self.responses.lock().insert(url(path).to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Hold every response for `delay` before resolving
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse, ProxyError> {
        self.calls.lock().push(request.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(ProxyError::Unreachable(request.url.to_string()));
        }

        let response = self.responses.lock().get(request.url.as_str()).cloned();
        Ok(response.unwrap_or_else(|| {
            CachedResponse::new(request.url.as_str(), StatusCode::NOT_FOUND).with_body("not found")
        }))
    }
}

pub fn memory_storage() -> Arc<dyn CacheStorage> {
    Arc::new(MemoryStorage::new())
}
