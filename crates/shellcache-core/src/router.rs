//! Request routing
//!
//! Decides, for every intercepted request, whether the agent handles it
//! and with which strategy. Anything not handled is passed through to the
//! default network path untouched.

use http::Method;
use serde::Serialize;
use shellcache_proxy::FetchRequest;
use tracing::debug;
use url::Url;

use crate::classify::{Classification, Classifier};
use crate::error::CoreError;
use crate::identity::is_same_origin;
use crate::strategy::{CacheFirst, Served, StaleWhileRevalidate};

/// Why a request was not intercepted
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PassReason {
    /// Not a GET
    NotRead,
    CrossOrigin,
    Unhandled,
    /// The agent has not been activated yet
    NotControlling,
}

impl PassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassReason::NotRead => "not-read",
            PassReason::CrossOrigin => "cross-origin",
            PassReason::Unhandled => "unhandled",
            PassReason::NotControlling => "not-controlling",
        }
    }
}

/// Routing decision for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Passthrough(PassReason),
    CacheFirst,
    StaleWhileRevalidate,
}

/// Outcome of intercepting a request
#[derive(Debug)]
pub enum Intercept {
    /// Defer to default network handling; no cache was read or written
    Passthrough(PassReason),
    Respond(Served),
}

/// Routes intercepted reads to the caching strategies
pub struct RequestRouter {
    origin: Url,
    classifier: Classifier,
    cache_first: CacheFirst,
    stale_while_revalidate: StaleWhileRevalidate,
}

impl RequestRouter {
    pub fn new(
        origin: Url,
        classifier: Classifier,
        cache_first: CacheFirst,
        stale_while_revalidate: StaleWhileRevalidate,
    ) -> Self {
        Self {
            origin,
            classifier,
            cache_first,
            stale_while_revalidate,
        }
    }

    /// Decide how a request is handled without touching any cache
    pub fn route(&self, request: &FetchRequest) -> Route {
        if request.method != Method::GET {
            return Route::Passthrough(PassReason::NotRead);
        }
        if !is_same_origin(&request.url, &self.origin) {
            return Route::Passthrough(PassReason::CrossOrigin);
        }

        match self.classifier.classify(request) {
            Classification::Audio => Route::CacheFirst,
            Classification::UiNavigation | Classification::UiAsset => Route::StaleWhileRevalidate,
            Classification::Unhandled => Route::Passthrough(PassReason::Unhandled),
        }
    }

    pub async fn handle(&self, request: &FetchRequest) -> Result<Intercept, CoreError> {
        let route = self.route(request);
        debug!("{} {} -> {:?}", request.method, request.url, route);

        let served = match route {
            Route::Passthrough(reason) => return Ok(Intercept::Passthrough(reason)),
            Route::CacheFirst => self.cache_first.handle(request).await?,
            Route::StaleWhileRevalidate => self.stale_while_revalidate.handle(request).await?,
        };

        Ok(Intercept::Respond(served))
    }
}
