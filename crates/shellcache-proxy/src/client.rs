//! Fetch capability and its HTTP implementation

use async_trait::async_trait;
use http::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use shellcache_storage::{CachedResponse, ResponseKind};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::ProxyError;
use crate::request::{CacheMode, FetchRequest};

/// The network capability used by the caching strategies
///
/// A fetch resolves to a response for any HTTP status; only transport
/// failures (DNS, connect, timeout, reset) are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse, ProxyError>;
}

/// HTTP fetcher configuration
#[derive(Clone, Debug, Default)]
pub struct HttpFetcherConfig {
    /// Public origin the agent serves; requests to it are sent to `upstream`
    pub origin: Option<Url>,
    /// Where same-origin requests are actually fetched from
    pub upstream: Option<Url>,
    /// Per-request timeout
    pub timeout: Option<Duration>,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

/// Request headers that must not be forwarded verbatim
const HOP_BY_HOP: [header::HeaderName; 5] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// reqwest-backed fetcher
pub struct HttpFetcher {
    config: HttpFetcherConfig,
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new(config: HttpFetcherConfig) -> Result<Self, ProxyError> {
        let mut builder = Client::builder();

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build()?;

        match (&config.origin, &config.upstream) {
            (Some(origin), Some(upstream)) => {
                info!("Created HTTP fetcher: {} -> {}", origin, upstream)
            }
            _ => info!("Created HTTP fetcher"),
        }

        Ok(Self { config, client })
    }

    /// Map a public URL onto the upstream, leaving other origins untouched
    fn upstream_url(&self, url: &Url) -> Result<Url, ProxyError> {
        let (Some(origin), Some(upstream)) = (&self.config.origin, &self.config.upstream) else {
            return Ok(url.clone());
        };
        if url.origin() != origin.origin() {
            return Ok(url.clone());
        }

        let invalid = || ProxyError::InvalidRequest(format!("Cannot rewrite {} onto {}", url, upstream));
        let mut target = url.clone();
        target.set_scheme(upstream.scheme()).map_err(|_| invalid())?;
        target.set_host(upstream.host_str()).map_err(|_| invalid())?;
        target.set_port(upstream.port()).map_err(|_| invalid())?;
        Ok(target)
    }

    fn outbound_headers(request: &FetchRequest) -> HeaderMap {
        let mut headers = request.headers.clone();
        for name in HOP_BY_HOP.iter() {
            headers.remove(name);
        }

        match request.cache {
            CacheMode::Reload | CacheMode::NoCache => {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
            }
            CacheMode::NoStore => {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            }
            CacheMode::Default => {}
        }

        headers
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse, ProxyError> {
        let target = self.upstream_url(&request.url)?;
        debug!("Fetching {} {} (via {})", request.method, request.url, target);

        let mut builder = self
            .client
            .request(request.method.clone(), target.clone())
            .headers(Self::outbound_headers(request));
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();

        let kind = if response.url().origin() == target.origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };

        let mut headers = response.headers().clone();
        headers.remove(header::CONNECTION);
        headers.remove(header::TRANSFER_ENCODING);

        let body = response.bytes().await?;

        debug!("Fetched {} -> {} ({} bytes)", request.url, status, body.len());

        Ok(CachedResponse {
            url: request.url.to_string(),
            status,
            headers,
            body,
            kind,
        })
    }
}
