//! Stale-while-revalidate strategy for mutable UI resources

use shellcache_proxy::{FetchRequest, Fetcher};
use shellcache_storage::CachedResponse;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ResponseSource, Served, fetch_and_store, fetch_then_store, lookup_or_miss};
use crate::error::CoreError;
use crate::identity::request_identity;
use crate::namespace::Namespace;

/// Serve cached UI resources immediately while refreshing them.
///
/// Precedence: the cached entry; else, for a navigation, the offline shell
/// document; else the network result. Whenever something is served from
/// storage the network fetch still runs and its success is stored under
/// the request's own identity. A navigation whose shell was not cached yet
/// retries the shell lookup if the network fails in transport.
pub struct StaleWhileRevalidate {
    namespace: Namespace,
    fetcher: Arc<dyn Fetcher>,
    fallback_key: String,
}

impl StaleWhileRevalidate {
    pub fn new(namespace: Namespace, fetcher: Arc<dyn Fetcher>, fallback_key: String) -> Self {
        Self {
            namespace,
            fetcher,
            fallback_key,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub async fn handle(&self, request: &FetchRequest) -> Result<Served, CoreError> {
        let key = request_identity(&request.url);

        if let Some(cached) = lookup_or_miss(&self.namespace, &key).await {
            debug!("Serving {} from cache, revalidating in background", key);
            return Ok(self.serve_stored(cached, ResponseSource::Cache, request, key));
        }

        if request.is_navigation()
            && let Some(fallback) = lookup_or_miss(&self.namespace, &self.fallback_key).await
        {
            debug!("No entry for {}, serving shell while fetching", key);
            return Ok(self.serve_stored(fallback, ResponseSource::OfflineFallback, request, key));
        }

        match fetch_and_store(&self.namespace, &self.fetcher, request, &key).await {
            Ok(response) => Ok(Served::new(response, ResponseSource::Network)),
            Err(e) => {
                if request.is_navigation()
                    && let Some(fallback) = lookup_or_miss(&self.namespace, &self.fallback_key).await
                {
                    debug!("Network failed for {} ({}), serving offline shell", key, e);
                    return Ok(Served::new(fallback, ResponseSource::OfflineFallback));
                }
                Err(e)
            }
        }
    }

    fn serve_stored(
        &self,
        response: CachedResponse,
        source: ResponseSource,
        request: &FetchRequest,
        key: String,
    ) -> Served {
        Served {
            response,
            source,
            revalidation: Some(self.spawn_revalidation(request.clone(), key)),
        }
    }

    /// Refresh the entry without holding up the caller
    fn spawn_revalidation(&self, request: FetchRequest, key: String) -> JoinHandle<()> {
        let namespace = self.namespace.clone();
        let fetcher = self.fetcher.clone();

        tokio::spawn(async move {
            if let Err(e) = fetch_then_store(&namespace, fetcher.as_ref(), &request, &key).await {
                warn!("Background revalidation of {} failed: {}", key, e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, memory_storage, ok, url};
    use http::StatusCode;
    use shellcache_proxy::Destination;
    use shellcache_storage::ResponseKind;
    use std::time::Duration;

    fn strategy(fetcher: Arc<MockFetcher>) -> StaleWhileRevalidate {
        StaleWhileRevalidate::new(
            Namespace::new("ui:v1", memory_storage()),
            fetcher,
            url("./index.html").to_string(),
        )
    }

    fn style_request() -> FetchRequest {
        FetchRequest::get(url("./style.css")).with_destination(Destination::Style)
    }

    #[tokio::test]
    async fn test_cached_served_then_refreshed() {
        let fetcher = MockFetcher::new();
        fetcher.serve("./style.css", "body { color: red }");
        let strategy = strategy(fetcher.clone());
        let key = url("./style.css").to_string();
        strategy
            .namespace()
            .store(&key, ok("./style.css", "body {}"))
            .await
            .unwrap();

        let served = strategy.handle(&style_request()).await.unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response.body, "body {}");

        served.revalidation.unwrap().await.unwrap();
        let refreshed = strategy.namespace().lookup(&key).await.unwrap().unwrap();
        assert_eq!(refreshed.body, "body { color: red }");
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entry() {
        let fetcher = MockFetcher::new();
        fetcher.respond(
            "./style.css",
            ok("./style.css", "").with_kind(ResponseKind::Opaque),
        );
        let strategy = strategy(fetcher.clone());
        let key = url("./style.css").to_string();
        strategy
            .namespace()
            .store(&key, ok("./style.css", "body {}"))
            .await
            .unwrap();

        let served = strategy.handle(&style_request()).await.unwrap();
        served.revalidation.unwrap().await.unwrap();

        let entry = strategy.namespace().lookup(&key).await.unwrap().unwrap();
        assert_eq!(entry.body, "body {}");
    }

    #[tokio::test]
    async fn test_cached_served_while_offline() {
        let fetcher = MockFetcher::new();
        fetcher.set_offline(true);
        let strategy = strategy(fetcher);
        let key = url("./app.js").to_string();
        strategy
            .namespace()
            .store(&key, ok("./app.js", "main()"))
            .await
            .unwrap();

        let served = strategy
            .handle(&FetchRequest::get(url("./app.js")).with_destination(Destination::Script))
            .await
            .unwrap();
        assert_eq!(served.response.body, "main()");
        served.revalidation.unwrap().await.unwrap();
        assert_eq!(
            strategy.namespace().lookup(&key).await.unwrap().unwrap().body,
            "main()"
        );
    }

    #[tokio::test]
    async fn test_miss_waits_for_network_and_stores() {
        let fetcher = MockFetcher::new();
        fetcher.serve("./style.css", "body {}");
        let strategy = strategy(fetcher);

        let served = strategy.handle(&style_request()).await.unwrap();
        assert_eq!(served.source, ResponseSource::Network);
        assert!(served.revalidation.is_none());
        assert!(
            strategy
                .namespace()
                .lookup(url("./style.css").as_str())
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_miss_with_error_status_returns_it() {
        let fetcher = MockFetcher::new();
        let strategy = strategy(fetcher);

        let served = strategy
            .handle(&FetchRequest::navigate(url("./nowhere")))
            .await
            .unwrap();
        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(served.response.status, StatusCode::NOT_FOUND);
        assert!(strategy.namespace().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_navigation_falls_back_to_shell() {
        let fetcher = MockFetcher::new();
        fetcher.set_offline(true);
        let strategy = strategy(fetcher);
        let shell = ok("./index.html", "<html>shell</html>");
        strategy
            .namespace()
            .store(url("./index.html").as_str(), shell.clone())
            .await
            .unwrap();

        let served = strategy
            .handle(&FetchRequest::navigate(url("./adhkar/evening")))
            .await
            .unwrap();
        assert_eq!(served.source, ResponseSource::OfflineFallback);
        assert_eq!(served.response, shell);
    }

    #[tokio::test]
    async fn test_offline_asset_gets_no_fallback() {
        let fetcher = MockFetcher::new();
        fetcher.set_offline(true);
        let strategy = strategy(fetcher);
        strategy
            .namespace()
            .store(
                url("./index.html").as_str(),
                ok("./index.html", "<html>shell</html>"),
            )
            .await
            .unwrap();

        let result = strategy.handle(&style_request()).await;
        assert!(matches!(result, Err(CoreError::Proxy(_))));
    }

    #[tokio::test]
    async fn test_offline_navigation_without_shell_propagates() {
        let fetcher = MockFetcher::new();
        fetcher.set_offline(true);
        let strategy = strategy(fetcher);

        let result = strategy.handle(&FetchRequest::navigate(url("./"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_uncached_navigation_prefers_shell_while_online() {
        let fetcher = MockFetcher::new();
        fetcher.serve("./adhkar/evening", "<html>network route</html>");
        let strategy = strategy(fetcher.clone());
        let shell = ok("./index.html", "<html>shell</html>");
        strategy
            .namespace()
            .store(url("./index.html").as_str(), shell.clone())
            .await
            .unwrap();

        let served = strategy
            .handle(&FetchRequest::navigate(url("./adhkar/evening")))
            .await
            .unwrap();
        assert_eq!(served.source, ResponseSource::OfflineFallback);
        assert_eq!(served.response, shell);

        served.revalidation.unwrap().await.unwrap();
        let stored = strategy
            .namespace()
            .lookup(url("./adhkar/evening").as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.body, "<html>network route</html>");
        assert_eq!(fetcher.call_count(), 1);

        let again = strategy
            .handle(&FetchRequest::navigate(url("./adhkar/evening")))
            .await
            .unwrap();
        assert_eq!(again.source, ResponseSource::Cache);
        assert_eq!(again.response.body, "<html>network route</html>");
    }

    #[tokio::test]
    async fn test_miss_write_completes_after_caller_gives_up() {
        let fetcher = MockFetcher::new();
        fetcher.serve("./app.js", "main()");
        fetcher.set_delay(Duration::from_millis(50));
        let strategy = strategy(fetcher);
        let request = FetchRequest::get(url("./app.js")).with_destination(Destination::Script);

        let abandoned = tokio::time::timeout(Duration::from_millis(10), strategy.handle(&request)).await;
        assert!(abandoned.is_err());

        let key = url("./app.js").to_string();
        for _ in 0..100 {
            if strategy.namespace().lookup(&key).await.unwrap().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fetched entry was never stored");
    }
}
