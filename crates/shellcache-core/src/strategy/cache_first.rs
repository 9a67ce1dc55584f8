//! Cache-first strategy for large, immutable media

use shellcache_proxy::{FetchRequest, Fetcher};
use std::sync::Arc;
use tracing::debug;

use super::{ResponseSource, Served, fetch_and_store, lookup_or_miss};
use crate::error::CoreError;
use crate::identity::request_identity;
use crate::namespace::Namespace;

/// Serve from the namespace when present, otherwise fetch and store.
///
/// A hit never touches the network and is never revalidated.
pub struct CacheFirst {
    namespace: Namespace,
    fetcher: Arc<dyn Fetcher>,
}

impl CacheFirst {
    pub fn new(namespace: Namespace, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { namespace, fetcher }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub async fn handle(&self, request: &FetchRequest) -> Result<Served, CoreError> {
        let key = request_identity(&request.url);

        if let Some(cached) = lookup_or_miss(&self.namespace, &key).await {
            debug!("Cache hit for {}", key);
            return Ok(Served::new(cached, ResponseSource::Cache));
        }

        debug!("Cache miss for {}, fetching", key);
        let response = fetch_and_store(&self.namespace, &self.fetcher, request, &key).await?;
        Ok(Served::new(response, ResponseSource::Network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, memory_storage, ok, url};
    use http::StatusCode;
    use shellcache_storage::CachedResponse;
    use std::time::Duration;

    fn strategy(fetcher: Arc<MockFetcher>) -> CacheFirst {
        CacheFirst::new(Namespace::new("audio:v1", memory_storage()), fetcher)
    }

    #[tokio::test]
    async fn test_hit_serves_stored_entry_without_network() {
        let fetcher = MockFetcher::new();
        fetcher.serve("./audios/1.mp3", "fresh");
        let strategy = strategy(fetcher.clone());

        let stored = ok("./audios/1.mp3", "stored bytes");
        strategy
            .namespace()
            .store(url("./audios/1.mp3").as_str(), stored.clone())
            .await
            .unwrap();

        let served = strategy
            .handle(&FetchRequest::get(url("./audios/1.mp3")))
            .await
            .unwrap();

        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response, stored);
        assert!(served.revalidation.is_none());
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_persists() {
        let fetcher = MockFetcher::new();
        fetcher.serve("./audios/2.mp3", "network bytes");
        let strategy = strategy(fetcher.clone());
        let request = FetchRequest::get(url("./audios/2.mp3"));

        let first = strategy.handle(&request).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(first.response.body, "network bytes");

        let second = strategy.handle(&request).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response, first.response);
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fragment_shares_identity() {
        let fetcher = MockFetcher::new();
        fetcher.serve("./audios/3.mp3", "bytes");
        let strategy = strategy(fetcher.clone());

        strategy
            .handle(&FetchRequest::get(url("./audios/3.mp3")))
            .await
            .unwrap();
        let served = strategy
            .handle(&FetchRequest::get(url("./audios/3.mp3#t=30")))
            .await
            .unwrap();

        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_stored() {
        let fetcher = MockFetcher::new();
        let strategy = strategy(fetcher.clone());

        let served = strategy
            .handle(&FetchRequest::get(url("./audios/missing.mp3")))
            .await
            .unwrap();
        assert_eq!(served.response.status, StatusCode::NOT_FOUND);
        assert!(strategy.namespace().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_miss_propagates() {
        let fetcher = MockFetcher::new();
        fetcher.set_offline(true);
        let strategy = strategy(fetcher);

        let result = strategy
            .handle(&FetchRequest::get(url("./audios/4.mp3")))
            .await;
        assert!(matches!(result, Err(CoreError::Proxy(_))));
        assert!(strategy.namespace().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_hit_still_served() {
        let fetcher = MockFetcher::new();
        fetcher.set_offline(true);
        let strategy = strategy(fetcher);
        let key = url("./audios/5.mp3");
        strategy
            .namespace()
            .store(
                key.as_str(),
                CachedResponse::new(key.as_str(), StatusCode::OK).with_body("cached"),
            )
            .await
            .unwrap();

        let served = strategy.handle(&FetchRequest::get(key)).await.unwrap();
        assert_eq!(served.response.body, "cached");
    }

    #[tokio::test]
    async fn test_write_completes_after_caller_gives_up() {
        let fetcher = MockFetcher::new();
        fetcher.serve("./audios/9.mp3", "late bytes");
        fetcher.set_delay(Duration::from_millis(50));
        let strategy = strategy(fetcher);
        let request = FetchRequest::get(url("./audios/9.mp3"));

        let abandoned = tokio::time::timeout(Duration::from_millis(10), strategy.handle(&request)).await;
        assert!(abandoned.is_err());

        let key = url("./audios/9.mp3").to_string();
        for _ in 0..100 {
            if let Some(entry) = strategy.namespace().lookup(&key).await.unwrap() {
                assert_eq!(entry.body, "late bytes");
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fetched entry was never stored");
    }
}
