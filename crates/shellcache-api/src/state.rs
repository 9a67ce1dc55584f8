//! Application state

use metrics_exporter_prometheus::PrometheusHandle;
use shellcache_core::OfflineAgent;
use shellcache_proxy::Fetcher;
use std::sync::Arc;
use url::Url;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<OfflineAgent>,
    /// Network path for requests the agent passes through
    pub fetcher: Arc<dyn Fetcher>,
    /// Origin used to absolutize origin-form request targets
    pub origin: Url,
}

impl AppState {
    pub fn new(agent: Arc<OfflineAgent>, fetcher: Arc<dyn Fetcher>) -> Self {
        let origin = agent.config().scope.clone();
        Self {
            agent,
            fetcher,
            origin,
        }
    }
}

/// Prometheus recorder handle used by the metrics endpoint
pub struct MetricsHandle(PrometheusHandle);

impl MetricsHandle {
    pub fn new(handle: PrometheusHandle) -> Self {
        Self(handle)
    }

    pub fn render(&self) -> String {
        self.0.render()
    }
}
