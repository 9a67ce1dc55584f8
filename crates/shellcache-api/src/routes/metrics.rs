//! Prometheus metrics endpoint
//!
//! Counters are recorded where requests are handled; namespace and
//! lifecycle gauges are refreshed from the agent on every scrape.

use axum::{Router, extract::State, routing::get};
use shellcache_core::{LifecycleState, OfflineAgent};
use std::sync::Arc;
use tracing::warn;

use crate::state::MetricsHandle;

#[derive(Clone)]
struct MetricsState {
    handle: Arc<MetricsHandle>,
    agent: Arc<OfflineAgent>,
}

/// Create metrics routes with the Prometheus handle
pub fn routes(handle: Arc<MetricsHandle>, agent: Arc<OfflineAgent>) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .with_state(MetricsState { handle, agent })
}

/// GET /metrics
async fn get_metrics(State(state): State<MetricsState>) -> String {
    record_agent_gauges(&state.agent).await;
    state.handle.render()
}

async fn record_agent_gauges(agent: &OfflineAgent) {
    let current = agent.state();
    for phase in [
        LifecycleState::Parsed,
        LifecycleState::Installing,
        LifecycleState::Installed,
        LifecycleState::Activating,
        LifecycleState::Activated,
        LifecycleState::Redundant,
    ] {
        let value = if phase == current { 1.0 } else { 0.0 };
        metrics::gauge!("shellcache_lifecycle_state", "state" => phase.as_str()).set(value);
    }

    match agent.namespaces().summaries().await {
        Ok(summaries) => {
            for summary in summaries {
                metrics::gauge!(
                    "shellcache_namespace_entries",
                    "namespace" => summary.name,
                    "live" => if summary.live { "true" } else { "false" }
                )
                .set(summary.entries as f64);
            }
        }
        Err(e) => warn!("Failed to collect namespace gauges: {}", e),
    }
}
