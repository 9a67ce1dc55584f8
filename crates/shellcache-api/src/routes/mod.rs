//! API routes

mod control;
mod health;
mod intercept;
pub mod metrics;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

/// Largest request body forwarded through interception
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let agent = state.agent.clone();
    let mut router = Router::new()
        // Health check
        .merge(health::routes())
        // Agent control surface
        .merge(control::routes())
        // Everything else is an intercepted request
        .fallback(intercept::intercept)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle, agent));
    }

    router
}
