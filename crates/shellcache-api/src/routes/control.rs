//! Agent control routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use shellcache_core::{LifecycleState, NamespaceSummary};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Namespace listing response
#[derive(Serialize)]
pub struct NamespacesResponse {
    pub state: LifecycleState,
    pub ui: String,
    pub audio: String,
    pub namespaces: Vec<NamespaceSummary>,
}

/// POST /_shellcache/message
///
/// Always accepted; the instruction is handled in the background and
/// anything unrecognized is dropped.
async fn post_message(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    match serde_json::from_slice::<Value>(&body) {
        Ok(message) => {
            metrics::counter!("shellcache_messages_total").increment(1);
            // Detached on purpose: priming never reports back to the page
            drop(state.agent.handle_message(message));
        }
        Err(e) => debug!("Dropping non-JSON message: {}", e),
    }

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true })),
    )
}

/// GET /_shellcache/namespaces
async fn list_namespaces(
    State(state): State<AppState>,
) -> Result<Json<NamespacesResponse>, ApiError> {
    let manager = state.agent.namespaces();
    let namespaces = manager.summaries().await?;

    Ok(Json(NamespacesResponse {
        state: state.agent.state(),
        ui: manager.ui().name().to_string(),
        audio: manager.audio().name().to_string(),
        namespaces,
    }))
}

/// Create control routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/_shellcache/message", post(post_message))
        .route("/_shellcache/namespaces", get(list_namespaces))
}
