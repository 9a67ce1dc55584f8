//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shellcache_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Misdirected request: {0}")]
    Misdirected(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] shellcache_proxy::ProxyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Misdirected(msg) => (
                StatusCode::MISDIRECTED_REQUEST,
                "MISDIRECTED_REQUEST",
                msg.clone(),
            ),
            ApiError::Core(e) => match e {
                CoreError::Proxy(_) => (StatusCode::BAD_GATEWAY, "NETWORK_ERROR", e.to_string()),
                CoreError::Storage(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    e.to_string(),
                ),
                CoreError::Lifecycle(_) | CoreError::Install { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "NOT_READY",
                    e.to_string(),
                ),
                CoreError::Config(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    e.to_string(),
                ),
                CoreError::Task(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    e.to_string(),
                ),
            },
            ApiError::Upstream(e) => (StatusCode::BAD_GATEWAY, "NETWORK_ERROR", e.to_string()),
        };

        let body = axum::Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
