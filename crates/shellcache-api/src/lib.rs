//! Shellcache HTTP Host
//!
//! This crate exposes the offline agent over HTTP with Axum: every
//! ordinary request goes through fetch interception, and a small control
//! surface accepts priming messages and reports namespace state.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
