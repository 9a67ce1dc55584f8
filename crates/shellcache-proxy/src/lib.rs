//! Shellcache Network Fetcher
//!
//! This crate provides the request model and the fetch capability used by
//! the caching agent, along with an HTTP implementation backed by reqwest.

pub mod client;
pub mod error;
pub mod request;

pub use client::{Fetcher, HttpFetcher, HttpFetcherConfig};
pub use error::ProxyError;
pub use request::{CacheMode, Destination, FetchRequest, RequestMode};
