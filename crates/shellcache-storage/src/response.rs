//! Captured response type stored in cache namespaces

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// How a response was obtained, mirroring the fetch response types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response with readable status, headers and body
    #[default]
    Basic,
    /// Cross-origin response that passed CORS checks
    Cors,
    /// Cross-origin response whose status and body are hidden
    Opaque,
    /// Network error placeholder
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Error => "error",
        }
    }
}

/// A complete captured response: final URL, status, headers and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl CachedResponse {
    /// Create a basic response with an empty body
    pub fn new(url: impl Into<String>, status: StatusCode) -> Self {
        Self {
            url: url.into(),
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            kind: ResponseKind::Basic,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// Whether this response represents success and may be persisted.
    ///
    /// Opaque and error responses never count, regardless of status.
    pub fn is_ok(&self) -> bool {
        matches!(self.kind, ResponseKind::Basic | ResponseKind::Cors) && self.status.is_success()
    }

    /// Content type header, if present and valid UTF-8
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ok() {
        let ok = CachedResponse::new("https://app.test/a", StatusCode::OK);
        assert!(ok.is_ok());

        let not_found = CachedResponse::new("https://app.test/a", StatusCode::NOT_FOUND);
        assert!(!not_found.is_ok());

        let opaque =
            CachedResponse::new("https://cdn.test/a", StatusCode::OK).with_kind(ResponseKind::Opaque);
        assert!(!opaque.is_ok());
    }

    #[test]
    fn test_content_type() {
        let response = CachedResponse::new("https://app.test/style.css", StatusCode::OK).with_header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/css"),
        );
        assert_eq!(response.content_type(), Some("text/css"));
    }
}
