//! Outbound read request model

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Error type for parsing request modes and destinations
#[derive(Debug, Clone)]
pub struct ParseRequestFieldError(String);

impl fmt::Display for ParseRequestFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid request field value: {}", self.0)
    }
}

impl std::error::Error for ParseRequestFieldError {}

/// Request mode, as reported by `Sec-Fetch-Mode`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document navigation
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
    Websocket,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Navigate => "navigate",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::NoCors => "no-cors",
            RequestMode::Cors => "cors",
            RequestMode::Websocket => "websocket",
        }
    }
}

impl FromStr for RequestMode {
    type Err = ParseRequestFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "no-cors" => Ok(RequestMode::NoCors),
            "cors" => Ok(RequestMode::Cors),
            "websocket" => Ok(RequestMode::Websocket),
            _ => Err(ParseRequestFieldError(s.to_string())),
        }
    }
}

/// Request destination, as reported by `Sec-Fetch-Dest`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// No declared destination (plain `fetch()` / XHR)
    #[default]
    Empty,
    Document,
    Style,
    Script,
    Audio,
    Video,
    Image,
    Font,
    Manifest,
    Worker,
    Track,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Empty => "empty",
            Destination::Document => "document",
            Destination::Style => "style",
            Destination::Script => "script",
            Destination::Audio => "audio",
            Destination::Video => "video",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Manifest => "manifest",
            Destination::Worker => "worker",
            Destination::Track => "track",
        }
    }
}

impl FromStr for Destination {
    type Err = ParseRequestFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "empty" => Ok(Destination::Empty),
            "document" => Ok(Destination::Document),
            "style" => Ok(Destination::Style),
            "script" => Ok(Destination::Script),
            "audio" => Ok(Destination::Audio),
            "video" => Ok(Destination::Video),
            "image" => Ok(Destination::Image),
            "font" => Ok(Destination::Font),
            "manifest" => Ok(Destination::Manifest),
            "worker" => Ok(Destination::Worker),
            "track" => Ok(Destination::Track),
            _ => Err(ParseRequestFieldError(s.to_string())),
        }
    }
}

/// How the request interacts with intermediate HTTP caches
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    #[default]
    Default,
    /// Always go to the network and refresh intermediate caches
    Reload,
    NoCache,
    NoStore,
}

/// An outbound request as seen by the interception point
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub cache: CacheMode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchRequest {
    /// A plain GET with default mode and no destination
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::default(),
            destination: Destination::default(),
            cache: CacheMode::default(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// A top-level document navigation
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_metadata() {
        assert_eq!("navigate".parse::<RequestMode>().unwrap(), RequestMode::Navigate);
        assert_eq!("No-Cors".parse::<RequestMode>().unwrap(), RequestMode::NoCors);
        assert!("sideways".parse::<RequestMode>().is_err());

        assert_eq!("style".parse::<Destination>().unwrap(), Destination::Style);
        assert_eq!("".parse::<Destination>().unwrap(), Destination::Empty);
        assert!("hologram".parse::<Destination>().is_err());
    }

    #[test]
    fn test_navigate_builder() {
        let request = FetchRequest::navigate(Url::parse("https://app.test/about").unwrap());
        assert!(request.is_navigation());
        assert_eq!(request.destination, Destination::Document);
        assert_eq!(request.method, Method::GET);
    }
}
