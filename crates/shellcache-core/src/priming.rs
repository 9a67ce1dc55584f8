//! Audio priming channel
//!
//! Lets the controlling page fill the audio namespace ahead of playback
//! by sending `{ "type": "prime-audio", "url": "..." }`. Instructions are
//! best-effort hints: anything malformed or cross-origin is dropped, and
//! fetch or storage failures are logged, never reported back.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shellcache_proxy::{CacheMode, FetchRequest, Fetcher};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PrimingConfig;
use crate::identity::{is_same_origin, request_identity};
use crate::namespace::Namespace;

/// Message shape accepted by the channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrimingInstruction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Why an instruction was dropped
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IgnoreReason {
    Malformed,
    UnknownType,
    MissingUrl,
    InvalidUrl,
    CrossOrigin,
}

/// What happened to an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimeOutcome {
    Stored(String),
    AlreadyCached(String),
    Ignored(IgnoreReason),
    /// Fetch or write failed; the entry was not stored
    Failed(String),
}

/// Populates the audio namespace from explicit instructions
pub struct PrimingChannel {
    namespace: Namespace,
    fetcher: Arc<dyn Fetcher>,
    scope: Url,
    config: PrimingConfig,
}

impl PrimingChannel {
    pub fn new(
        namespace: Namespace,
        fetcher: Arc<dyn Fetcher>,
        scope: Url,
        config: PrimingConfig,
    ) -> Self {
        Self {
            namespace,
            fetcher,
            scope,
            config,
        }
    }

    /// Validate a raw message and resolve its target URL
    pub fn parse(&self, message: &Value) -> Result<Url, IgnoreReason> {
        let instruction: PrimingInstruction =
            serde_json::from_value(message.clone()).map_err(|_| IgnoreReason::Malformed)?;

        if !self.config.message_types.iter().any(|t| *t == instruction.kind) {
            return Err(IgnoreReason::UnknownType);
        }

        let raw = instruction
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or(IgnoreReason::MissingUrl)?;
        let url = self.scope.join(&raw).map_err(|_| IgnoreReason::InvalidUrl)?;

        if !is_same_origin(&url, &self.scope) {
            return Err(IgnoreReason::CrossOrigin);
        }

        Ok(url)
    }

    /// Handle one instruction to completion
    pub async fn prime(&self, message: &Value) -> PrimeOutcome {
        let url = match self.parse(message) {
            Ok(url) => url,
            Err(reason) => {
                debug!("Ignoring priming message ({:?}): {}", reason, message);
                return PrimeOutcome::Ignored(reason);
            }
        };
        let key = request_identity(&url);

        if self.config.skip_if_cached {
            match self.namespace.lookup(&key).await {
                Ok(Some(_)) => {
                    debug!("{} already primed", key);
                    return PrimeOutcome::AlreadyCached(key);
                }
                Ok(None) => {}
                Err(e) => warn!("Priming lookup for {} failed, fetching anyway: {}", key, e),
            }
        }

        let request = FetchRequest::get(url).with_cache(CacheMode::Reload);
        let response = match self.fetcher.fetch(&request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Priming fetch for {} failed: {}", key, e);
                return PrimeOutcome::Failed(key);
            }
        };

        if !response.is_ok() {
            debug!("Priming fetch for {} returned {}", key, response.status);
            return PrimeOutcome::Failed(key);
        }

        match self.namespace.store(&key, response).await {
            Ok(()) => {
                info!("Primed {} into {}", key, self.namespace.name());
                PrimeOutcome::Stored(key)
            }
            Err(e) => {
                warn!("Failed to store primed {}: {}", key, e);
                PrimeOutcome::Failed(key)
            }
        }
    }

    /// Fire-and-forget: spawn the work and return immediately
    pub fn dispatch(self: &Arc<Self>, message: Value) -> JoinHandle<PrimeOutcome> {
        let channel = self.clone();
        tokio::spawn(async move { channel.prime(&message).await })
    }
}
