//! Cache namespace management
//!
//! Owns the two live partitions (UI shell assets and audio media), primes
//! the UI partition at install time and reclaims partitions left behind by
//! earlier versions at activation time.

use futures::future::try_join_all;
use serde::Serialize;
use shellcache_proxy::{FetchRequest, Fetcher};
use shellcache_storage::{CacheStorage, CachedResponse};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::CoreError;
use crate::identity::request_identity;

/// Handle on one named partition of the store
#[derive(Clone)]
pub struct Namespace {
    name: String,
    storage: Arc<dyn CacheStorage>,
}

impl Namespace {
    pub fn new(name: impl Into<String>, storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            name: name.into(),
            storage,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the partition if it does not exist yet
    pub async fn open(&self) -> Result<(), CoreError> {
        Ok(self.storage.open(&self.name).await?)
    }

    pub async fn lookup(&self, key: &str) -> Result<Option<CachedResponse>, CoreError> {
        Ok(self.storage.match_entry(&self.name, key).await?)
    }

    /// Store a response, overwriting any previous entry for `key`
    pub async fn store(&self, key: &str, response: CachedResponse) -> Result<(), CoreError> {
        Ok(self.storage.put(&self.name, key, response).await?)
    }

    pub async fn keys(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.storage.entry_keys(&self.name).await?)
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Summary of one partition in the store
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NamespaceSummary {
    pub name: String,
    pub entries: usize,
    /// Whether this is one of the current version's partitions
    pub live: bool,
}

/// Manages the versioned UI and audio partitions
pub struct NamespaceManager {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    config: Arc<AgentConfig>,
    ui: Namespace,
    audio: Namespace,
}

impl NamespaceManager {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        config: Arc<AgentConfig>,
    ) -> Self {
        let ui = Namespace::new(config.namespaces.ui_name(), storage.clone());
        let audio = Namespace::new(config.namespaces.audio_name(), storage.clone());

        info!(
            "Initializing namespace manager (ui: {}, audio: {})",
            ui.name(),
            audio.name()
        );

        Self {
            storage,
            fetcher,
            config,
            ui,
            audio,
        }
    }

    pub fn ui(&self) -> &Namespace {
        &self.ui
    }

    pub fn audio(&self) -> &Namespace {
        &self.audio
    }

    fn is_live(&self, name: &str) -> bool {
        name == self.ui.name() || name == self.audio.name()
    }

    /// Open the UI partition and populate it with every core asset.
    ///
    /// All assets are fetched before anything is written; a single
    /// transport failure or unsuccessful status aborts with
    /// [`CoreError::Install`] and leaves no partial shell behind.
    pub async fn ensure_ui_assets_primed(&self) -> Result<usize, CoreError> {
        self.ui.open().await?;

        let urls = self.config.manifest_urls()?;
        info!("Priming {} core UI assets into {}", urls.len(), self.ui.name());

        let fetches = urls.into_iter().map(|url| {
            let fetcher = self.fetcher.clone();
            async move {
                let request = FetchRequest::get(url);
                let response =
                    fetcher
                        .fetch(&request)
                        .await
                        .map_err(|e| CoreError::Install {
                            url: request.url.to_string(),
                            reason: e.to_string(),
                        })?;
                if !response.is_ok() {
                    return Err(CoreError::Install {
                        url: request.url.to_string(),
                        reason: format!("unexpected status {}", response.status),
                    });
                }
                Ok((request_identity(&request.url), response))
            }
        });

        let fetched = try_join_all(fetches).await?;
        let count = fetched.len();

        for (key, response) in fetched {
            debug!("Storing core asset {}", key);
            self.ui.store(&key, response).await?;
        }

        info!("Primed {} core UI assets", count);
        Ok(count)
    }

    /// Delete every partition that is not the current UI or audio one.
    ///
    /// Returns the names of the deleted partitions.
    pub async fn reclaim_stale_namespaces(&self) -> Result<Vec<String>, CoreError> {
        let names = self.storage.keys().await?;
        let stale: Vec<String> = names.into_iter().filter(|n| !self.is_live(n)).collect();

        let mut deleted = Vec::with_capacity(stale.len());
        for name in stale {
            if self.storage.delete(&name).await? {
                info!("Deleted stale namespace {}", name);
                deleted.push(name);
            } else {
                warn!("Stale namespace {} vanished before deletion", name);
            }
        }

        Ok(deleted)
    }

    /// List every partition in the store with its entry count
    pub async fn summaries(&self) -> Result<Vec<NamespaceSummary>, CoreError> {
        let mut summaries = Vec::new();
        for name in self.storage.keys().await? {
            let entries = self.storage.entry_keys(&name).await?.len();
            summaries.push(NamespaceSummary {
                live: self.is_live(&name),
                name,
                entries,
            });
        }
        Ok(summaries)
    }
}
