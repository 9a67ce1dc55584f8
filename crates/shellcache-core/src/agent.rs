//! Lifecycle agent
//!
//! The host drives the agent through explicit phases. `install` and
//! `activate` must resolve before the host moves on to the next phase;
//! fetch interception only starts once the agent controls its clients.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use shellcache_proxy::{FetchRequest, Fetcher};
use shellcache_storage::CacheStorage;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::classify::Classifier;
use crate::config::AgentConfig;
use crate::error::CoreError;
use crate::identity::request_identity;
use crate::namespace::NamespaceManager;
use crate::priming::{PrimeOutcome, PrimingChannel};
use crate::router::{Intercept, PassReason, RequestRouter};
use crate::strategy::{CacheFirst, StaleWhileRevalidate};

/// Lifecycle phase of the agent
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Installation or activation failed; the agent will never control clients
    Redundant,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

/// The offline caching agent
pub struct OfflineAgent {
    config: Arc<AgentConfig>,
    namespaces: NamespaceManager,
    router: RequestRouter,
    priming: Arc<PrimingChannel>,
    state: RwLock<LifecycleState>,
}

impl OfflineAgent {
    /// Build an agent over the given store and network
    pub fn new(
        config: AgentConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let config = Arc::new(config);

        let namespaces = NamespaceManager::new(storage, fetcher.clone(), config.clone());
        let fallback_key = request_identity(&config.offline_fallback_url()?);

        let router = RequestRouter::new(
            config.scope.clone(),
            Classifier::new(config.classification.clone()),
            CacheFirst::new(namespaces.audio().clone(), fetcher.clone()),
            StaleWhileRevalidate::new(namespaces.ui().clone(), fetcher.clone(), fallback_key),
        );

        let priming = Arc::new(PrimingChannel::new(
            namespaces.audio().clone(),
            fetcher,
            config.scope.clone(),
            config.priming.clone(),
        ));

        info!("Created offline agent for scope {}", config.scope);

        Ok(Self {
            config,
            namespaces,
            router,
            priming,
            state: RwLock::new(LifecycleState::Parsed),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        &self.namespaces
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    /// Whether fetches are being intercepted
    pub fn is_controlling(&self) -> bool {
        self.state() == LifecycleState::Activated
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), CoreError> {
        let mut state = self.state.write();
        if *state != from {
            return Err(CoreError::Lifecycle(format!(
                "cannot move to {} from {}",
                to.as_str(),
                state.as_str()
            )));
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: LifecycleState) {
        *self.state.write() = to;
    }

    /// Install phase: cache the application shell.
    ///
    /// Returns the number of core assets stored. Any failure makes the
    /// agent redundant.
    pub async fn install(&self) -> Result<usize, CoreError> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing)?;
        info!("Installing offline agent");

        match self.namespaces.ensure_ui_assets_primed().await {
            Ok(count) => {
                self.set_state(LifecycleState::Installed);
                info!("Install complete ({} core assets)", count);
                Ok(count)
            }
            Err(e) => {
                self.set_state(LifecycleState::Redundant);
                error!("Install failed: {}", e);
                Err(e)
            }
        }
    }

    /// Activate phase: drop old-version namespaces, then claim clients.
    ///
    /// Returns the names of the deleted namespaces.
    pub async fn activate(&self) -> Result<Vec<String>, CoreError> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating)?;
        info!("Activating offline agent");

        match self.namespaces.reclaim_stale_namespaces().await {
            Ok(deleted) => {
                self.set_state(LifecycleState::Activated);
                info!(
                    "Activated; reclaimed {} stale namespaces, now controlling clients",
                    deleted.len()
                );
                Ok(deleted)
            }
            Err(e) => {
                self.set_state(LifecycleState::Redundant);
                error!("Activation failed: {}", e);
                Err(e)
            }
        }
    }

    /// Intercept an outbound request
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<Intercept, CoreError> {
        if !self.is_controlling() {
            return Ok(Intercept::Passthrough(PassReason::NotControlling));
        }
        self.router.handle(request).await
    }

    /// Accept a message from the controlling page.
    ///
    /// The work runs detached; callers may drop the handle.
    pub fn handle_message(&self, message: Value) -> JoinHandle<PrimeOutcome> {
        self.priming.dispatch(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ResponseSource;
    use crate::testing::{MockFetcher, config, memory_storage, ok, url};
    use serde_json::json;
    use shellcache_proxy::Destination;

    fn serve_shell(fetcher: &MockFetcher) {
        fetcher.serve("./", "<html>root</html>");
        fetcher.serve("./index.html", "<html>index</html>");
        fetcher.serve("./style.css", "body {}");
        fetcher.serve("./app.js", "main()");
        fetcher.serve("./manifest.json", "{}");
    }

    async fn activated_agent(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<MockFetcher>,
    ) -> OfflineAgent {
        serve_shell(&fetcher);
        let agent = OfflineAgent::new(config(), storage, fetcher).unwrap();
        agent.install().await.unwrap();
        agent.activate().await.unwrap();
        agent
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let storage = memory_storage();
        storage.open("ui:v0").await.unwrap();
        storage.open("audio:v0").await.unwrap();
        let fetcher = MockFetcher::new();
        serve_shell(&fetcher);

        let agent = OfflineAgent::new(config(), storage.clone(), fetcher).unwrap();
        assert_eq!(agent.state(), LifecycleState::Parsed);

        assert_eq!(agent.install().await.unwrap(), 5);
        assert_eq!(agent.state(), LifecycleState::Installed);

        let mut deleted = agent.activate().await.unwrap();
        deleted.sort();
        assert_eq!(deleted, vec!["audio:v0", "ui:v0"]);
        assert!(agent.is_controlling());
        assert_eq!(storage.keys().await.unwrap(), vec!["ui:v1"]);
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant() {
        let fetcher = MockFetcher::new();
        let agent = OfflineAgent::new(config(), memory_storage(), fetcher).unwrap();

        assert!(matches!(agent.install().await, Err(CoreError::Install { .. })));
        assert_eq!(agent.state(), LifecycleState::Redundant);
        assert!(matches!(agent.activate().await, Err(CoreError::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let agent = OfflineAgent::new(config(), memory_storage(), MockFetcher::new()).unwrap();
        assert!(matches!(agent.activate().await, Err(CoreError::Lifecycle(_))));
        assert_eq!(agent.state(), LifecycleState::Parsed);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = config();
        config.manifest.push("https://cdn.test/x.js".to_string());
        assert!(OfflineAgent::new(config, memory_storage(), MockFetcher::new()).is_err());
    }

    #[tokio::test]
    async fn test_no_interception_before_activation() {
        let fetcher = MockFetcher::new();
        serve_shell(&fetcher);
        let agent = OfflineAgent::new(config(), memory_storage(), fetcher).unwrap();
        agent.install().await.unwrap();

        let outcome = agent
            .handle_fetch(&FetchRequest::navigate(url("./")))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Intercept::Passthrough(PassReason::NotControlling)
        ));
    }

    #[tokio::test]
    async fn test_offline_navigation_after_install() {
        let fetcher = MockFetcher::new();
        let agent = activated_agent(memory_storage(), fetcher.clone()).await;
        fetcher.set_offline(true);

        let outcome = agent
            .handle_fetch(&FetchRequest::navigate(url("./adhkar/morning")))
            .await
            .unwrap();
        match outcome {
            Intercept::Respond(served) => {
                assert_eq!(served.source, ResponseSource::OfflineFallback);
                assert_eq!(served.response, ok("./index.html", "<html>index</html>"));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shell_asset_served_from_cache() {
        let fetcher = MockFetcher::new();
        let agent = activated_agent(memory_storage(), fetcher.clone()).await;
        fetcher.serve("./style.css", "body { margin: 0 }");

        let request = FetchRequest::get(url("./style.css")).with_destination(Destination::Style);
        let Intercept::Respond(first) = agent.handle_fetch(&request).await.unwrap() else {
            panic!("style.css should be intercepted");
        };
        assert_eq!(first.response.body, "body {}");
        first.revalidation.unwrap().await.unwrap();

        let Intercept::Respond(second) = agent.handle_fetch(&request).await.unwrap() else {
            panic!("style.css should be intercepted");
        };
        assert_eq!(second.response.body, "body { margin: 0 }");
    }

    #[tokio::test]
    async fn test_primed_audio_plays_offline() {
        let storage = memory_storage();
        let fetcher = MockFetcher::new();
        fetcher.serve("./audios/morning/1.mp3", "ID3 morning");
        let agent = activated_agent(storage.clone(), fetcher.clone()).await;

        let outcome = agent
            .handle_message(json!({ "type": "prime-audio", "url": "./audios/morning/1.mp3" }))
            .await
            .unwrap();
        assert!(matches!(outcome, PrimeOutcome::Stored(_)));

        fetcher.set_offline(true);
        let Intercept::Respond(served) = agent
            .handle_fetch(&FetchRequest::get(url("./audios/morning/1.mp3")))
            .await
            .unwrap()
        else {
            panic!("audio should be intercepted");
        };
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response.body, "ID3 morning");
    }

    #[tokio::test]
    async fn test_uncached_audio_fails_offline() {
        let fetcher = MockFetcher::new();
        let agent = activated_agent(memory_storage(), fetcher.clone()).await;
        fetcher.set_offline(true);

        let result = agent
            .handle_fetch(&FetchRequest::get(url("./audios/never.mp3")))
            .await;
        assert!(matches!(result, Err(CoreError::Proxy(_))));
    }
}
