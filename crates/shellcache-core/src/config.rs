//! Agent configuration
//!
//! Process-wide, immutable settings supplied at startup: scope, core asset
//! manifest, namespace roles and versions, classification signals and
//! priming behaviour. The binary loads these from TOML; tests build them
//! directly.

use serde::{Deserialize, Serialize};
use shellcache_proxy::Destination;
use std::collections::HashSet;
use url::Url;

use crate::error::CoreError;

/// Namespace roles and versions
///
/// Physical names are `<role>:<version>`. UI and audio versions move
/// independently, so a UI-only deploy keeps cached audio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceConfig {
    #[serde(default = "default_ui_role")]
    pub ui_role: String,
    #[serde(default = "default_audio_role")]
    pub audio_role: String,
    #[serde(default = "default_version")]
    pub ui_version: String,
    #[serde(default = "default_version")]
    pub audio_version: String,
}

impl NamespaceConfig {
    pub fn ui_name(&self) -> String {
        format!("{}:{}", self.ui_role, self.ui_version)
    }

    pub fn audio_name(&self) -> String {
        format!("{}:{}", self.audio_role, self.audio_version)
    }
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            ui_role: default_ui_role(),
            audio_role: default_audio_role(),
            ui_version: default_version(),
            audio_version: default_version(),
        }
    }
}

/// Signals used to classify intercepted reads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationConfig {
    /// Path substrings marking audio resources
    #[serde(default = "default_audio_markers")]
    pub audio_markers: Vec<String>,
    /// Destinations handled as UI assets (navigations always are)
    #[serde(default = "default_ui_destinations")]
    pub ui_destinations: Vec<Destination>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            audio_markers: default_audio_markers(),
            ui_destinations: default_ui_destinations(),
        }
    }
}

/// Priming channel behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrimingConfig {
    /// Accepted values of the instruction `type` field
    #[serde(default = "default_message_types")]
    pub message_types: Vec<String>,
    /// Skip the network when the URL is already in the audio namespace
    #[serde(default = "default_skip_if_cached")]
    pub skip_if_cached: bool,
}

impl Default for PrimingConfig {
    fn default() -> Self {
        Self {
            message_types: default_message_types(),
            skip_if_cached: default_skip_if_cached(),
        }
    }
}

/// Complete agent configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// Registration scope; its origin is the agent's origin
    pub scope: Url,
    /// Core UI assets, relative to the scope
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,
    /// Shell document served to offline navigations, relative to the scope
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,
    #[serde(default)]
    pub namespaces: NamespaceConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub priming: PrimingConfig,
}

impl AgentConfig {
    /// Configuration with defaults for everything but the scope
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            manifest: default_manifest(),
            offline_fallback: default_offline_fallback(),
            namespaces: NamespaceConfig::default(),
            classification: ClassificationConfig::default(),
            priming: PrimingConfig::default(),
        }
    }

    /// Resolve a scope-relative path to an absolute URL
    pub fn resolve(&self, path: &str) -> Result<Url, CoreError> {
        self.scope
            .join(path)
            .map_err(|e| CoreError::Config(format!("Cannot resolve '{}': {}", path, e)))
    }

    /// Absolute URLs of the core UI assets, in manifest order
    pub fn manifest_urls(&self) -> Result<Vec<Url>, CoreError> {
        self.manifest.iter().map(|p| self.resolve(p)).collect()
    }

    /// Absolute URL of the offline fallback document
    pub fn offline_fallback_url(&self) -> Result<Url, CoreError> {
        self.resolve(&self.offline_fallback)
    }

    /// Check the configuration for mistakes that would break the lifecycle
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.scope.cannot_be_a_base() || !matches!(self.scope.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "Scope must be an http(s) URL: {}",
                self.scope
            )));
        }

        let ns = &self.namespaces;
        for (field, value) in [
            ("ui_role", &ns.ui_role),
            ("audio_role", &ns.audio_role),
            ("ui_version", &ns.ui_version),
            ("audio_version", &ns.audio_version),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Config(format!("namespaces.{} is empty", field)));
            }
        }
        if ns.ui_name() == ns.audio_name() {
            return Err(CoreError::Config(format!(
                "UI and audio namespaces share the name '{}'",
                ns.ui_name()
            )));
        }

        let origin = self.scope.origin();
        let mut seen = HashSet::new();
        for url in self.manifest_urls()? {
            if url.origin() != origin {
                return Err(CoreError::Config(format!(
                    "Manifest entry is cross-origin: {}",
                    url
                )));
            }
            if !seen.insert(crate::identity::request_identity(&url)) {
                return Err(CoreError::Config(format!("Duplicate manifest entry: {}", url)));
            }
        }

        if self.offline_fallback_url()?.origin() != origin {
            return Err(CoreError::Config(
                "Offline fallback must be same-origin".to_string(),
            ));
        }

        if self.classification.audio_markers.iter().any(|m| m.is_empty()) {
            return Err(CoreError::Config(
                "Empty audio marker would match every path".to_string(),
            ));
        }

        Ok(())
    }
}

// Default value functions
fn default_ui_role() -> String {
    "ui".to_string()
}

fn default_audio_role() -> String {
    "audio".to_string()
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_manifest() -> Vec<String> {
    ["./", "./index.html", "./style.css", "./app.js", "./manifest.json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_offline_fallback() -> String {
    "./index.html".to_string()
}

fn default_audio_markers() -> Vec<String> {
    vec!["/audios/".to_string(), "/audios2/".to_string()]
}

fn default_ui_destinations() -> Vec<Destination> {
    vec![Destination::Style, Destination::Script, Destination::Document]
}

fn default_message_types() -> Vec<String> {
    vec!["prime-audio".to_string(), "CACHE_AUDIO".to_string()]
}

fn default_skip_if_cached() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AgentConfig {
        AgentConfig::new(Url::parse("https://app.test/athkar/").unwrap())
    }

    #[test]
    fn test_namespace_names() {
        let mut ns = NamespaceConfig::default();
        assert_eq!(ns.ui_name(), "ui:v1");
        assert_eq!(ns.audio_name(), "audio:v1");

        ns.ui_version = "v7".to_string();
        assert_eq!(ns.ui_name(), "ui:v7");
        assert_eq!(ns.audio_name(), "audio:v1");
    }

    #[test]
    fn test_manifest_resolves_against_scope() {
        let urls = config().manifest_urls().unwrap();
        let urls: Vec<&str> = urls.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://app.test/athkar/",
                "https://app.test/athkar/index.html",
                "https://app.test/athkar/style.css",
                "https://app.test/athkar/app.js",
                "https://app.test/athkar/manifest.json",
            ]
        );
    }

    #[test]
    fn test_validate_defaults() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_shared_names() {
        let mut config = config();
        config.namespaces.audio_role = "ui".to_string();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_cross_origin_manifest() {
        let mut config = config();
        config.manifest.push("https://cdn.test/lib.js".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = config();
        config.manifest.push("./app.js#again".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: AgentConfig = serde_json::from_value(serde_json::json!({
            "scope": "https://app.test/",
            "namespaces": { "ui_version": "v2" },
            "classification": { "ui_destinations": ["style", "script"] },
            "priming": { "skip_if_cached": false }
        }))
        .unwrap();

        assert_eq!(config.namespaces.ui_name(), "ui:v2");
        assert_eq!(config.namespaces.audio_name(), "audio:v1");
        assert_eq!(
            config.classification.ui_destinations,
            vec![Destination::Style, Destination::Script]
        );
        assert_eq!(config.classification.audio_markers.len(), 2);
        assert!(!config.priming.skip_if_cached);
        assert_eq!(config.manifest.len(), 5);
    }
}
