//! Request classification

use serde::Serialize;
use shellcache_proxy::FetchRequest;

use crate::config::ClassificationConfig;

/// Stateless tag derived for each intercepted same-origin read
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Audio,
    UiNavigation,
    UiAsset,
    Unhandled,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Audio => "audio",
            Classification::UiNavigation => "ui-navigation",
            Classification::UiAsset => "ui-asset",
            Classification::Unhandled => "unhandled",
        }
    }
}

/// Classifies requests from URL path markers and declared mode/destination
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassificationConfig,
}

impl Classifier {
    pub fn new(config: ClassificationConfig) -> Self {
        Self { config }
    }

    /// Audio markers win over UI signals; no content sniffing.
    pub fn classify(&self, request: &FetchRequest) -> Classification {
        let path = request.url.path();

        if self
            .config
            .audio_markers
            .iter()
            .any(|marker| path.contains(marker.as_str()))
        {
            return Classification::Audio;
        }

        if request.is_navigation() {
            return Classification::UiNavigation;
        }

        if self.config.ui_destinations.contains(&request.destination) {
            return Classification::UiAsset;
        }

        Classification::Unhandled
    }
}
