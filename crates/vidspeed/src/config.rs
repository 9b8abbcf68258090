//! Extension configuration
//!
//! Timings, presets and the supported-site allow-list. Defaults match the
//! shipped extension; a YAML file can override any field.

use crate::advisory::Notifier;
use crate::error::{VidspeedError, VidspeedResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Sites the panel labels as supported (substring match on hostname)
pub const DEFAULT_SUPPORTED_SITES: [&str; 5] =
    ["bilibili.com", "youtube.com", "youku.com", "iqiyi.com", "qq.com"];

/// Preset buttons offered by the panel
pub const DEFAULT_PRESETS: [f64; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0, 3.0];

/// Extension configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    /// Wait between injecting a controller and retrying delivery
    pub retry_grace_ms: u64,
    /// How long an on-page advisory stays fully visible
    pub advisory_ttl_ms: u64,
    /// Fade-out after the visible period
    pub advisory_fade_ms: u64,
    /// How long an inline panel error stays
    pub panel_error_ttl_ms: u64,
    /// Show on-page advisories at all
    pub show_advisories: bool,
    /// Panel preset speeds
    pub presets: Vec<f64>,
    /// Supported-site allow-list
    pub supported_sites: Vec<String>,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            retry_grace_ms: 1000,
            advisory_ttl_ms: 3000,
            advisory_fade_ms: 300,
            panel_error_ttl_ms: 3000,
            show_advisories: true,
            presets: DEFAULT_PRESETS.to_vec(),
            supported_sites: DEFAULT_SUPPORTED_SITES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl ExtensionConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> VidspeedResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> VidspeedResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> VidspeedResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check field invariants
    pub fn validate(&self) -> VidspeedResult<()> {
        if self.advisory_ttl_ms == 0 {
            return Err(VidspeedError::config("advisory_ttl_ms must be positive"));
        }
        if self.panel_error_ttl_ms == 0 {
            return Err(VidspeedError::config("panel_error_ttl_ms must be positive"));
        }
        if self.presets.is_empty() {
            return Err(VidspeedError::config("at least one preset is required"));
        }
        if let Some(bad) = self.presets.iter().find(|p| !p.is_finite() || **p <= 0.0) {
            return Err(VidspeedError::config(format!(
                "preset {bad} is not a positive multiplier"
            )));
        }
        if self.supported_sites.iter().any(|s| s.trim().is_empty()) {
            return Err(VidspeedError::config("supported site entries must not be empty"));
        }
        Ok(())
    }

    /// Set the injection retry grace period
    #[must_use]
    pub const fn with_retry_grace_ms(mut self, ms: u64) -> Self {
        self.retry_grace_ms = ms;
        self
    }

    /// Turn on-page advisories on or off
    #[must_use]
    pub const fn with_show_advisories(mut self, show: bool) -> Self {
        self.show_advisories = show;
        self
    }

    /// Retry grace period
    #[must_use]
    pub const fn retry_grace(&self) -> Duration {
        Duration::from_millis(self.retry_grace_ms)
    }

    /// Inline panel error lifetime
    #[must_use]
    pub const fn panel_error_ttl(&self) -> Duration {
        Duration::from_millis(self.panel_error_ttl_ms)
    }

    /// Notifier for a new page controller
    #[must_use]
    pub fn notifier(&self) -> Notifier {
        Notifier::new(
            Duration::from_millis(self.advisory_ttl_ms),
            Duration::from_millis(self.advisory_fade_ms),
        )
        .with_enabled(self.show_advisories)
    }
}
