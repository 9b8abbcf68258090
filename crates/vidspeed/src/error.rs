//! Result and error types for vidspeed.

use thiserror::Error;

/// Result type for vidspeed operations
pub type VidspeedResult<T> = Result<T, VidspeedError>;

/// Errors that can occur in vidspeed
#[derive(Debug, Error)]
pub enum VidspeedError {
    /// A message could not reach its destination context
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// A media element rejected an operation
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Settings could not be read or written
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Configuration is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl VidspeedError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Failure to hand a message to another context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// No tab is focused
    #[error("no active tab")]
    NoActiveTab,

    /// The tab id is unknown to the host
    #[error("tab {tab} does not exist")]
    NoSuchTab {
        /// Tab id
        tab: u32,
    },

    /// The tab exists but no controller listens in it
    #[error("no receiver in tab {tab}")]
    NoReceiver {
        /// Tab id
        tab: u32,
    },

    /// The host refused to inject the controller script
    #[error("script injection refused for tab {tab}: {reason}")]
    InjectionRefused {
        /// Tab id
        tab: u32,
        /// Why the host refused
        reason: String,
    },

    /// The message could not be encoded or decoded in transit
    #[error("message could not cross the context boundary: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

/// Failure reported by a media element
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaError {
    /// The element has been removed from the page
    #[error("media element is detached from the page")]
    Detached,

    /// The element refused the playback rate
    #[error("playback rate {rate} is not supported")]
    UnsupportedRate {
        /// Rejected rate
        rate: f64,
    },
}

/// Failure reading or writing persisted settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Underlying storage failed
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Error message
        message: String,
    },

    /// Stored value has the wrong type for its key
    #[error("setting {key} has an invalid value")]
    InvalidValue {
        /// Setting key
        key: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SettingsError {
    /// Create a storage-unavailable error
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
