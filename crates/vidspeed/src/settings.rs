//! Persisted user preferences
//!
//! A flat key-value map with camelCase keys. Missing keys fall back to
//! their defaults on load; unknown keys are ignored.

use crate::error::SettingsError;
use crate::lock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;

/// User preferences shown and edited in the control panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Show on-page notifications
    pub show_notifications: bool,
    /// Restore the last chosen speed in the panel display
    pub remember_speed: bool,
    /// Last speed chosen while `remember_speed` was on
    pub last_speed: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_notifications: true,
            remember_speed: false,
            last_speed: 1.0,
        }
    }
}

impl Settings {
    /// Value stored under `key`
    #[must_use]
    pub const fn get(&self, key: SettingKey) -> SettingValue {
        match key {
            SettingKey::ShowNotifications => SettingValue::Flag(self.show_notifications),
            SettingKey::RememberSpeed => SettingValue::Flag(self.remember_speed),
            SettingKey::LastSpeed => SettingValue::Speed(self.last_speed),
        }
    }

    /// Store `value` under `key`, checking its type
    pub fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        match (key, value) {
            (SettingKey::ShowNotifications, SettingValue::Flag(v)) => self.show_notifications = v,
            (SettingKey::RememberSpeed, SettingValue::Flag(v)) => self.remember_speed = v,
            (SettingKey::LastSpeed, SettingValue::Speed(v)) if v.is_finite() && v > 0.0 => {
                self.last_speed = v;
            }
            _ => {
                return Err(SettingsError::InvalidValue {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// Setting keys as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingKey {
    /// `showNotifications`
    ShowNotifications,
    /// `rememberSpeed`
    RememberSpeed,
    /// `lastSpeed`
    LastSpeed,
}

impl SettingKey {
    /// Every key
    pub const ALL: [Self; 3] = [Self::ShowNotifications, Self::RememberSpeed, Self::LastSpeed];

    /// Stored key name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ShowNotifications => "showNotifications",
            Self::RememberSpeed => "rememberSpeed",
            Self::LastSpeed => "lastSpeed",
        }
    }

    /// Parse a value written on a command line for this key
    pub fn parse_value(self, raw: &str) -> Result<SettingValue, SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: self.to_string(),
        };
        match self {
            Self::ShowNotifications | Self::RememberSpeed => {
                raw.parse::<bool>().map(SettingValue::Flag).map_err(|_| invalid())
            }
            Self::LastSpeed => raw
                .trim_end_matches('x')
                .parse::<f64>()
                .map(SettingValue::Speed)
                .map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| SettingsError::InvalidValue { key: s.to_string() })
    }
}

/// A setting value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean flag
    Flag(bool),
    /// Playback speed
    Speed(f64),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(v) => write!(f, "{v}"),
            Self::Speed(v) => write!(f, "{v}"),
        }
    }
}

/// Key-value storage for [`Settings`]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read all settings, defaults for missing keys
    async fn load(&self) -> Result<Settings, SettingsError>;

    /// Write one key
    async fn save(&self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError>;
}

/// In-memory store, optionally failing every operation
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: Mutex<Settings>,
    failure: Mutex<Option<String>>,
    writes: Mutex<u32>,
}

impl MemoryStore {
    /// Store holding the defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `settings`
    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            ..Self::default()
        }
    }

    /// Make every later operation fail with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    /// Current contents
    #[must_use]
    pub fn snapshot(&self) -> Settings {
        *lock(&self.settings)
    }

    /// Successful writes so far
    #[must_use]
    pub fn writes(&self) -> u32 {
        *lock(&self.writes)
    }

    fn check(&self) -> Result<(), SettingsError> {
        match lock(&self.failure).as_ref() {
            Some(message) => Err(SettingsError::unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<Settings, SettingsError> {
        self.check()?;
        Ok(self.snapshot())
    }

    async fn save(&self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        self.check()?;
        lock(&self.settings).set(key, value)?;
        *lock(&self.writes) += 1;
        Ok(())
    }
}

/// Settings kept as a JSON object in a file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store backed by `path`; the file is created on first save
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileStore {
    async fn load(&self) -> Result<Settings, SettingsError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        let mut settings = self.load().await?;
        settings.set(key, value)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&settings)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(key = key.name(), %value, "setting saved");
        Ok(())
    }
}
