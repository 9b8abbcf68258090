//! Message contract between the dispatcher, the panel and page controllers
//!
//! Every message that crosses a context boundary is encoded to JSON and
//! decoded on the other side, so nothing but plain data is shared.

use crate::error::DeliveryError;
use crate::speed::Limit;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Step commands bound to keyboard shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepCommand {
    /// One ladder step faster
    SpeedUp,
    /// One ladder step slower
    SpeedDown,
    /// Back to 1.0x
    SpeedReset,
}

impl StepCommand {
    /// All shortcut-bound commands
    pub const ALL: [Self; 3] = [Self::SpeedUp, Self::SpeedDown, Self::SpeedReset];

    /// Shortcut / wire name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SpeedUp => "speed-up",
            Self::SpeedDown => "speed-down",
            Self::SpeedReset => "speed-reset",
        }
    }
}

impl fmt::Display for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for a shortcut name that maps to no command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command: {}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for StepCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.name() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// A command consumed once by a page controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// One ladder step faster
    SpeedUp,
    /// One ladder step slower
    SpeedDown,
    /// Back to 1.0x
    SpeedReset,
    /// Apply an arbitrary multiplier
    SetSpeed(f64),
    /// Report the located element without touching it
    CheckVideo,
}

impl From<StepCommand> for Command {
    fn from(step: StepCommand) -> Self {
        match step {
            StepCommand::SpeedUp => Self::SpeedUp,
            StepCommand::SpeedDown => Self::SpeedDown,
            StepCommand::SpeedReset => Self::SpeedReset,
        }
    }
}

/// Requests addressed to a page controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Request {
    /// Shortcut or button step command
    SpeedControl {
        /// Which step
        command: StepCommand,
    },
    /// Preset speed from the panel
    SetSpeed {
        /// Target multiplier
        speed: f64,
    },
    /// Panel asking for live page state
    CheckVideo,
}

impl Request {
    /// Wrap a step command
    #[must_use]
    pub const fn step(command: StepCommand) -> Self {
        Self::SpeedControl { command }
    }

    /// Wire action name
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::SpeedControl { .. } => "speed-control",
            Self::SetSpeed { .. } => "set-speed",
            Self::CheckVideo => "check-video",
        }
    }

    /// The command the controller will run
    #[must_use]
    pub fn command(&self) -> Command {
        match *self {
            Self::SpeedControl { command } => command.into(),
            Self::SetSpeed { speed } => Command::SetSpeed(speed),
            Self::CheckVideo => Command::CheckVideo,
        }
    }
}

/// State of one media element at lookup time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSnapshot {
    /// Current playback multiplier
    pub speed: f64,
    /// Whether playback is paused
    pub paused: bool,
    /// Elapsed time in seconds
    pub current_time: f64,
}

/// Reports emitted by page controllers, consumed by any listener
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum StatusReport {
    /// A rate change was applied
    SpeedChanged {
        /// New multiplier
        speed: f64,
    },
    /// A media element was found by `check-video`
    VideoDetected {
        /// Element's multiplier
        speed: f64,
        /// Whether playback is paused
        paused: bool,
        /// Elapsed time in seconds
        #[serde(rename = "currentTime")]
        current_time: f64,
    },
    /// The page has no media element
    VideoNotFound,
}

impl StatusReport {
    /// Wire action name
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::SpeedChanged { .. } => "speed-changed",
            Self::VideoDetected { .. } => "video-detected",
            Self::VideoNotFound => "video-not-found",
        }
    }
}

impl From<MediaSnapshot> for StatusReport {
    fn from(snapshot: MediaSnapshot) -> Self {
        Self::VideoDetected {
            speed: snapshot.speed,
            paused: snapshot.paused,
            current_time: snapshot.current_time,
        }
    }
}

/// Explicit result of applying one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outcome {
    /// The element now plays at `speed`
    Applied {
        /// Applied multiplier
        speed: f64,
    },
    /// A step command hit the end of the ladder
    LimitReached {
        /// Which end
        limit: Limit,
    },
    /// `check-video` found an element
    Detected(MediaSnapshot),
    /// The page has no media element
    NoMedia,
    /// The element rejected the rate
    ApplyFailed {
        /// Why it was rejected
        reason: String,
    },
}

impl Outcome {
    /// Whether the page was left in the requested state
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Applied { .. } | Self::LimitReached { .. } | Self::Detected(_)
        )
    }
}

/// Response returned to the sender of a [`Request`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Whether the request was carried out
    pub success: bool,
    /// Applied or observed multiplier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Answer to `check-video`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_video: Option<bool>,
    /// Human-readable failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// What the controller actually did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl Response {
    /// Bare acknowledgement
    #[must_use]
    pub fn ack() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Failure with a message and no outcome
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Encode a message for transport
pub fn encode<T: Serialize>(message: &T) -> Result<String, DeliveryError> {
    serde_json::to_string(message).map_err(|e| DeliveryError::Serialization {
        message: e.to_string(),
    })
}

/// Decode a message received from transport
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, DeliveryError> {
    serde_json::from_str(raw).map_err(|e| DeliveryError::Serialization {
        message: e.to_string(),
    })
}

/// Encode then decode, as a context boundary does
pub fn transfer<T: Serialize + DeserializeOwned>(message: &T) -> Result<T, DeliveryError> {
    decode(&encode(message)?)
}
