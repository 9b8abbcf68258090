//! Vidspeed: per-page video playback-rate control
//!
//! Three contexts cooperate through short-lived, fire-and-forget messages:
//! a [`CommandDispatcher`] turning keyboard shortcuts into commands, one
//! [`SpeedController`] per page owning that page's speed state, and a
//! [`ControlPanel`] acting as a second command source and status display.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    VIDSPEED Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐                        ┌────────────┐          │
//! │   │ Command    │──── speed-control ────►│ Speed      │          │
//! │   │ Dispatcher │     (inject + retry)   │ Controller │──► media │
//! │   └────────────┘                        │ (per page) │          │
//! │         ▲              ┌────────────┐   └────────────┘          │
//! │         │              │ Control    │──────►  │                 │
//! │         │              │ Panel      │ set-speed / check-video   │
//! │         │              └────────────┘         │                 │
//! │         │                    ▲                │                 │
//! │         └──── StatusReport ──┴──── broadcast ─┘                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Contexts share no memory. Every message crosses an [`ExtensionHost`]
//! boundary as JSON, and delivery to a tab without a controller fails at
//! once.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod advisory;
mod census;
mod config;
mod controller;
mod dispatcher;
mod error;
mod panel;
mod settings;
mod site;
mod speed;

/// Message contract between the contexts
pub mod message;

/// Extension host abstraction and the simulated browser
pub mod host;

/// Media pages and elements
///
/// The simulated page backs tests and the CLI; the `wasm` feature adds
/// bindings to a real document.
pub mod page;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use advisory::{
    Advisory, AdvisoryPhase, Notifier, DEFAULT_ADVISORY_FADE, DEFAULT_ADVISORY_TTL,
};
pub use census::MediaCensus;
pub use config::{ExtensionConfig, DEFAULT_PRESETS, DEFAULT_SUPPORTED_SITES};
pub use controller::{ControllerState, Diagnostics, SpeedController};
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use error::{DeliveryError, MediaError, SettingsError, VidspeedError, VidspeedResult};
pub use host::{
    forward_reports, ExtensionHost, ReportSink, SimulatedBrowser, TabId, TabInfo, TabSpec,
};
pub use message::{
    Command, MediaSnapshot, Outcome, Request, Response, StatusReport, StepCommand,
    UnknownCommand,
};
pub use page::{locate_media, MediaElement, MediaPage, SimulatedMedia, SimulatedPage};
pub use panel::{ControlPanel, InlineError, PanelView, VideoStatus};
pub use settings::{FileStore, MemoryStore, SettingKey, SettingValue, Settings, SettingsStore};
pub use site::{SiteCatalog, SiteStatus};
pub use speed::{format_speed, Limit, SpeedLadder, NORMAL_INDEX, SPEED_LEVELS};

#[cfg(feature = "wasm")]
pub use page::{ContentScript, WebMedia, WebPage};

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        CommandDispatcher, ControlPanel, ExtensionConfig, ExtensionHost, MediaElement, MediaPage,
        Request, Response, SettingsStore, SimulatedBrowser, SimulatedMedia, SimulatedPage,
        SpeedController, StatusReport, StepCommand, TabSpec, VidspeedError, VidspeedResult,
    };
}
