//! Control panel (popup context)
//!
//! A second command source next to the keyboard shortcuts, plus a status
//! display. The panel never injects a controller and never retries; a
//! failed delivery becomes an inline error that expires on its own.
//! Reports reach the panel only while it is open.

use crate::config::ExtensionConfig;
use crate::error::DeliveryError;
use crate::host::ExtensionHost;
use crate::message::{Outcome, Request, Response, StatusReport, StepCommand};
use crate::settings::{SettingKey, SettingValue, Settings, SettingsStore};
use crate::site::{SiteCatalog, SiteStatus};
use crate::speed::format_speed;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const COMMAND_FAILED: &str = "Unable to control playback speed; make sure the page has a video";
const PRESET_FAILED: &str = "Unable to set playback speed";

const FEEDBACK_TEXT: &str = "\
Feedback & suggestions

If you run into a problem or have an idea for an improvement, reach us through:
  - the project issue tracker
  - email
  - a review in the extension store

Thanks for using the extension!";

/// What the panel knows about media in the active tab
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoStatus {
    /// No answer yet
    Unknown,
    /// A media element was found
    Detected {
        /// Its rate at detection time
        speed: f64,
        /// Whether it was paused
        paused: bool,
    },
    /// The page has no media element
    NotFound,
}

impl VideoStatus {
    /// Label shown in the panel
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "Checking...",
            Self::Detected { .. } => "Video detected",
            Self::NotFound => "No video found",
        }
    }
}

/// Dismissible error banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineError {
    /// Message shown
    pub message: String,
    /// When it appeared
    pub shown_at: Instant,
    /// How long it stays
    pub ttl: Duration,
}

impl InlineError {
    /// Whether the banner is still shown at `now`
    #[must_use]
    pub fn is_present_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) < self.ttl
    }
}

/// Everything the panel displays
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    /// Displayed speed
    pub speed: f64,
    /// Highlighted preset button
    pub active_preset: Option<f64>,
    /// Site classification of the active tab
    pub site: SiteStatus,
    /// Media status of the active tab
    pub video: VideoStatus,
    /// Settings checkboxes
    pub settings: Settings,
    errors: Vec<InlineError>,
}

impl PanelView {
    fn new() -> Self {
        Self {
            speed: 1.0,
            active_preset: None,
            site: SiteStatus::Unavailable,
            video: VideoStatus::Unknown,
            settings: Settings::default(),
            errors: Vec::new(),
        }
    }

    /// Displayed speed label, e.g. `1.5x`
    #[must_use]
    pub fn speed_label(&self) -> String {
        format_speed(self.speed)
    }

    /// Error banners still shown at `now`
    pub fn errors_at(&self, now: Instant) -> impl Iterator<Item = &InlineError> {
        self.errors.iter().filter(move |e| e.is_present_at(now))
    }

    /// Error banners shown right now
    #[must_use]
    pub fn visible_errors(&self) -> Vec<String> {
        self.errors_at(Instant::now()).map(|e| e.message.clone()).collect()
    }
}

/// The popup: command buttons, presets, status and settings
#[derive(Debug)]
pub struct ControlPanel<H: ExtensionHost, S: SettingsStore> {
    host: Arc<H>,
    store: Arc<S>,
    presets: Vec<f64>,
    catalog: SiteCatalog,
    error_ttl: Duration,
    reports: Option<broadcast::Receiver<StatusReport>>,
    view: PanelView,
}

impl<H: ExtensionHost, S: SettingsStore> ControlPanel<H, S> {
    /// Open the panel: subscribe, load settings, refresh status
    pub async fn open(host: Arc<H>, store: Arc<S>, config: &ExtensionConfig) -> Self {
        let reports = Some(host.subscribe_reports());
        let mut panel = Self {
            host,
            store,
            presets: config.presets.clone(),
            catalog: SiteCatalog::new(config.supported_sites.iter().cloned()),
            error_ttl: config.panel_error_ttl(),
            reports,
            view: PanelView::new(),
        };
        info!("control panel opened");
        panel.load_settings().await;
        panel.refresh_status().await;
        panel
    }

    /// Current display
    #[must_use]
    pub const fn view(&self) -> &PanelView {
        &self.view
    }

    /// Preset buttons
    #[must_use]
    pub fn presets(&self) -> &[f64] {
        &self.presets
    }

    /// Whether the panel still listens for reports
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.reports.is_some()
    }

    /// Close the panel; later reports are never seen
    pub fn close(&mut self) {
        if self.reports.take().is_some() {
            info!("control panel closed");
        }
    }

    /// Forward a step command to the active tab
    pub async fn send_command(&mut self, command: StepCommand) -> Result<Response, DeliveryError> {
        let response = self.send(Request::step(command), COMMAND_FAILED).await?;
        debug!(%command, success = response.success, "command sent");
        self.pump_reports().await;
        Ok(response)
    }

    /// Apply a preset speed to the active tab
    pub async fn send_preset_speed(&mut self, speed: f64) -> Result<Response, DeliveryError> {
        let response = self.send(Request::SetSpeed { speed }, PRESET_FAILED).await?;
        self.pump_reports().await;
        if response.success {
            // The speed-changed report usually got here first
            if self.view.speed != speed {
                self.display_speed(speed).await;
            }
            info!(speed, "preset applied");
        }
        Ok(response)
    }

    /// Classify the active site and ask its controller for media
    pub async fn refresh_status(&mut self) {
        let Some(tab) = self.host.active_tab().await else {
            self.view.site = SiteStatus::Unavailable;
            return;
        };
        self.view.site = self.catalog.classify(&tab.url);
        debug!(tab = tab.id, site = %self.view.site, "site classified");
        if self.view.site == SiteStatus::DetectionFailed {
            return;
        }

        match self.host.send_to_tab(tab.id, Request::CheckVideo).await {
            Ok(response) => {
                if let Some(Outcome::Detected(snapshot)) = &response.outcome {
                    self.view.video = VideoStatus::Detected {
                        speed: snapshot.speed,
                        paused: snapshot.paused,
                    };
                } else if response.has_video == Some(false) {
                    self.view.video = VideoStatus::NotFound;
                }
                self.pump_reports().await;
            }
            Err(e) => debug!(tab = tab.id, error = %e, "controller not ready"),
        }
    }

    /// Load persisted settings into the view
    pub async fn load_settings(&mut self) {
        match self.store.load().await {
            Ok(settings) => {
                self.view.settings = settings;
                if settings.remember_speed {
                    self.show_speed(settings.last_speed);
                }
            }
            Err(e) => error!(error = %e, "failed to load settings"),
        }
    }

    /// Persist one setting; failures are logged only
    pub async fn save_setting(&mut self, key: SettingKey, value: SettingValue) {
        if let Err(e) = self.view.settings.set(key, value) {
            warn!(error = %e, "rejected setting");
            return;
        }
        match self.store.save(key, value).await {
            Ok(()) => debug!(key = key.name(), %value, "setting saved"),
            Err(e) => error!(key = key.name(), error = %e, "failed to save setting"),
        }
    }

    /// React to one controller report
    pub async fn handle_report(&mut self, report: &StatusReport) {
        match report {
            StatusReport::SpeedChanged { speed } => self.display_speed(*speed).await,
            StatusReport::VideoDetected { speed, paused, .. } => {
                self.view.video = VideoStatus::Detected {
                    speed: *speed,
                    paused: *paused,
                };
            }
            StatusReport::VideoNotFound => self.view.video = VideoStatus::NotFound,
        }
    }

    /// Handle every report queued since the last pump
    pub async fn pump_reports(&mut self) -> usize {
        let mut queued = Vec::new();
        if let Some(reports) = self.reports.as_mut() {
            loop {
                match reports.try_recv() {
                    Ok(report) => queued.push(report),
                    Err(TryRecvError::Lagged(missed)) => warn!(missed, "panel missed reports"),
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
        }
        for report in &queued {
            self.handle_report(report).await;
        }
        queued.len()
    }

    /// Usage help shown from the panel footer
    #[must_use]
    pub fn help_text(&self) -> String {
        let mut text = String::from(
            "Video speed control help\n\n\
             Shortcuts:\n  Ctrl+Shift+Up      speed up\n  Ctrl+Shift+Down    slow down\n  Ctrl+Shift+R       reset speed\n\n\
             Manual control:\n  use the speed up / slow down buttons\n  use the preset buttons\n\n\
             Settings:\n  Show notifications: on-page speed notices\n  Remember speed: restore the last chosen speed\n\n\
             Supported sites:\n",
        );
        for site in self.catalog.sites() {
            text.push_str("  ");
            text.push_str(site);
            text.push('\n');
        }
        text.push_str("  any other page with HTML5 video\n");
        text
    }

    /// Feedback information shown from the panel footer
    #[must_use]
    pub const fn feedback_text() -> &'static str {
        FEEDBACK_TEXT
    }

    async fn send(&mut self, request: Request, failure: &str) -> Result<Response, DeliveryError> {
        let Some(tab) = self.host.active_tab().await else {
            error!(action = request.action(), "no active tab");
            return Err(DeliveryError::NoActiveTab);
        };
        match self.host.send_to_tab(tab.id, request).await {
            Ok(response) => {
                if let Some(Outcome::ApplyFailed { reason }) = &response.outcome {
                    error!(tab = tab.id, %reason, "controller could not apply speed");
                    self.show_error(format!("{PRESET_FAILED}: {reason}"));
                }
                Ok(response)
            }
            Err(e) => {
                error!(tab = tab.id, error = %e, "failed to reach controller");
                self.show_error(failure);
                Err(e)
            }
        }
    }

    async fn display_speed(&mut self, speed: f64) {
        self.show_speed(speed);
        if self.view.settings.remember_speed {
            self.save_setting(SettingKey::LastSpeed, SettingValue::Speed(speed))
                .await;
        }
    }

    fn show_speed(&mut self, speed: f64) {
        self.view.speed = speed;
        self.view.active_preset = self.presets.iter().copied().find(|p| *p == speed);
    }

    fn show_error(&mut self, message: impl Into<String>) {
        let now = Instant::now();
        self.view.errors.retain(|e| e.is_present_at(now));
        self.view.errors.push(InlineError {
            message: message.into(),
            shown_at: now,
            ttl: self.error_ttl,
        });
    }
}
