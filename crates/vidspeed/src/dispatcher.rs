//! Command dispatcher (background context)
//!
//! Turns keyboard-shortcut activations into `speed-control` requests for
//! the focused tab. When the tab has no controller yet, the dispatcher
//! injects one, waits a grace period and retries exactly once. It also
//! relays controller reports, which it only logs.

use crate::config::ExtensionConfig;
use crate::error::DeliveryError;
use crate::host::{ExtensionHost, TabId};
use crate::message::{self, Request, Response, StatusReport, StepCommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, error, info, warn};

/// What happened to one shortcut activation
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// First delivery reached the controller
    Delivered(Response),
    /// Delivered by the single retry after injection
    DeliveredAfterInjection(Response),
    /// Gave up; the failure was logged
    Failed(DeliveryError),
    /// No tab is focused
    NoActiveTab,
    /// The shortcut name maps to no command
    UnknownShortcut(String),
}

impl DispatchOutcome {
    /// Response from the controller, if one was reached
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        match self {
            Self::Delivered(r) | Self::DeliveredAfterInjection(r) => Some(r),
            _ => None,
        }
    }
}

/// Background command dispatcher
#[derive(Debug)]
pub struct CommandDispatcher<H: ExtensionHost> {
    host: Arc<H>,
    grace: Duration,
}

impl<H: ExtensionHost> Clone for CommandDispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            grace: self.grace,
        }
    }
}

impl<H: ExtensionHost> CommandDispatcher<H> {
    /// Dispatcher using the grace period from `config`
    pub fn new(host: Arc<H>, config: &ExtensionConfig) -> Self {
        Self {
            host,
            grace: config.retry_grace(),
        }
    }

    /// Override the retry grace period
    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Host lifecycle: extension installed
    pub fn on_installed(&self) {
        info!("extension installed");
    }

    /// Host lifecycle: browser started with the extension enabled
    pub fn on_startup(&self) {
        info!("extension started");
    }

    /// Handle a shortcut activation by name
    pub async fn on_shortcut(&self, name: &str) -> DispatchOutcome {
        debug!(shortcut = name, "shortcut received");
        let command = match name.parse::<StepCommand>() {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "ignoring shortcut");
                return DispatchOutcome::UnknownShortcut(name.to_string());
            }
        };
        let Some(tab) = self.host.active_tab().await else {
            error!("no active tab for shortcut");
            return DispatchOutcome::NoActiveTab;
        };
        self.deliver(tab.id, Request::step(command)).await
    }

    /// Deliver with one injection-and-retry on failure
    pub async fn deliver(&self, tab: TabId, request: Request) -> DispatchOutcome {
        match self.host.send_to_tab(tab, request).await {
            Ok(response) => {
                debug!(tab, "message delivered");
                return DispatchOutcome::Delivered(response);
            }
            Err(e) => info!(tab, error = %e, "controller not loaded, injecting"),
        }

        if let Err(e) = self.host.inject_controller(tab).await {
            error!(tab, error = %e, "controller injection failed");
            return DispatchOutcome::Failed(e);
        }
        debug!(tab, grace_ms = self.grace.as_millis() as u64, "waiting for controller");
        tokio::time::sleep(self.grace).await;

        match self.host.send_to_tab(tab, request).await {
            Ok(response) => {
                info!(tab, "message delivered after injection");
                DispatchOutcome::DeliveredAfterInjection(response)
            }
            Err(e) => {
                error!(tab, error = %e, "retry delivery failed");
                DispatchOutcome::Failed(e)
            }
        }
    }

    /// Runtime message addressed to the background context
    pub fn handle_message(&self, raw: &str) -> Response {
        match message::decode::<StatusReport>(raw) {
            Ok(report) => self.handle_report(&report),
            Err(_) => {
                let action = serde_json::from_str::<serde_json::Value>(raw)
                    .ok()
                    .and_then(|v| v.get("action").and_then(|a| a.as_str()).map(str::to_string));
                debug!(action = action.as_deref().unwrap_or("<none>"), "unknown message type");
            }
        }
        Response::ack()
    }

    /// Log one report
    pub fn handle_report(&self, report: &StatusReport) {
        match report {
            StatusReport::SpeedChanged { speed } => info!(speed, "playback speed changed"),
            StatusReport::VideoDetected { speed, paused, .. } => {
                debug!(speed, paused, "video detected");
            }
            StatusReport::VideoNotFound => warn!("video element not found"),
        }
    }

    /// Relay reports already queued on `reports`; returns how many
    pub fn relay_pending(&self, reports: &mut broadcast::Receiver<StatusReport>) -> usize {
        let mut relayed = 0;
        loop {
            match reports.try_recv() {
                Ok(report) => {
                    self.handle_report(&report);
                    relayed += 1;
                }
                Err(TryRecvError::Lagged(missed)) => warn!(missed, "report relay lagged"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return relayed,
            }
        }
    }

    /// Relay reports until the host closes the channel; returns how many
    pub async fn relay_reports(&self, mut reports: broadcast::Receiver<StatusReport>) -> usize {
        let mut relayed = 0;
        loop {
            match reports.recv().await {
                Ok(report) => {
                    self.handle_report(&report);
                    relayed += 1;
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "report relay lagged"),
                Err(RecvError::Closed) => return relayed,
            }
        }
    }
}
