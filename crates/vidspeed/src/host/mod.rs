//! Extension host: tabs, messaging and script injection
//!
//! The dispatcher and the panel reach page controllers only through
//! [`ExtensionHost`]. Delivery to a tab without a controller fails at
//! once; nothing is queued.

mod simulated;

pub use simulated::{SimulatedBrowser, TabSpec};

use crate::error::DeliveryError;
use crate::message::{self, Request, Response, StatusReport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, warn};

/// Host-assigned tab identifier
pub type TabId = u32;

/// What the host tells a caller about a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    /// Tab id
    pub id: TabId,
    /// Current page URL
    pub url: String,
}

/// Messaging surface of the browser extension host
#[async_trait]
pub trait ExtensionHost: Send + Sync {
    /// The focused tab of the current window
    async fn active_tab(&self) -> Option<TabInfo>;

    /// Deliver `request` to the controller of `tab` and wait for its answer
    async fn send_to_tab(&self, tab: TabId, request: Request) -> Result<Response, DeliveryError>;

    /// Inject the controller script into `tab`
    async fn inject_controller(&self, tab: TabId) -> Result<(), DeliveryError>;

    /// Listen for reports emitted by controllers from now on
    fn subscribe_reports(&self) -> broadcast::Receiver<StatusReport>;
}

/// Outbound report channel of one controller
///
/// Reports are fire-and-forget: a report with no listener is dropped. The
/// default sink has no channel at all.
#[derive(Debug, Clone, Default)]
pub struct ReportSink {
    sender: Option<broadcast::Sender<StatusReport>>,
}

impl ReportSink {
    /// Sink feeding `sender`
    #[must_use]
    pub const fn new(sender: broadcast::Sender<StatusReport>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Send a report to whoever listens
    pub fn emit(&self, report: StatusReport) {
        let Some(sender) = &self.sender else {
            debug!(action = report.action(), "report sink detached");
            return;
        };
        let report = match message::transfer(&report) {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "failed to send report");
                return;
            }
        };
        if sender.send(report).is_err() {
            debug!(action = report.action(), "no listener for report");
        }
    }
}

/// Hand every queued report to `forward` as a JSON message
///
/// Returns how many reports were forwarded. Used where reports leave the
/// process, such as a content script posting to the extension runtime.
pub fn forward_reports(
    reports: &mut broadcast::Receiver<StatusReport>,
    mut forward: impl FnMut(&str),
) -> usize {
    let mut forwarded = 0;
    loop {
        match reports.try_recv() {
            Ok(report) => match message::encode(&report) {
                Ok(json) => {
                    forward(&json);
                    forwarded += 1;
                }
                Err(e) => error!(action = report.action(), error = %e, "failed to encode report"),
            },
            Err(TryRecvError::Lagged(missed)) => warn!(missed, "reports dropped before forwarding"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return forwarded,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_delivers_to_subscribers() {
        let (tx, mut rx) = broadcast::channel(8);
        let sink = ReportSink::new(tx);
        sink.emit(StatusReport::SpeedChanged { speed: 1.25 });
        assert_eq!(rx.try_recv().unwrap(), StatusReport::SpeedChanged { speed: 1.25 });
    }

    #[test]
    fn test_sink_without_listener_drops() {
        let (tx, rx) = broadcast::channel::<StatusReport>(8);
        drop(rx);
        let sink = ReportSink::new(tx);
        sink.emit(StatusReport::VideoNotFound);
        ReportSink::default().emit(StatusReport::VideoNotFound);
    }

    #[test]
    fn test_forward_reports_encodes_in_order() {
        let (tx, mut rx) = broadcast::channel(8);
        let sink = ReportSink::new(tx);
        sink.emit(StatusReport::SpeedChanged { speed: 1.5 });
        sink.emit(StatusReport::VideoNotFound);

        let mut posted = Vec::new();
        let count = forward_reports(&mut rx, |json| posted.push(json.to_string()));

        assert_eq!(count, 2);
        let decoded: Vec<StatusReport> = posted.iter().map(|raw| message::decode(raw).unwrap()).collect();
        assert_eq!(
            decoded,
            vec![StatusReport::SpeedChanged { speed: 1.5 }, StatusReport::VideoNotFound]
        );
        assert!(posted[0].contains("speed-changed"));
        assert_eq!(forward_reports(&mut rx, |_| panic!("nothing queued")), 0);
    }

    #[test]
    fn test_forward_reports_after_sender_closed() {
        let (tx, mut rx) = broadcast::channel(8);
        ReportSink::new(tx.clone()).emit(StatusReport::VideoNotFound);
        drop(tx);
        let mut posted = 0;
        assert_eq!(forward_reports(&mut rx, |_| posted += 1), 1);
        assert_eq!(posted, 1);
    }
}
