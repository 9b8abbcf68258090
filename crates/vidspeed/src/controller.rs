//! Per-page speed controller
//!
//! One controller exists per page lifecycle. It owns the ladder position
//! and the last applied multiplier, picks the media element a command acts
//! on, applies the rate and reports what happened.
//!
//! ```text
//!  Request ──► handle_request ──► apply_command ──► apply_rate ──► element
//!                    │                  │
//!                    ▼                  ├──► advisory (page)
//!                 Response              └──► StatusReport (ReportSink)
//! ```

use crate::advisory::{Advisory, Notifier};
use crate::census::MediaCensus;
use crate::host::ReportSink;
use crate::message::{self, Command, MediaSnapshot, Outcome, Request, Response, StatusReport};
use crate::page::{self, MediaElement, MediaPage};
use crate::speed::{format_speed, Limit, SpeedLadder};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Playback state owned by one controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerState {
    /// Position in the speed ladder
    pub current_index: usize,
    /// Last multiplier successfully applied
    pub current_speed: f64,
}

impl ControllerState {
    /// Initial state: the normal step of `ladder`
    #[must_use]
    pub fn initial(ladder: &SpeedLadder) -> Self {
        Self {
            current_index: ladder.normal_index(),
            current_speed: ladder.normal_speed(),
        }
    }
}

/// Snapshot of a controller and its page for troubleshooting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Media elements currently in the page
    pub media_count: usize,
    /// State of the first element, if any
    pub first_media: Option<MediaSnapshot>,
    /// Controller state
    pub state: ControllerState,
    /// Whether the speed still matches the ladder position
    pub index_in_sync: bool,
    /// Advisories issued since the controller started
    pub advisories_issued: u64,
}

/// Speed controller for one page
#[derive(Debug)]
pub struct SpeedController<P: MediaPage> {
    page: P,
    ladder: SpeedLadder,
    state: ControllerState,
    notifier: Notifier,
    census: MediaCensus,
    reports: ReportSink,
}

impl<P: MediaPage> SpeedController<P> {
    /// Start a controller for `page`, sending reports to `reports`
    pub fn new(page: P, reports: ReportSink) -> Self {
        let ladder = SpeedLadder::standard();
        let mut controller = Self {
            page,
            state: ControllerState::initial(&ladder),
            ladder,
            notifier: Notifier::default(),
            census: MediaCensus::default(),
            reports,
        };
        controller.on_mutation();
        info!("speed controller initialized");
        controller
    }

    /// Replace the advisory notifier
    #[must_use]
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Last applied multiplier
    #[must_use]
    pub const fn current_speed(&self) -> f64 {
        self.state.current_speed
    }

    /// Ladder position
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.state.current_index
    }

    /// The page this controller serves
    #[must_use]
    pub const fn page(&self) -> &P {
        &self.page
    }

    /// Media census
    #[must_use]
    pub const fn census(&self) -> &MediaCensus {
        &self.census
    }

    /// Advisory still visible right now
    #[must_use]
    pub fn current_advisory(&self) -> Option<&Advisory> {
        self.notifier.current_at(Instant::now())
    }

    /// Structural change in the page: recount media elements
    pub fn on_mutation(&mut self) {
        let count = self.page.media_elements().len();
        self.census.observe(count);
    }

    /// The element commands act on right now
    pub fn locate_media(&self) -> Option<P::Element> {
        page::locate_media(&self.page)
    }

    /// Answer a decoded request
    pub fn handle_request(&mut self, request: Request) -> Response {
        debug!(action = request.action(), "controller received request");
        let outcome = self.apply_command(request.command());
        let success = outcome.is_success();
        let error = match &outcome {
            Outcome::NoMedia => Some("Video not found".to_string()),
            Outcome::ApplyFailed { reason } => Some(reason.clone()),
            _ => None,
        };

        match request {
            Request::CheckVideo => {
                let speed = match &outcome {
                    Outcome::Detected(snapshot) => Some(snapshot.speed),
                    _ => None,
                };
                Response {
                    success: true,
                    speed,
                    has_video: Some(speed.is_some()),
                    error: None,
                    outcome: Some(outcome),
                }
            }
            Request::SetSpeed { speed } => Response {
                success,
                speed: success.then_some(speed),
                has_video: None,
                error,
                outcome: Some(outcome),
            },
            Request::SpeedControl { .. } => Response {
                success,
                speed: match &outcome {
                    Outcome::Applied { speed } => Some(*speed),
                    _ => None,
                },
                has_video: None,
                error,
                outcome: Some(outcome),
            },
        }
    }

    /// Answer a request as it arrives over the wire
    pub fn handle_message(&mut self, raw: &str) -> Response {
        match message::decode::<Request>(raw) {
            Ok(request) => self.handle_request(request),
            Err(e) => {
                warn!(error = %e, "unknown command");
                Response::failure(e.to_string())
            }
        }
    }

    /// Run one command against the page
    pub fn apply_command(&mut self, command: Command) -> Outcome {
        self.on_mutation();
        let Some(media) = self.locate_media() else {
            warn!("no media element found");
            self.reports.emit(StatusReport::VideoNotFound);
            return Outcome::NoMedia;
        };

        match command {
            Command::SpeedUp => match self.ladder.step_up(self.state.current_index) {
                Ok(next) => self.step_to(&media, next),
                Err(limit) => self.limit_reached(limit),
            },
            Command::SpeedDown => match self.ladder.step_down(self.state.current_index) {
                Ok(next) => self.step_to(&media, next),
                Err(limit) => self.limit_reached(limit),
            },
            Command::SpeedReset => self.step_to(&media, self.ladder.normal_index()),
            // The ladder position is left where it was.
            Command::SetSpeed(speed) => self.apply_rate(&media, speed),
            Command::CheckVideo => {
                let snapshot = media.snapshot();
                self.reports.emit(snapshot.into());
                Outcome::Detected(snapshot)
            }
        }
    }

    /// Apply `speed` to `media`; failures are logged and reported in the outcome
    pub fn apply_rate(&mut self, media: &P::Element, speed: f64) -> Outcome {
        if let Err(e) = media.set_playback_rate(speed) {
            error!(error = %e, speed, "failed to set playback speed");
            return Outcome::ApplyFailed {
                reason: e.to_string(),
            };
        }
        self.state.current_speed = speed;
        info!(speed, "playback speed set");
        self.advise(format!("Playback speed: {}", format_speed(speed)));
        self.reports.emit(StatusReport::SpeedChanged { speed });
        Outcome::Applied { speed }
    }

    /// Collect troubleshooting information
    pub fn diagnose(&self) -> Diagnostics {
        let elements = self.page.media_elements();
        Diagnostics {
            media_count: elements.len(),
            first_media: elements.first().map(MediaElement::snapshot),
            state: self.state,
            index_in_sync: self.ladder.get(self.state.current_index)
                == Some(self.state.current_speed),
            advisories_issued: self.notifier.issued(),
        }
    }

    fn step_to(&mut self, media: &P::Element, index: usize) -> Outcome {
        let Some(speed) = self.ladder.get(index) else {
            return Outcome::ApplyFailed {
                reason: format!("ladder index {index} out of range"),
            };
        };
        let outcome = self.apply_rate(media, speed);
        if matches!(outcome, Outcome::Applied { .. }) {
            self.state.current_index = index;
        }
        outcome
    }

    fn limit_reached(&mut self, limit: Limit) -> Outcome {
        warn!(?limit, "playback speed limit reached");
        self.advise(limit.notice());
        Outcome::LimitReached { limit }
    }

    fn advise(&mut self, text: impl Into<String>) {
        if let Some(advisory) = self.notifier.show(text) {
            self.page.render_advisory(advisory);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::message::StepCommand;
    use crate::page::{SimulatedMedia, SimulatedPage};
    use tokio::sync::broadcast;

    fn page_with_video() -> (SimulatedPage, SimulatedMedia) {
        let page = SimulatedPage::new("https://www.youtube.com/watch?v=abc");
        let media = page.add_media(SimulatedMedia::paused_at(0.0));
        (page, media)
    }

    #[test]
    fn test_initial_state() {
        let (page, _) = page_with_video();
        let controller = SpeedController::new(page, ReportSink::default());
        assert_eq!(controller.current_index(), 3);
        assert_eq!(controller.current_speed(), 1.0);
        assert_eq!(controller.census().count(), 1);
    }

    #[test]
    fn test_speed_up_three_times() {
        let (page, media) = page_with_video();
        let mut controller = SpeedController::new(page, ReportSink::default());
        for _ in 0..3 {
            controller.apply_command(Command::SpeedUp);
        }
        assert_eq!(controller.current_speed(), 2.0);
        assert_eq!(controller.current_index(), 6);
        assert_eq!(media.playback_rate(), 2.0);
    }

    #[test]
    fn test_speed_up_at_top_emits_no_report() {
        let (page, _) = page_with_video();
        let (tx, mut rx) = broadcast::channel(32);
        let mut controller = SpeedController::new(page.clone(), ReportSink::new(tx));
        for _ in 0..6 {
            controller.apply_command(Command::SpeedUp);
        }
        while rx.try_recv().is_ok() {}

        let outcome = controller.apply_command(Command::SpeedUp);
        assert_eq!(outcome, Outcome::LimitReached { limit: Limit::Max });
        assert_eq!(controller.current_index(), 9);
        assert!(rx.try_recv().is_err());
        assert_eq!(
            page.visible_advisory().as_deref(),
            Some("Maximum playback speed reached")
        );
    }

    #[test]
    fn test_speed_down_at_bottom() {
        let (page, _) = page_with_video();
        let mut controller = SpeedController::new(page, ReportSink::default());
        for _ in 0..3 {
            controller.apply_command(Command::SpeedDown);
        }
        assert_eq!(controller.current_speed(), 0.25);
        let outcome = controller.apply_command(Command::SpeedDown);
        assert_eq!(outcome, Outcome::LimitReached { limit: Limit::Min });
        assert_eq!(controller.current_index(), 0);
    }

    #[test]
    fn test_no_media_reports_not_found() {
        let page = SimulatedPage::new("https://example.com/");
        let (tx, mut rx) = broadcast::channel(8);
        let mut controller = SpeedController::new(page, ReportSink::new(tx));

        let response = controller.handle_request(Request::step(StepCommand::SpeedReset));
        assert!(!response.success);
        assert_eq!(response.outcome, Some(Outcome::NoMedia));
        assert_eq!(rx.try_recv().unwrap(), StatusReport::VideoNotFound);
        assert_eq!(controller.current_speed(), 1.0);
    }

    #[test]
    fn test_set_speed_leaves_index() {
        let (page, media) = page_with_video();
        let mut controller = SpeedController::new(page, ReportSink::default());
        let response = controller.handle_request(Request::SetSpeed { speed: 1.1 });
        assert!(response.success);
        assert_eq!(response.speed, Some(1.1));
        assert_eq!(controller.current_speed(), 1.1);
        assert_eq!(controller.current_index(), 3);
        assert!(!controller.diagnose().index_in_sync);

        controller.apply_command(Command::SpeedUp);
        assert_eq!(media.playback_rate(), 1.25);
    }

    #[test]
    fn test_apply_failure_keeps_state() {
        let (page, media) = page_with_video();
        let (tx, mut rx) = broadcast::channel(8);
        let mut controller = SpeedController::new(page, ReportSink::new(tx));
        media.detach();

        let response = controller.handle_request(Request::step(StepCommand::SpeedUp));
        assert!(!response.success);
        assert!(matches!(response.outcome, Some(Outcome::ApplyFailed { .. })));
        assert_eq!(controller.current_index(), 3);
        assert_eq!(controller.current_speed(), 1.0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_set_speed_out_of_range_fails() {
        let (page, _) = page_with_video();
        let mut controller = SpeedController::new(page, ReportSink::default());
        let response = controller.handle_request(Request::SetSpeed { speed: -2.0 });
        assert!(!response.success);
        assert_eq!(response.speed, None);
        assert_eq!(controller.current_speed(), 1.0);
    }

    #[test]
    fn test_check_video_reports_snapshot() {
        let (page, media) = page_with_video();
        media.set_playback_rate(1.5).unwrap();
        let (tx, mut rx) = broadcast::channel(8);
        let mut controller = SpeedController::new(page, ReportSink::new(tx));

        let response = controller.handle_request(Request::CheckVideo);
        assert!(response.success);
        assert_eq!(response.has_video, Some(true));
        assert_eq!(response.speed, Some(1.5));
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusReport::VideoDetected {
                speed: 1.5,
                paused: true,
                current_time: 0.0
            }
        );
    }

    #[test]
    fn test_check_video_without_media() {
        let page = SimulatedPage::new("https://example.com/");
        let mut controller = SpeedController::new(page, ReportSink::default());
        let response = controller.handle_request(Request::CheckVideo);
        assert!(response.success);
        assert_eq!(response.has_video, Some(false));
    }

    #[test]
    fn test_malformed_message() {
        let (page, _) = page_with_video();
        let mut controller = SpeedController::new(page, ReportSink::default());
        let response = controller.handle_message(r#"{"action":"speed-control","command":"warp"}"#);
        assert!(!response.success);
        assert!(response.error.is_some());
    }

    #[test]
    fn test_advisories_can_be_disabled() {
        let (page, _) = page_with_video();
        let mut controller = SpeedController::new(page.clone(), ReportSink::default())
            .with_notifier(Notifier::default().with_enabled(false));
        controller.apply_command(Command::SpeedUp);
        assert_eq!(page.advisories_rendered(), 0);
        assert!(controller.current_advisory().is_none());
    }

    #[test]
    fn test_diagnose() {
        let (page, _) = page_with_video();
        let mut controller = SpeedController::new(page, ReportSink::default());
        controller.apply_command(Command::SpeedUp);
        let diag = controller.diagnose();
        assert_eq!(diag.media_count, 1);
        assert_eq!(diag.first_media.unwrap().speed, 1.25);
        assert!(diag.index_in_sync);
        assert_eq!(diag.advisories_issued, 1);
    }
}
