//! Scripted sessions against the simulated browser
//!
//! One tab, one dispatcher and one open panel. Each step is parsed up
//! front so a typo fails before anything runs.

use crate::commands::SimulateArgs;
use crate::error::{CliError, CliResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vidspeed::{
    format_speed, CommandDispatcher, ControlPanel, ControllerState, Diagnostics, DispatchOutcome,
    ExtensionConfig, ExtensionHost, MediaElement, Outcome, Response, SettingsStore,
    SimulatedBrowser, SimulatedMedia, SimulatedPage, StepCommand, TabId, TabSpec,
};

/// One scripted action
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Fire a keyboard shortcut by name
    Shortcut(String),
    /// Press a panel button
    Panel(StepCommand),
    /// Click a panel preset
    Preset(f64),
    /// Refresh the panel status
    Check,
    /// Append a media element
    AddMedia {
        /// Start it playing
        playing: bool,
    },
    /// Remove the n-th media element
    RemoveMedia(usize),
    /// Let time pass
    Wait(Duration),
}

impl FromStr for Step {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CliError::invalid_argument(format!("unknown step '{s}'"));
        if let Ok(command) = s.parse::<StepCommand>() {
            return Ok(Self::Shortcut(command.name().to_string()));
        }
        let (kind, arg) = s.split_once(':').unwrap_or((s, ""));
        match (kind, arg) {
            ("shortcut", name) if !name.is_empty() => Ok(Self::Shortcut(name.to_string())),
            ("panel", command) => command.parse().map(Self::Panel).map_err(|_| invalid()),
            ("preset", speed) => speed
                .trim_end_matches('x')
                .parse()
                .map(Self::Preset)
                .map_err(|_| invalid()),
            ("check", "") => Ok(Self::Check),
            ("add-media", "") => Ok(Self::AddMedia { playing: false }),
            ("add-media", "playing") => Ok(Self::AddMedia { playing: true }),
            ("remove-media", index) => index.parse().map(Self::RemoveMedia).map_err(|_| invalid()),
            ("wait", ms) => ms
                .parse()
                .map(|ms| Self::Wait(Duration::from_millis(ms)))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shortcut(name) => write!(f, "shortcut {name}"),
            Self::Panel(command) => write!(f, "panel {command}"),
            Self::Preset(speed) => write!(f, "preset {}", format_speed(*speed)),
            Self::Check => f.write_str("check"),
            Self::AddMedia { playing: true } => f.write_str("add playing media"),
            Self::AddMedia { playing: false } => f.write_str("add media"),
            Self::RemoveMedia(index) => write!(f, "remove media {index}"),
            Self::Wait(d) => write!(f, "wait {}ms", d.as_millis()),
        }
    }
}

/// Parse every step, failing on the first bad one
pub fn parse_steps(raw: &[String]) -> CliResult<Vec<Step>> {
    raw.iter().map(|s| s.parse()).collect()
}

/// What one step did
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// The step as written
    pub step: String,
    /// Short description of the result
    pub result: String,
}

/// Final state of the session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    /// Per-step results
    pub steps: Vec<StepRecord>,
    /// Controller state, if one runs in the tab
    pub controller: Option<ControllerState>,
    /// Rate of the first media element
    pub media_rate: Option<f64>,
    /// Speed shown by the panel
    pub panel_speed: String,
    /// Site label shown by the panel
    pub panel_site: String,
    /// Video label shown by the panel
    pub panel_video: String,
    /// Panel errors still visible
    pub panel_errors: Vec<String>,
    /// Controller diagnostics
    pub diagnostics: Option<Diagnostics>,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, record) in self.steps.iter().enumerate() {
            writeln!(f, "{:>3}. {:<24} {}", i + 1, record.step, record.result)?;
        }
        writeln!(f)?;
        match &self.controller {
            Some(state) => writeln!(
                f,
                "controller: {} (ladder index {})",
                format_speed(state.current_speed),
                state.current_index
            )?,
            None => writeln!(f, "controller: not loaded")?,
        }
        match self.media_rate {
            Some(rate) => writeln!(f, "media:      {}", format_speed(rate))?,
            None => writeln!(f, "media:      none")?,
        }
        writeln!(
            f,
            "panel:      {} | {} | {}",
            self.panel_speed, self.panel_site, self.panel_video
        )?;
        for error in &self.panel_errors {
            writeln!(f, "panel error: {error}")?;
        }
        Ok(())
    }
}

/// Build the simulated tab described by `args`
pub fn build_tab(args: &SimulateArgs) -> TabSpec {
    let page = SimulatedPage::new(args.url.clone());
    for _ in 0..args.media {
        page.add_media(if args.playing {
            SimulatedMedia::playing_at(1.0)
        } else {
            SimulatedMedia::paused_at(0.0)
        });
    }
    let spec = TabSpec::new(page);
    if args.unscriptable {
        spec.unscriptable()
    } else if args.no_controller {
        spec.without_controller()
    } else {
        spec
    }
}

/// Run `steps` in a fresh simulated browser
pub async fn run<S: SettingsStore>(
    config: ExtensionConfig,
    tab: TabSpec,
    store: Arc<S>,
    steps: &[Step],
) -> CliResult<SessionReport> {
    let browser = Arc::new(SimulatedBrowser::with_config(config.clone()));
    let tab_id = browser.open_tab(tab);
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &config);
    dispatcher.on_startup();
    let mut relay = browser.subscribe_reports();
    let mut panel = ControlPanel::open(Arc::clone(&browser), store, &config).await;

    let mut records = Vec::with_capacity(steps.len());
    for step in steps {
        info!(%step, "running step");
        let result = match step {
            Step::Shortcut(name) => describe_dispatch(&dispatcher.on_shortcut(name).await),
            Step::Panel(command) => describe_delivery(panel.send_command(*command).await),
            Step::Preset(speed) => describe_delivery(panel.send_preset_speed(*speed).await),
            Step::Check => {
                panel.refresh_status().await;
                format!("{} | {}", panel.view().site, panel.view().video.label())
            }
            Step::AddMedia { playing } => {
                let media = if *playing {
                    SimulatedMedia::playing_at(1.0)
                } else {
                    SimulatedMedia::paused_at(0.0)
                };
                mutate(&browser, tab_id, |page| {
                    page.add_media(media);
                    format!("{} media in page", page.media_count())
                })?
            }
            Step::RemoveMedia(index) => mutate(&browser, tab_id, |page| {
                match page.remove_media(*index) {
                    Some(_) => format!("{} media in page", page.media_count()),
                    None => format!("no media at {index}"),
                }
            })?,
            Step::Wait(duration) => {
                tokio::time::sleep(*duration).await;
                "ok".to_string()
            }
        };
        panel.pump_reports().await;
        dispatcher.relay_pending(&mut relay);
        records.push(StepRecord {
            step: step.to_string(),
            result,
        });
    }

    let view = panel.view();
    let report = SessionReport {
        steps: records,
        controller: browser.controller_state(tab_id),
        media_rate: browser
            .page(tab_id)
            .and_then(|page| page.media(0))
            .map(|media| media.playback_rate()),
        panel_speed: view.speed_label(),
        panel_site: view.site.to_string(),
        panel_video: view.video.label().to_string(),
        panel_errors: view.visible_errors(),
        diagnostics: browser.diagnose(tab_id),
    };
    panel.close();
    Ok(report)
}

fn mutate<F>(browser: &SimulatedBrowser, tab: TabId, change: F) -> CliResult<String>
where
    F: FnOnce(&SimulatedPage) -> String,
{
    let mut result = None;
    let found = browser.mutate_page(tab, |page| result = Some(change(page)));
    match result {
        Some(result) if found => Ok(result),
        _ => Err(CliError::session(format!("tab {tab} is gone"))),
    }
}

fn describe_dispatch(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Delivered(response) => describe_response(response),
        DispatchOutcome::DeliveredAfterInjection(response) => {
            format!("injected, then {}", describe_response(response))
        }
        DispatchOutcome::Failed(e) => format!("failed: {e}"),
        DispatchOutcome::NoActiveTab => "no active tab".to_string(),
        DispatchOutcome::UnknownShortcut(name) => format!("ignored unknown shortcut {name}"),
    }
}

fn describe_delivery(result: Result<Response, vidspeed::DeliveryError>) -> String {
    match result {
        Ok(response) => describe_response(&response),
        Err(e) => format!("not delivered: {e}"),
    }
}

fn describe_response(response: &Response) -> String {
    match &response.outcome {
        Some(Outcome::Applied { speed }) => format!("applied {}", format_speed(*speed)),
        Some(Outcome::LimitReached { limit }) => limit.notice().to_string(),
        Some(Outcome::Detected(snapshot)) => {
            format!("video at {}", format_speed(snapshot.speed))
        }
        Some(Outcome::NoMedia) => "video not found".to_string(),
        Some(Outcome::ApplyFailed { reason }) => format!("apply failed: {reason}"),
        None if response.success => "ok".to_string(),
        None => response.error.clone().unwrap_or_else(|| "failed".to_string()),
    }
}
