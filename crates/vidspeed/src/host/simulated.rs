//! In-process browser simulation
//!
//! Replaces the extension host's tab and messaging APIs with a
//! deterministic implementation. Every request and response is encoded to
//! JSON and decoded on the other side, as with real extension messaging.
//! Tabs can be configured to start without a controller, to refuse script
//! injection, or to accept injection that never brings a controller up.

use super::{ExtensionHost, ReportSink, TabId, TabInfo};
use crate::config::ExtensionConfig;
use crate::controller::{ControllerState, Diagnostics, SpeedController};
use crate::error::DeliveryError;
use crate::lock;
use crate::message::{self, Request, Response, StatusReport};
use crate::page::SimulatedPage;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the report broadcast channel
const REPORT_CHANNEL_CAPACITY: usize = 64;

/// How a simulated tab behaves
#[derive(Debug, Clone)]
pub struct TabSpec {
    page: SimulatedPage,
    content_script: bool,
    scriptable: bool,
    inert_injection: bool,
}

impl TabSpec {
    /// A tab showing `page` with the controller loaded at page start
    #[must_use]
    pub const fn new(page: SimulatedPage) -> Self {
        Self {
            page,
            content_script: true,
            scriptable: true,
            inert_injection: false,
        }
    }

    /// The page loaded before the extension, so no controller runs yet
    #[must_use]
    pub const fn without_controller(mut self) -> Self {
        self.content_script = false;
        self
    }

    /// The host refuses script injection (browser-internal pages)
    #[must_use]
    pub const fn unscriptable(mut self) -> Self {
        self.content_script = false;
        self.scriptable = false;
        self
    }

    /// Injection reports success but no controller comes up
    #[must_use]
    pub const fn with_inert_injection(mut self) -> Self {
        self.inert_injection = true;
        self
    }
}

#[derive(Debug)]
struct Tab {
    spec: TabSpec,
    controller: Option<SpeedController<SimulatedPage>>,
    deliveries: usize,
    injections: usize,
}

#[derive(Debug, Default)]
struct BrowserState {
    tabs: BTreeMap<TabId, Tab>,
    active: Option<TabId>,
    next_id: TabId,
}

/// Simulated browser hosting tabs, controllers and the report channel
#[derive(Debug, Clone)]
pub struct SimulatedBrowser {
    state: Arc<Mutex<BrowserState>>,
    reports: broadcast::Sender<StatusReport>,
    config: Arc<ExtensionConfig>,
}

impl Default for SimulatedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBrowser {
    /// Browser with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ExtensionConfig::default())
    }

    /// Browser whose controllers use `config`
    #[must_use]
    pub fn with_config(config: ExtensionConfig) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(BrowserState {
                next_id: 1,
                ..BrowserState::default()
            })),
            reports,
            config: Arc::new(config),
        }
    }

    fn start_controller(&self, page: &SimulatedPage) -> SpeedController<SimulatedPage> {
        SpeedController::new(page.clone(), ReportSink::new(self.reports.clone()))
            .with_notifier(self.config.notifier())
    }

    /// Open a tab and focus it
    pub fn open_tab(&self, spec: TabSpec) -> TabId {
        let controller = spec
            .content_script
            .then(|| self.start_controller(&spec.page));
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        debug!(tab = id, url = %spec.page.url(), "tab opened");
        state.tabs.insert(
            id,
            Tab {
                spec,
                controller,
                deliveries: 0,
                injections: 0,
            },
        );
        state.active = Some(id);
        id
    }

    /// Focus `tab`; returns false when it does not exist
    pub fn activate(&self, tab: TabId) -> bool {
        let mut state = lock(&self.state);
        if state.tabs.contains_key(&tab) {
            state.active = Some(tab);
            true
        } else {
            false
        }
    }

    /// Close `tab`, dropping its controller
    pub fn close_tab(&self, tab: TabId) {
        let mut state = lock(&self.state);
        state.tabs.remove(&tab);
        if state.active == Some(tab) {
            state.active = None;
        }
    }

    /// Load a new page in `tab`; the old controller is destroyed
    pub fn navigate(&self, tab: TabId, page: SimulatedPage) -> bool {
        let content_script = {
            let state = lock(&self.state);
            match state.tabs.get(&tab) {
                Some(t) => t.spec.scriptable && t.spec.content_script,
                None => return false,
            }
        };
        let controller = content_script.then(|| self.start_controller(&page));
        let mut state = lock(&self.state);
        let Some(entry) = state.tabs.get_mut(&tab) else {
            return false;
        };
        debug!(tab, url = %page.url(), "tab navigated");
        entry.spec.page = page;
        entry.controller = controller;
        true
    }

    /// Change the page structure and let its controller observe it
    pub fn mutate_page<F>(&self, tab: TabId, mutate: F) -> bool
    where
        F: FnOnce(&SimulatedPage),
    {
        let mut state = lock(&self.state);
        let Some(entry) = state.tabs.get_mut(&tab) else {
            return false;
        };
        mutate(&entry.spec.page);
        if let Some(controller) = entry.controller.as_mut() {
            controller.on_mutation();
        }
        true
    }

    /// Page shown in `tab`
    #[must_use]
    pub fn page(&self, tab: TabId) -> Option<SimulatedPage> {
        lock(&self.state).tabs.get(&tab).map(|t| t.spec.page.clone())
    }

    /// Whether a controller runs in `tab`
    #[must_use]
    pub fn has_controller(&self, tab: TabId) -> bool {
        lock(&self.state)
            .tabs
            .get(&tab)
            .is_some_and(|t| t.controller.is_some())
    }

    /// State of the controller in `tab`
    #[must_use]
    pub fn controller_state(&self, tab: TabId) -> Option<ControllerState> {
        lock(&self.state)
            .tabs
            .get(&tab)
            .and_then(|t| t.controller.as_ref())
            .map(SpeedController::state)
    }

    /// Troubleshooting snapshot of the controller in `tab`
    #[must_use]
    pub fn diagnose(&self, tab: TabId) -> Option<Diagnostics> {
        lock(&self.state)
            .tabs
            .get(&tab)
            .and_then(|t| t.controller.as_ref())
            .map(SpeedController::diagnose)
    }

    /// Delivery attempts made to `tab`, successful or not
    #[must_use]
    pub fn delivery_attempts(&self, tab: TabId) -> usize {
        lock(&self.state).tabs.get(&tab).map_or(0, |t| t.deliveries)
    }

    /// Injection attempts made into `tab`
    #[must_use]
    pub fn injections(&self, tab: TabId) -> usize {
        lock(&self.state).tabs.get(&tab).map_or(0, |t| t.injections)
    }
}

#[async_trait]
impl ExtensionHost for SimulatedBrowser {
    async fn active_tab(&self) -> Option<TabInfo> {
        let state = lock(&self.state);
        let id = state.active?;
        state.tabs.get(&id).map(|t| TabInfo {
            id,
            url: t.spec.page.url(),
        })
    }

    async fn send_to_tab(&self, tab: TabId, request: Request) -> Result<Response, DeliveryError> {
        let raw = message::encode(&request)?;
        let response = {
            let mut state = lock(&self.state);
            let entry = state
                .tabs
                .get_mut(&tab)
                .ok_or(DeliveryError::NoSuchTab { tab })?;
            entry.deliveries += 1;
            let controller = entry
                .controller
                .as_mut()
                .ok_or(DeliveryError::NoReceiver { tab })?;
            controller.handle_message(&raw)
        };
        message::transfer(&response)
    }

    async fn inject_controller(&self, tab: TabId) -> Result<(), DeliveryError> {
        let page = {
            let mut state = lock(&self.state);
            let entry = state
                .tabs
                .get_mut(&tab)
                .ok_or(DeliveryError::NoSuchTab { tab })?;
            entry.injections += 1;
            if !entry.spec.scriptable {
                warn!(tab, "script injection refused");
                return Err(DeliveryError::InjectionRefused {
                    tab,
                    reason: "cannot access contents of the page".to_string(),
                });
            }
            if entry.spec.inert_injection || entry.controller.is_some() {
                return Ok(());
            }
            entry.spec.page.clone()
        };

        let controller = self.start_controller(&page);
        let mut state = lock(&self.state);
        if let Some(entry) = state.tabs.get_mut(&tab) {
            entry.controller.get_or_insert(controller);
            info!(tab, "controller injected");
        }
        Ok(())
    }

    fn subscribe_reports(&self) -> broadcast::Receiver<StatusReport> {
        self.reports.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::message::StepCommand;
    use crate::page::SimulatedMedia;

    fn video_page() -> SimulatedPage {
        SimulatedPage::new("https://www.bilibili.com/video/BV1xx").with_media(SimulatedMedia::paused_at(0.0))
    }

    #[tokio::test]
    async fn test_delivery_to_loaded_tab() {
        let browser = SimulatedBrowser::new();
        let tab = browser.open_tab(TabSpec::new(video_page()));
        let response = browser
            .send_to_tab(tab, Request::step(StepCommand::SpeedUp))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(browser.controller_state(tab).unwrap().current_speed, 1.25);
        assert_eq!(browser.delivery_attempts(tab), 1);
    }

    #[tokio::test]
    async fn test_delivery_without_controller_fails() {
        let browser = SimulatedBrowser::new();
        let tab = browser.open_tab(TabSpec::new(video_page()).without_controller());
        let err = browser.send_to_tab(tab, Request::CheckVideo).await.unwrap_err();
        assert_eq!(err, DeliveryError::NoReceiver { tab });
    }

    #[tokio::test]
    async fn test_injection_starts_controller() {
        let browser = SimulatedBrowser::new();
        let tab = browser.open_tab(TabSpec::new(video_page()).without_controller());
        browser.inject_controller(tab).await.unwrap();
        assert!(browser.has_controller(tab));
        assert_eq!(browser.injections(tab), 1);
    }

    #[tokio::test]
    async fn test_unscriptable_tab_refuses_injection() {
        let browser = SimulatedBrowser::new();
        let tab = browser.open_tab(TabSpec::new(SimulatedPage::new("chrome://settings")).unscriptable());
        let err = browser.inject_controller(tab).await.unwrap_err();
        assert!(matches!(err, DeliveryError::InjectionRefused { .. }));
        assert!(!browser.has_controller(tab));
    }

    #[tokio::test]
    async fn test_navigation_resets_controller() {
        let browser = SimulatedBrowser::new();
        let tab = browser.open_tab(TabSpec::new(video_page()));
        browser
            .send_to_tab(tab, Request::step(StepCommand::SpeedUp))
            .await
            .unwrap();
        assert!(browser.navigate(tab, video_page()));
        assert_eq!(browser.controller_state(tab).unwrap().current_speed, 1.0);
    }

    #[tokio::test]
    async fn test_active_tab_follows_focus() {
        let browser = SimulatedBrowser::new();
        let first = browser.open_tab(TabSpec::new(video_page()));
        let second = browser.open_tab(TabSpec::new(SimulatedPage::new("https://example.org/")));
        assert_eq!(browser.active_tab().await.unwrap().id, second);
        assert!(browser.activate(first));
        assert_eq!(
            browser.active_tab().await.unwrap().url,
            "https://www.bilibili.com/video/BV1xx"
        );
        browser.close_tab(first);
        assert!(browser.active_tab().await.is_none());
    }

    #[test]
    fn test_mutation_updates_census() {
        let browser = SimulatedBrowser::new();
        let tab = browser.open_tab(TabSpec::new(SimulatedPage::new("https://example.org/")));
        browser.mutate_page(tab, |page| {
            page.add_media(SimulatedMedia::paused_at(0.0));
            page.add_media(SimulatedMedia::paused_at(0.0));
        });
        assert_eq!(browser.diagnose(tab).unwrap().media_count, 2);
    }
}
