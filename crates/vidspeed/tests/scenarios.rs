//! End-to-end sessions across dispatcher, controller and panel
//!
//! Every test drives the simulated browser with paused tokio time, so the
//! injection grace period elapses instantly and deterministically.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vidspeed::prelude::*;
use vidspeed::{
    DeliveryError, DispatchOutcome, MemoryStore, Outcome, Settings, SiteStatus, VideoStatus,
};

fn paused_video_page(url: &str) -> SimulatedPage {
    SimulatedPage::new(url).with_media(SimulatedMedia::paused_at(0.0))
}

fn single_tab(spec: TabSpec) -> Arc<SimulatedBrowser> {
    let browser = Arc::new(SimulatedBrowser::new());
    browser.open_tab(spec);
    browser
}

// ============================================================================
// Shortcut sessions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn three_speed_ups_reach_double_speed() {
    let page = paused_video_page("https://www.bilibili.com/video/BV1");
    let media = page.media(0).unwrap();
    let browser = single_tab(TabSpec::new(page));
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &ExtensionConfig::default());

    for _ in 0..3 {
        let outcome = dispatcher.on_shortcut("speed-up").await;
        assert!(matches!(outcome, DispatchOutcome::Delivered(_)));
    }

    assert_eq!(media.playback_rate(), 2.0);
    let state = browser.controller_state(1).unwrap();
    assert_eq!(state.current_index, 6);
    assert_eq!(state.current_speed, 2.0);
}

#[tokio::test(start_paused = true)]
async fn reset_on_empty_page_reports_not_found() {
    let browser = single_tab(TabSpec::new(SimulatedPage::new("https://example.org/")));
    let mut reports = browser.subscribe_reports();
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &ExtensionConfig::default());

    let outcome = dispatcher.on_shortcut("speed-reset").await;
    let response = outcome.response().unwrap();
    assert!(!response.success);
    assert_eq!(response.outcome, Some(Outcome::NoMedia));
    assert_eq!(reports.try_recv().unwrap(), StatusReport::VideoNotFound);
    assert_eq!(browser.controller_state(1).unwrap().current_speed, 1.0);
}

#[tokio::test(start_paused = true)]
async fn missing_controller_is_injected_and_retried_once() {
    let page = paused_video_page("https://www.youtube.com/watch?v=abc");
    let media = page.media(0).unwrap();
    let browser = single_tab(TabSpec::new(page).without_controller());
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &ExtensionConfig::default());
    let started = Instant::now();

    let outcome = dispatcher.on_shortcut("speed-down").await;

    assert!(matches!(outcome, DispatchOutcome::DeliveredAfterInjection(_)));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(1000) && waited < Duration::from_millis(1100));
    assert_eq!(browser.injections(1), 1);
    assert_eq!(browser.delivery_attempts(1), 2);
    assert_eq!(media.playback_rate(), 0.75);
}

#[tokio::test(start_paused = true)]
async fn custom_grace_period_is_honored() {
    let browser = single_tab(TabSpec::new(paused_video_page("https://example.org/")).without_controller());
    let config = ExtensionConfig::default().with_retry_grace_ms(250);
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &config);
    let started = Instant::now();

    dispatcher.on_shortcut("speed-up").await;
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(250) && waited < Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn unscriptable_page_is_never_retried() {
    let browser = single_tab(TabSpec::new(SimulatedPage::new("chrome://settings/")).unscriptable());
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &ExtensionConfig::default());
    let started = Instant::now();

    let outcome = dispatcher.on_shortcut("speed-up").await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Failed(DeliveryError::InjectionRefused { tab: 1, .. })
    ));
    assert_eq!(browser.delivery_attempts(1), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn reset_twice_matches_reset_once() {
    let page = paused_video_page("https://www.iqiyi.com/v_1.html");
    let browser = single_tab(TabSpec::new(page));
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &ExtensionConfig::default());
    dispatcher.on_shortcut("speed-up").await;
    dispatcher.on_shortcut("speed-up").await;

    dispatcher.on_shortcut("speed-reset").await;
    let once = browser.controller_state(1).unwrap();
    dispatcher.on_shortcut("speed-reset").await;
    let twice = browser.controller_state(1).unwrap();

    assert_eq!(once, twice);
    assert_eq!(twice.current_speed, 1.0);
    assert_eq!(twice.current_index, 3);
}

#[tokio::test(start_paused = true)]
async fn navigation_starts_a_fresh_controller() {
    let browser = single_tab(TabSpec::new(paused_video_page("https://www.youtube.com/watch?v=1")));
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &ExtensionConfig::default());
    dispatcher.on_shortcut("speed-up").await;
    assert_eq!(browser.controller_state(1).unwrap().current_speed, 1.25);

    browser.navigate(1, paused_video_page("https://www.youtube.com/watch?v=2"));
    assert_eq!(browser.controller_state(1).unwrap().current_speed, 1.0);
}

#[tokio::test(start_paused = true)]
async fn media_added_later_is_found() {
    let browser = single_tab(TabSpec::new(SimulatedPage::new("https://v.qq.com/x/1")));
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &ExtensionConfig::default());
    assert!(!dispatcher.on_shortcut("speed-up").await.response().unwrap().success);

    browser.mutate_page(1, |page| {
        page.add_media(SimulatedMedia::playing_at(12.0));
    });
    let outcome = dispatcher.on_shortcut("speed-up").await;
    assert!(outcome.response().unwrap().success);
    assert_eq!(browser.diagnose(1).unwrap().media_count, 1);
}

// ============================================================================
// Panel sessions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn remembered_speed_is_shown_on_reopen() {
    let store = Arc::new(MemoryStore::with_settings(Settings {
        remember_speed: true,
        last_speed: 1.5,
        ..Settings::default()
    }));
    let browser = single_tab(TabSpec::new(paused_video_page("https://www.youku.com/v/1")));

    let mut panel = ControlPanel::open(Arc::clone(&browser), Arc::clone(&store), &ExtensionConfig::default()).await;
    panel.close();
    let panel = ControlPanel::open(Arc::clone(&browser), Arc::clone(&store), &ExtensionConfig::default()).await;

    assert_eq!(panel.view().speed_label(), "1.5x");
    assert_eq!(panel.view().active_preset, Some(1.5));
    // The page itself still plays at normal speed
    assert_eq!(browser.controller_state(1).unwrap().current_speed, 1.0);
}

#[tokio::test(start_paused = true)]
async fn panel_follows_shortcut_changes_while_open() {
    let browser = single_tab(TabSpec::new(paused_video_page("https://www.bilibili.com/video/2")));
    let store = Arc::new(MemoryStore::new());
    let mut panel = ControlPanel::open(Arc::clone(&browser), store, &ExtensionConfig::default()).await;
    let dispatcher = CommandDispatcher::new(Arc::clone(&browser), &ExtensionConfig::default());

    dispatcher.on_shortcut("speed-up").await;
    dispatcher.on_shortcut("speed-up").await;
    assert_eq!(panel.pump_reports().await, 2);

    assert_eq!(panel.view().speed_label(), "1.5x");
    assert_eq!(panel.view().site, SiteStatus::Supported);
    assert!(matches!(panel.view().video, VideoStatus::Detected { paused: true, .. }));
}

#[tokio::test(start_paused = true)]
async fn panel_on_unscriptable_page_shows_inline_error() {
    let browser = single_tab(TabSpec::new(SimulatedPage::new("chrome://extensions/")).unscriptable());
    let mut panel =
        ControlPanel::open(Arc::clone(&browser), Arc::new(MemoryStore::new()), &ExtensionConfig::default()).await;

    assert_eq!(panel.view().site, SiteStatus::Generic);
    assert_eq!(panel.view().video, VideoStatus::Unknown);

    assert!(panel.send_command(StepCommand::SpeedUp).await.is_err());
    assert_eq!(panel.view().visible_errors().len(), 1);
    assert_eq!(browser.injections(1), 0);
}

#[tokio::test(start_paused = true)]
async fn check_video_reflects_last_applied_rate() {
    let browser = single_tab(TabSpec::new(paused_video_page("https://example.org/")));
    let mut panel =
        ControlPanel::open(Arc::clone(&browser), Arc::new(MemoryStore::new()), &ExtensionConfig::default()).await;
    panel.send_preset_speed(3.0).await.unwrap();

    let response = browser.send_to_tab(1, Request::CheckVideo).await.unwrap();
    assert!(response.success);
    assert_eq!(response.has_video, Some(true));
    assert_eq!(response.speed, Some(3.0));
}
