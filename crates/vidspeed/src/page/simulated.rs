//! Simulated page for tests and scripted sessions
//!
//! Mirrors the parts of a real document a controller observes: media
//! elements with rate, pause state and elapsed time, and the single
//! advisory slot. Handles are shared, so a test can keep a clone of an
//! element and inspect it after the controller changed it.

use super::{MediaElement, MediaPage};
use crate::advisory::Advisory;
use crate::error::MediaError;
use crate::lock;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Lowest rate a media element accepts (Chromium's bound)
pub const MIN_RATE: f64 = 0.0625;

/// Highest rate a media element accepts (Chromium's bound)
pub const MAX_RATE: f64 = 16.0;

#[derive(Debug)]
struct MediaState {
    rate: f64,
    paused: bool,
    current_time: f64,
    attached: bool,
}

/// Shared handle to a simulated media element
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    state: Arc<Mutex<MediaState>>,
}

impl SimulatedMedia {
    fn with_state(paused: bool, current_time: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MediaState {
                rate: 1.0,
                paused,
                current_time,
                attached: true,
            })),
        }
    }

    /// A paused element at `current_time` seconds
    #[must_use]
    pub fn paused_at(current_time: f64) -> Self {
        Self::with_state(true, current_time)
    }

    /// A playing element at `current_time` seconds
    #[must_use]
    pub fn playing_at(current_time: f64) -> Self {
        Self::with_state(false, current_time)
    }

    /// Resume playback
    pub fn play(&self) {
        lock(&self.state).paused = false;
    }

    /// Pause playback
    pub fn pause(&self) {
        lock(&self.state).paused = true;
    }

    /// Move the playhead
    pub fn seek(&self, current_time: f64) {
        lock(&self.state).current_time = current_time;
    }

    /// Remove the element from its document; later rate changes fail
    pub fn detach(&self) {
        lock(&self.state).attached = false;
    }

    /// Whether the element is still in its document
    #[must_use]
    pub fn is_attached(&self) -> bool {
        lock(&self.state).attached
    }
}

impl MediaElement for SimulatedMedia {
    fn playback_rate(&self) -> f64 {
        lock(&self.state).rate
    }

    fn set_playback_rate(&self, rate: f64) -> Result<(), MediaError> {
        let mut state = lock(&self.state);
        if !state.attached {
            return Err(MediaError::Detached);
        }
        if !rate.is_finite() || !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(MediaError::UnsupportedRate { rate });
        }
        state.rate = rate;
        Ok(())
    }

    fn paused(&self) -> bool {
        lock(&self.state).paused
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).current_time
    }
}

#[derive(Debug)]
struct PageState {
    url: String,
    media: Vec<SimulatedMedia>,
    advisory: Option<Advisory>,
    advisories_rendered: usize,
}

/// Shared handle to a simulated document
#[derive(Debug, Clone)]
pub struct SimulatedPage {
    state: Arc<Mutex<PageState>>,
}

impl SimulatedPage {
    /// An empty page at `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PageState {
                url: url.into(),
                media: Vec::new(),
                advisory: None,
                advisories_rendered: 0,
            })),
        }
    }

    /// Add a media element and return a handle to it
    #[allow(clippy::needless_pass_by_value)]
    pub fn add_media(&self, media: SimulatedMedia) -> SimulatedMedia {
        lock(&self.state).media.push(media.clone());
        media
    }

    /// Builder form of [`add_media`](Self::add_media)
    #[must_use]
    pub fn with_media(self, media: SimulatedMedia) -> Self {
        self.add_media(media);
        self
    }

    /// Remove the element at `index`, detaching it
    pub fn remove_media(&self, index: usize) -> Option<SimulatedMedia> {
        let mut state = lock(&self.state);
        if index >= state.media.len() {
            return None;
        }
        let media = state.media.remove(index);
        media.detach();
        Some(media)
    }

    /// Page URL
    #[must_use]
    pub fn url(&self) -> String {
        lock(&self.state).url.clone()
    }

    /// Number of media elements
    #[must_use]
    pub fn media_count(&self) -> usize {
        lock(&self.state).media.len()
    }

    /// Media element at `index`
    #[must_use]
    pub fn media(&self, index: usize) -> Option<SimulatedMedia> {
        lock(&self.state).media.get(index).cloned()
    }

    /// Advisory still in the page right now
    #[must_use]
    pub fn visible_advisory(&self) -> Option<String> {
        let now = Instant::now();
        lock(&self.state)
            .advisory
            .as_ref()
            .filter(|a| a.is_present_at(now))
            .map(|a| a.text.clone())
    }

    /// How many advisories were rendered in total
    #[must_use]
    pub fn advisories_rendered(&self) -> usize {
        lock(&self.state).advisories_rendered
    }
}

impl MediaPage for SimulatedPage {
    type Element = SimulatedMedia;

    fn media_elements(&self) -> Vec<SimulatedMedia> {
        lock(&self.state).media.clone()
    }

    fn render_advisory(&self, advisory: &Advisory) {
        let mut state = lock(&self.state);
        state.advisory = Some(advisory.clone());
        state.advisories_rendered += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_bounds() {
        let media = SimulatedMedia::paused_at(0.0);
        assert!(media.set_playback_rate(3.0).is_ok());
        assert_eq!(
            media.set_playback_rate(0.0),
            Err(MediaError::UnsupportedRate { rate: 0.0 })
        );
        assert!(media.set_playback_rate(f64::NAN).is_err());
        assert_eq!(media.playback_rate(), 3.0);
    }

    #[test]
    fn test_detached_media_rejects_rate() {
        let page = SimulatedPage::new("https://www.bilibili.com/video/BV1");
        page.add_media(SimulatedMedia::playing_at(1.0));
        let removed = page.remove_media(0).unwrap();

        assert_eq!(page.media_count(), 0);
        assert!(!removed.is_attached());
        assert_eq!(removed.set_playback_rate(2.0), Err(MediaError::Detached));
    }

    #[test]
    fn test_handles_share_state() {
        let page = SimulatedPage::new("https://example.com/").with_media(SimulatedMedia::paused_at(0.0));
        let handle = page.media(0).unwrap();
        page.media_elements()[0].set_playback_rate(1.5).unwrap();
        assert_eq!(handle.playback_rate(), 1.5);

        handle.play();
        handle.seek(10.0);
        assert!(page.media(0).unwrap().is_playing());
    }
}
