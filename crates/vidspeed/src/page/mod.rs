//! Page abstractions seen by a speed controller
//!
//! A controller never touches a browser API directly. It asks a
//! [`MediaPage`] for its media elements and hands advisories to it for
//! rendering. The simulated page backs tests and the CLI; the `wasm`
//! feature adds a `web-sys` page.

mod simulated;
#[cfg(feature = "wasm")]
mod web;

pub use simulated::{SimulatedMedia, SimulatedPage, MAX_RATE, MIN_RATE};
#[cfg(feature = "wasm")]
pub use web::{ContentScript, WebMedia, WebPage};

use crate::advisory::Advisory;
use crate::error::MediaError;
use crate::message::MediaSnapshot;

/// A playable audio or video element
pub trait MediaElement {
    /// Current playback multiplier
    fn playback_rate(&self) -> f64;

    /// Change the playback multiplier
    fn set_playback_rate(&self, rate: f64) -> Result<(), MediaError>;

    /// Whether playback is paused
    fn paused(&self) -> bool;

    /// Elapsed playback time in seconds
    fn current_time(&self) -> f64;

    /// Playing with some progress, the lookup's first preference
    fn is_playing(&self) -> bool {
        !self.paused() && self.current_time() > 0.0
    }

    /// Capture the observable state
    fn snapshot(&self) -> MediaSnapshot {
        MediaSnapshot {
            speed: self.playback_rate(),
            paused: self.paused(),
            current_time: self.current_time(),
        }
    }
}

/// The content tree of one page
pub trait MediaPage {
    /// Handle to a media element in this page
    type Element: MediaElement;

    /// All media elements in document order
    fn media_elements(&self) -> Vec<Self::Element>;

    /// Display an advisory, replacing any visible one
    fn render_advisory(&self, advisory: &Advisory);
}

/// Pick the element commands act on
///
/// The first element that is playing with nonzero elapsed time wins;
/// otherwise the first element in document order.
pub fn locate_media<P: MediaPage>(page: &P) -> Option<P::Element> {
    let mut elements = page.media_elements();
    if let Some(playing) = elements.iter().position(MediaElement::is_playing) {
        return Some(elements.swap_remove(playing));
    }
    elements.into_iter().next()
}
