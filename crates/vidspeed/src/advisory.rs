//! Transient on-page advisories
//!
//! At most one advisory is visible per page. Showing a new one replaces the
//! current one immediately; each dismisses itself after its lifetime plus a
//! short fade.

use std::time::Duration;
use tokio::time::Instant;

/// Default time an advisory stays fully visible
pub const DEFAULT_ADVISORY_TTL: Duration = Duration::from_millis(3000);

/// Default fade-out after the visible period
pub const DEFAULT_ADVISORY_FADE: Duration = Duration::from_millis(300);

/// Visibility of an advisory at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryPhase {
    /// Fully shown
    Visible,
    /// Fading out, still in the page
    Fading,
    /// Removed
    Dismissed,
}

/// One advisory as handed to the page for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    /// Text shown to the user
    pub text: String,
    /// Monotonic id, later advisories have larger ids
    pub seq: u64,
    /// When it was shown
    pub shown_at: Instant,
    /// Fully visible period
    pub ttl: Duration,
    /// Fade-out period after `ttl`
    pub fade: Duration,
}

impl Advisory {
    /// Phase at `now`
    #[must_use]
    pub fn phase_at(&self, now: Instant) -> AdvisoryPhase {
        let age = now.saturating_duration_since(self.shown_at);
        if age < self.ttl {
            AdvisoryPhase::Visible
        } else if age < self.ttl + self.fade {
            AdvisoryPhase::Fading
        } else {
            AdvisoryPhase::Dismissed
        }
    }

    /// Whether the advisory is still in the page at `now`
    #[must_use]
    pub fn is_present_at(&self, now: Instant) -> bool {
        self.phase_at(now) != AdvisoryPhase::Dismissed
    }
}

/// Issues advisories for one page
#[derive(Debug)]
pub struct Notifier {
    enabled: bool,
    ttl: Duration,
    fade: Duration,
    next_seq: u64,
    current: Option<Advisory>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_ADVISORY_TTL, DEFAULT_ADVISORY_FADE)
    }
}

impl Notifier {
    /// Create an enabled notifier
    #[must_use]
    pub const fn new(ttl: Duration, fade: Duration) -> Self {
        Self {
            enabled: true,
            ttl,
            fade,
            next_seq: 0,
            current: None,
        }
    }

    /// Turn advisories on or off
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether advisories are shown at all
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Replace the current advisory with `text`
    ///
    /// Returns `None` when advisories are disabled.
    pub fn show(&mut self, text: impl Into<String>) -> Option<&Advisory> {
        if !self.enabled {
            return None;
        }
        self.next_seq += 1;
        self.current = Some(Advisory {
            text: text.into(),
            seq: self.next_seq,
            shown_at: Instant::now(),
            ttl: self.ttl,
            fade: self.fade,
        });
        self.current.as_ref()
    }

    /// The advisory still present at `now`, if any
    #[must_use]
    pub fn current_at(&self, now: Instant) -> Option<&Advisory> {
        self.current.as_ref().filter(|a| a.is_present_at(now))
    }

    /// Number of advisories issued so far
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.next_seq
    }
}
