//! Media element census
//!
//! Diagnostic count of media elements, refreshed whenever the page's
//! structure changes. Nothing reads it to make a decision.

use tracing::debug;

/// Running count of media elements in one page
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MediaCensus {
    count: usize,
    scans: u64,
}

impl MediaCensus {
    /// Record a fresh count; returns whether it changed
    pub fn observe(&mut self, count: usize) -> bool {
        self.scans += 1;
        let changed = count != self.count;
        self.count = count;
        if changed && count > 0 {
            debug!(count, "media elements detected");
        }
        changed
    }

    /// Last observed count
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Number of scans so far
    #[must_use]
    pub const fn scans(&self) -> u64 {
        self.scans
    }
}
