//! Playback speed ladder
//!
//! The fixed, strictly increasing sequence of multipliers that step
//! commands move through.

use serde::{Deserialize, Serialize};

/// Playback multipliers addressable by the step commands
pub const SPEED_LEVELS: [f64; 10] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0, 2.5, 3.0];

/// Index of the normal (1.0x) multiplier in [`SPEED_LEVELS`]
pub const NORMAL_INDEX: usize = 3;

/// Which end of the ladder a step command ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Limit {
    /// Top of the ladder
    Max,
    /// Bottom of the ladder
    Min,
}

impl Limit {
    /// Advisory text shown when the limit is hit
    #[must_use]
    pub const fn notice(self) -> &'static str {
        match self {
            Self::Max => "Maximum playback speed reached",
            Self::Min => "Minimum playback speed reached",
        }
    }
}

/// Ordered ladder of playback multipliers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedLadder {
    levels: &'static [f64],
    normal: usize,
}

impl Default for SpeedLadder {
    fn default() -> Self {
        Self::standard()
    }
}

impl SpeedLadder {
    /// The standard ten-step ladder from 0.25x to 3x
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            levels: &SPEED_LEVELS,
            normal: NORMAL_INDEX,
        }
    }

    /// Number of steps
    #[must_use]
    pub const fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false for the standard ladder
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Highest valid index
    #[must_use]
    pub const fn top(&self) -> usize {
        self.levels.len() - 1
    }

    /// Index of the 1.0x step
    #[must_use]
    pub const fn normal_index(&self) -> usize {
        self.normal
    }

    /// Multiplier at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.levels.get(index).copied()
    }

    /// Multiplier at the normal index
    #[must_use]
    pub fn normal_speed(&self) -> f64 {
        self.levels[self.normal]
    }

    /// Index one step up, or the limit that blocks it
    pub fn step_up(&self, index: usize) -> Result<usize, Limit> {
        if index < self.top() {
            Ok(index + 1)
        } else {
            Err(Limit::Max)
        }
    }

    /// Index one step down, or the limit that blocks it
    pub fn step_down(&self, index: usize) -> Result<usize, Limit> {
        if index > 0 {
            Ok(index - 1)
        } else {
            Err(Limit::Min)
        }
    }

    /// Index of an exact ladder member
    #[must_use]
    pub fn position(&self, speed: f64) -> Option<usize> {
        self.levels.iter().position(|&level| level == speed)
    }

    /// Iterate over the multipliers
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.levels.iter().copied()
    }
}

/// Formats a multiplier the way it is shown to users (`1.5x`, `2x`)
#[must_use]
pub fn format_speed(speed: f64) -> String {
    format!("{speed}x")
}
