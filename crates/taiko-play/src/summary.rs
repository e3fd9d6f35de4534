use serde::{Deserialize, Serialize};
use tja_model::BranchKind;

use crate::judge::{FastSlow, Quality};

/// Judgment tallies for one play.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCounts {
    pub great: u32,
    pub good: u32,
    pub bad: u32,
    pub miss: u32,
    pub fast: u32,
    pub slow: u32,
    pub roll_hits: u32,
    pub balloons_popped: u32,
    pub balloons_unpopped: u32,
}

impl QualityCounts {
    pub fn record(&mut self, quality: Quality, fast_slow: FastSlow) {
        match quality {
            Quality::Great => self.great += 1,
            Quality::Good => self.good += 1,
            Quality::Bad => self.bad += 1,
        }
        match fast_slow {
            FastSlow::Fast => self.fast += 1,
            FastSlow::Slow => self.slow += 1,
            FastSlow::Just => {}
        }
    }

    pub fn judged(&self) -> u32 {
        self.great + self.good + self.bad + self.miss
    }
}

/// Clear classification shown on the result screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crown {
    None,
    Clear,
    /// Cleared with no misses.
    FullCombo,
    /// Cleared with every note Great.
    AllGreat,
}

impl Crown {
    pub fn from_result(counts: &QualityCounts, cleared: bool) -> Self {
        if !cleared {
            Crown::None
        } else if counts.miss > 0 || counts.judged() == 0 {
            Crown::Clear
        } else if counts.good == 0 && counts.bad == 0 {
            Crown::AllGreat
        } else {
            Crown::FullCombo
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Crown::None => "none",
            Crown::Clear => "clear",
            Crown::FullCombo => "full combo",
            Crown::AllGreat => "all great",
        }
    }
}

/// Per-attempt record handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub score: u64,
    pub max_combo: u32,
    pub gauge_final: f64,
    pub counts: QualityCounts,
    pub failed: bool,
    pub cleared: bool,
    pub crown: Crown,
    /// Path taken at each branch section.
    pub branches: Vec<BranchKind>,
    /// Whether every note had resolved when the summary was taken.
    pub complete: bool,
}
