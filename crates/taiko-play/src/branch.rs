//! Branch path selection.
//!
//! A three-state machine (normal/expert/master) that only moves at chart
//! checkpoints. Each checkpoint compares the metric gathered since the last
//! `#SECTION` reset against the block's thresholds.

use log::debug;
use serde::Serialize;
use tja_model::{BranchCondition, BranchKind, BranchMetric};

use crate::judge::Quality;

/// Performance gathered since the last section reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BranchStats {
    pub great: u32,
    pub good: u32,
    pub bad: u32,
    pub miss: u32,
    pub roll_hits: u32,
    pub score: u64,
}

impl BranchStats {
    pub fn record(&mut self, quality: Quality) {
        match quality {
            Quality::Great => self.great += 1,
            Quality::Good => self.good += 1,
            Quality::Bad => self.bad += 1,
        }
    }

    /// Great counts fully and Good half, over every judged note.
    pub fn accuracy(&self) -> f64 {
        let judged = self.great + self.good + self.bad + self.miss;
        if judged == 0 {
            return 0.0;
        }
        (self.great as f64 + self.good as f64 * 0.5) / judged as f64 * 100.0
    }

    pub fn metric(&self, metric: BranchMetric) -> f64 {
        match metric {
            BranchMetric::Accuracy => self.accuracy(),
            BranchMetric::Drumroll => self.roll_hits as f64,
            BranchMetric::Score => self.score as f64,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Path chosen for `value` under `condition`. Thresholds are inclusive.
pub fn select_branch(condition: &BranchCondition, value: f64) -> BranchKind {
    if value >= condition.master {
        BranchKind::Master
    } else if value >= condition.expert {
        BranchKind::Expert
    } else {
        BranchKind::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BranchDecision {
    pub section: usize,
    pub value: f64,
    pub branch: BranchKind,
    pub held: bool,
}

#[derive(Debug, Clone)]
pub struct BranchResolver {
    current: BranchKind,
    held: bool,
    decisions: Vec<BranchDecision>,
}

impl BranchResolver {
    pub fn new() -> Self {
        Self {
            current: BranchKind::Normal,
            held: false,
            decisions: Vec::new(),
        }
    }

    pub fn current(&self) -> BranchKind {
        self.current
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn decisions(&self) -> &[BranchDecision] {
        &self.decisions
    }

    /// Locks the current branch for the rest of the play.
    pub fn hold(&mut self) {
        self.held = true;
    }

    /// Runs one checkpoint and returns the path for the coming section.
    pub fn evaluate(
        &mut self,
        section: usize,
        condition: &BranchCondition,
        stats: &BranchStats,
    ) -> BranchKind {
        let value = stats.metric(condition.metric);
        if !self.held {
            self.current = select_branch(condition, value);
        }
        debug!(
            "branch checkpoint {}: {:?} = {:.2} -> {:?}{}",
            section,
            condition.metric,
            value,
            self.current,
            if self.held { " (held)" } else { "" }
        );
        self.decisions.push(BranchDecision {
            section,
            value,
            branch: self.current,
            held: self.held,
        });
        self.current
    }
}

impl Default for BranchResolver {
    fn default() -> Self {
        Self::new()
    }
}
