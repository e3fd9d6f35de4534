use serde::{Deserialize, Serialize};

use crate::judge::Quality;

/// Soul gauge behaviour. Changes are in gauge units (0 - `max`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    pub init: f64,
    pub max: f64,
    /// Value needed at the end to count as cleared.
    pub border: f64,
    pub great: f64,
    pub good: f64,
    pub bad: f64,
    pub miss: f64,
    pub roll_tick: f64,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            init: 50.0,
            max: 100.0,
            border: 80.0,
            great: 1.0,
            good: 0.5,
            bad: 0.0,
            miss: -10.0,
            roll_tick: 0.1,
        }
    }
}

impl GaugeConfig {
    pub fn change_for(&self, quality: Quality) -> f64 {
        match quality {
            Quality::Great => self.great,
            Quality::Good => self.good,
            Quality::Bad => self.bad,
        }
    }
}

/// Health meter for one play.
///
/// Once exhausted the gauge is latched as failed and stops moving.
#[derive(Debug, Clone)]
pub struct SoulGauge {
    config: GaugeConfig,
    value: f64,
    failed: bool,
}

impl SoulGauge {
    pub fn new(config: GaugeConfig) -> Self {
        let value = config.init.clamp(0.0, config.max);
        Self {
            config,
            value,
            failed: false,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_cleared(&self) -> bool {
        !self.failed && self.value >= self.config.border
    }

    /// Applies `change`. Returns true only for the change that exhausts the gauge.
    pub fn apply(&mut self, change: f64) -> bool {
        if self.failed {
            return false;
        }
        self.value = (self.value + change).clamp(0.0, self.config.max);
        if change < 0.0 && self.value <= 0.0 {
            self.failed = true;
            return true;
        }
        false
    }

    pub fn on_hit(&mut self, quality: Quality) -> bool {
        self.apply(self.config.change_for(quality))
    }

    pub fn on_miss(&mut self) -> bool {
        self.apply(self.config.miss)
    }

    pub fn on_roll_tick(&mut self) -> bool {
        self.apply(self.config.roll_tick)
    }
}
