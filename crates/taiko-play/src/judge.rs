use serde::{Deserialize, Serialize};
use tja_model::{Difficulty, Lane};

/// Hit quality of a single note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    Great,
    Good,
    Bad,
}

impl Quality {
    /// Returns true if this quality raises the combo.
    ///
    /// Bad keeps the current combo but does not add to it, so it never lifts
    /// the score tier either.
    pub fn raises_combo(self) -> bool {
        matches!(self, Self::Great | Self::Good)
    }

    pub fn index(self) -> usize {
        match self {
            Self::Great => 0,
            Self::Good => 1,
            Self::Bad => 2,
        }
    }
}

/// Fast/Slow indicator for timing feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FastSlow {
    Fast,
    Just,
    Slow,
}

impl FastSlow {
    /// `diff_us` is input time minus note time.
    pub fn from_diff(diff_us: i64, quality: Quality) -> Self {
        if quality == Quality::Great {
            FastSlow::Just
        } else if diff_us < 0 {
            FastSlow::Fast
        } else {
            FastSlow::Slow
        }
    }
}

/// Converts seconds to whole microseconds.
///
/// All window comparisons run on these integers so boundary checks are exact.
pub fn to_us(seconds: f64) -> i64 {
    (seconds * 1_000_000.0).round() as i64
}

fn ms_to_us(ms: f64) -> i64 {
    (ms * 1_000.0).round() as i64
}

/// Symmetric judge windows in milliseconds. Bounds are closed: a hit exactly
/// `great` ms away is still Great.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeWindow {
    pub great: f64,
    pub good: f64,
    pub bad: f64,
}

impl JudgeWindow {
    /// Windows used by the arcade cabinets for each course.
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy | Difficulty::Normal => Self {
                great: 41.708,
                good: 108.442,
                bad: 125.125,
            },
            Difficulty::Hard | Difficulty::Oni | Difficulty::Edit => Self {
                great: 25.025,
                good: 75.075,
                bad: 108.442,
            },
        }
    }

    /// Determine the quality for a timing difference in microseconds.
    pub fn judge(&self, diff_us: i64) -> Option<Quality> {
        let diff_abs = diff_us.abs();
        if diff_abs <= ms_to_us(self.great) {
            Some(Quality::Great)
        } else if diff_abs <= ms_to_us(self.good) {
            Some(Quality::Good)
        } else if diff_abs <= ms_to_us(self.bad) {
            Some(Quality::Bad)
        } else {
            None
        }
    }

    pub fn bad_us(&self) -> i64 {
        ms_to_us(self.bad)
    }
}

impl Default for JudgeWindow {
    fn default() -> Self {
        Self {
            great: 25.0,
            good: 50.0,
            bad: 100.0,
        }
    }
}

/// A logical strike, already mapped from the input device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Seconds on the playback clock.
    pub time: f64,
    pub lane: Lane,
    /// Strong (two-handed) strike.
    #[serde(default)]
    pub big: bool,
}

impl InputEvent {
    pub fn don(time: f64) -> Self {
        Self {
            time,
            lane: Lane::Don,
            big: false,
        }
    }

    pub fn katsu(time: f64) -> Self {
        Self {
            time,
            lane: Lane::Katsu,
            big: false,
        }
    }
}
