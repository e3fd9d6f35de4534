//! Pure scoring rules.
//!
//! Every function here depends only on its arguments so it can be checked
//! against a table of expected values. Point values come from chart headers,
//! so arithmetic is done in `u64` and saturates.

use serde::{Deserialize, Serialize};
use tja_model::{BranchKind, Course, RollKind, Timeline};

use crate::judge::Quality;

/// Total a shin-uchi chart is scaled towards.
pub const SHINUCHI_TARGET: u64 = 1_000_000;
/// Points per drumroll tick group in shin-uchi scoring.
pub const SHINUCHI_ROLL_GROUP_POINTS: u64 = 1000;
pub const SHINUCHI_ROLL_GROUP: u32 = 10;
pub const SHINUCHI_BALLOON_POINTS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoreMode {
    /// Combo tiers, gogo and big-note bonuses.
    #[default]
    Tiered,
    /// One fixed value per note whatever the quality, scaled so a full
    /// combo lands near [`SHINUCHI_TARGET`].
    ShinUchi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub mode: ScoreMode,
    /// Base points for a Great at tier 0.
    pub great_points: u32,
    /// Good pays this percentage of the Great value.
    pub good_percent: u32,
    /// Flat points for Bad; no tier or gogo bonus.
    pub bad_points: u32,
    /// Extra points per combo tier, added to the Great value.
    pub tier_points: u32,
    /// Combo needed per tier step.
    pub combo_step: u32,
    pub max_tier: u32,
    /// Multiplier during gogo time, in percent.
    pub gogo_percent: u32,
    /// Multiplier for a big note struck big, in percent.
    pub big_percent: u32,
    pub drumroll_points: u32,
    pub big_drumroll_points: u32,
    pub balloon_points: u32,
    pub balloon_pop_bonus: u32,
    /// Shin-uchi value of one note. Derived from the timeline when unset.
    pub shinuchi_points: Option<u64>,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            mode: ScoreMode::Tiered,
            great_points: 300,
            good_percent: 50,
            bad_points: 0,
            tier_points: 30,
            combo_step: 10,
            max_tier: 10,
            gogo_percent: 200,
            big_percent: 200,
            drumroll_points: 100,
            big_drumroll_points: 200,
            balloon_points: 100,
            balloon_pop_bonus: 500,
            shinuchi_points: None,
        }
    }
}

impl ScoreConfig {
    /// Uses the course's `SCOREINIT`/`SCOREDIFF` when declared.
    pub fn for_course(course: &Course) -> Self {
        let mut config = Self::default();
        if let Some(init) = course.score_init {
            config.great_points = init;
        }
        if let Some(diff) = course.score_diff {
            config.tier_points = diff;
        }
        config
    }

    /// Fills in the shin-uchi note value for `timeline` if it is still unset.
    pub fn resolve(&self, timeline: &Timeline) -> Self {
        let mut config = self.clone();
        if config.mode == ScoreMode::ShinUchi && config.shinuchi_points.is_none() {
            config.shinuchi_points = Some(shinuchi_note_points(timeline));
        }
        config
    }

    fn note_points(&self) -> u64 {
        self.shinuchi_points.unwrap_or(100)
    }
}

/// Per-note shin-uchi value for `timeline`.
///
/// Balloons are set aside at 100 each; the rest of the target is split over
/// the single notes and rounded up to a multiple of 10. Branched sections
/// count their highest declared path.
pub fn shinuchi_note_points(timeline: &Timeline) -> u64 {
    let sections = timeline.sections();
    let counted = |section: Option<usize>, branch: Option<BranchKind>| match section {
        None => true,
        Some(index) => {
            let top = sections.get(index).and_then(|s| {
                BranchKind::ALL
                    .into_iter()
                    .rev()
                    .find(|k| s.paths[k.index()])
            });
            branch.is_some() && branch == top
        }
    };

    let (mut notes, mut balloons) = (0u64, 0u64);
    for note in timeline.notes() {
        if !counted(note.section, note.branch) {
            continue;
        }
        if note.kind.is_single() {
            notes += 1;
        } else if matches!(note.kind.roll(), Some(RollKind::Balloon { .. })) {
            balloons += 1;
        }
    }
    if notes == 0 {
        return 100;
    }
    let remaining = SHINUCHI_TARGET.saturating_sub(balloons * SHINUCHI_BALLOON_POINTS);
    remaining.div_ceil(notes * 10) * 10
}

fn percent(value: u64, pct: u32) -> u64 {
    value.saturating_mul(pct as u64) / 100
}

/// Tier reached at `combo`, capped at `max_tier`.
pub fn combo_tier(combo: u32, config: &ScoreConfig) -> u32 {
    if config.combo_step == 0 {
        return 0;
    }
    (combo / config.combo_step).min(config.max_tier)
}

/// Points for a single note judged `quality` with `combo` already standing.
pub fn score_delta(quality: Quality, combo: u32, gogo: bool, config: &ScoreConfig) -> u64 {
    if config.mode == ScoreMode::ShinUchi {
        return config.note_points();
    }
    let tier = combo_tier(combo, config) as u64;
    let full = (config.great_points as u64)
        .saturating_add(tier.saturating_mul(config.tier_points as u64));
    let base = match quality {
        Quality::Great => full,
        Quality::Good => percent(full, config.good_percent),
        Quality::Bad => return config.bad_points as u64,
    };
    if gogo {
        percent(base, config.gogo_percent)
    } else {
        base
    }
}

/// Applies the big-note bonus to a delta from [`score_delta`].
pub fn big_note_delta(delta: u64, config: &ScoreConfig) -> u64 {
    match config.mode {
        ScoreMode::Tiered => percent(delta, config.big_percent),
        ScoreMode::ShinUchi => delta,
    }
}

/// Points for hit number `hits` (counting from 1) inside a drumroll or balloon.
///
/// Shin-uchi drumrolls pay a full group on the first hit of every ten, so a
/// roll totals `ceil(hits / 10) * 1000`.
pub fn roll_tick_delta(roll: RollKind, hits: u32, gogo: bool, config: &ScoreConfig) -> u64 {
    if config.mode == ScoreMode::ShinUchi {
        return match roll {
            RollKind::Drumroll { .. } if hits.saturating_sub(1) % SHINUCHI_ROLL_GROUP == 0 => {
                SHINUCHI_ROLL_GROUP_POINTS
            }
            RollKind::Drumroll { .. } => 0,
            RollKind::Balloon { .. } => SHINUCHI_BALLOON_POINTS,
        };
    }
    let base = match roll {
        RollKind::Drumroll { big: false } => config.drumroll_points,
        RollKind::Drumroll { big: true } => config.big_drumroll_points,
        RollKind::Balloon { .. } => config.balloon_points,
    } as u64;
    if gogo {
        percent(base, config.gogo_percent)
    } else {
        base
    }
}

pub fn balloon_pop_delta(gogo: bool, config: &ScoreConfig) -> u64 {
    let bonus = config.balloon_pop_bonus as u64;
    match config.mode {
        ScoreMode::ShinUchi => 0,
        ScoreMode::Tiered if gogo => percent(bonus, config.gogo_percent),
        ScoreMode::Tiered => bonus,
    }
}
