use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::NoteKind;
use crate::error::ParseWarning;

pub const DEFAULT_BPM: f64 = 120.0;

/// Song-wide header data.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub title: String,
    pub subtitle: String,
    /// Localized alternates (`TITLECN`, `SUBTITLECN`).
    pub title_alt: Option<String>,
    pub subtitle_alt: Option<String>,
    /// Audio file reference, resolved by the host.
    pub wave: Option<String>,
    pub bpm: f64,
    /// Seconds; every note time is shifted by `-offset`.
    pub offset: f64,
    pub demo_start: f64,
    pub genre: String,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: String::new(),
            subtitle: String::new(),
            title_alt: None,
            subtitle_alt: None,
            wave: None,
            bpm: DEFAULT_BPM,
            offset: 0.0,
            demo_start: 0.0,
            genre: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Oni,
    /// Also written `Ura` in charts.
    Edit,
}

impl Difficulty {
    /// Accepts names (case-insensitive) and the numeric form `0`-`4`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "0" | "easy" => Some(Difficulty::Easy),
            "1" | "normal" => Some(Difficulty::Normal),
            "2" | "hard" => Some(Difficulty::Hard),
            "3" | "oni" => Some(Difficulty::Oni),
            "4" | "edit" | "ura" => Some(Difficulty::Edit),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
            Difficulty::Oni => "Oni",
            Difficulty::Edit => "Edit",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown course label: {}", s))
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BranchKind {
    Normal,
    Expert,
    Master,
}

impl BranchKind {
    pub const ALL: [BranchKind; 3] = [BranchKind::Normal, BranchKind::Expert, BranchKind::Master];

    pub fn index(&self) -> usize {
        match self {
            BranchKind::Normal => 0,
            BranchKind::Expert => 1,
            BranchKind::Master => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BranchKind::Normal => "Normal",
            BranchKind::Expert => "Expert",
            BranchKind::Master => "Master",
        }
    }
}

impl FromStr for BranchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "normal" => Ok(BranchKind::Normal),
            "e" | "expert" => Ok(BranchKind::Expert),
            "m" | "master" => Ok(BranchKind::Master),
            _ => Err(format!("unknown branch: {}", s)),
        }
    }
}

/// Metric a branch checkpoint compares against its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchMetric {
    /// Percentage of Great (full) and Good (half) judgments (`p`).
    Accuracy,
    /// Drumroll/balloon hits (`r`).
    Drumroll,
    /// Score gained (`s`).
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchCondition {
    pub metric: BranchMetric,
    pub expert: f64,
    pub master: f64,
}

impl BranchCondition {
    /// Condition that never leaves the normal path.
    pub fn unreachable() -> Self {
        Self {
            metric: BranchMetric::Accuracy,
            expert: f64::INFINITY,
            master: f64::INFINITY,
        }
    }
}

/// Mid-measure state changes recorded at a token position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateChange {
    Scroll(f64),
    GogoStart,
    GogoEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureEvent {
    /// Index of the token slot the change applies from.
    pub position: usize,
    pub change: StateChange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub numerator: u32,
    pub denominator: u32,
    /// BPM taking effect at this measure's start.
    pub bpm: Option<f64>,
    /// Scroll speed and gogo flag in effect at the measure start.
    pub scroll: f64,
    pub gogo: bool,
    pub barline: bool,
    /// Seconds inserted before the measure starts.
    pub delay: f64,
    pub section_reset: bool,
    pub level_hold: bool,
    /// One entry per token slot, rests included.
    pub notes: Vec<NoteKind>,
    pub events: Vec<MeasureEvent>,
    pub line: usize,
}

impl Default for Measure {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
            bpm: None,
            scroll: 1.0,
            gogo: false,
            barline: true,
            delay: 0.0,
            section_reset: false,
            level_hold: false,
            notes: Vec::new(),
            events: Vec::new(),
            line: 0,
        }
    }
}

impl Measure {
    /// Length in quarter-note beats.
    pub fn beats(&self) -> f64 {
        4.0 * self.numerator as f64 / self.denominator as f64
    }

    pub fn duration_at(&self, bpm: f64) -> f64 {
        60.0 / bpm * self.beats()
    }
}

/// Alternative measure sequences for one branch section.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchBlock {
    pub condition: BranchCondition,
    pub paths: [Option<Vec<Measure>>; 3],
    pub line: usize,
}

impl BranchBlock {
    pub fn path(&self, kind: BranchKind) -> Option<&[Measure]> {
        self.paths[kind.index()].as_deref()
    }

    pub fn has_level_hold(&self, kind: BranchKind) -> bool {
        self.path(kind)
            .is_some_and(|measures| measures.iter().any(|m| m.level_hold))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Measure(Measure),
    Branch(BranchBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub difficulty: Difficulty,
    pub level: u32,
    pub score_init: Option<u32>,
    pub score_diff: Option<u32>,
    pub segments: Vec<Segment>,
    /// Line of the `#START` command.
    pub line: usize,
}

impl Course {
    pub fn has_branches(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Branch(_)))
    }

    pub fn branch_blocks(&self) -> impl Iterator<Item = &BranchBlock> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Branch(block) => Some(block),
            Segment::Measure(_) => None,
        })
    }

    /// Measures played when following `branch` through every block.
    pub fn measure_count(&self, branch: BranchKind) -> usize {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Measure(_) => 1,
                Segment::Branch(block) => block
                    .path(branch)
                    .or_else(|| block.path(BranchKind::Normal))
                    .map_or(0, <[Measure]>::len),
            })
            .sum()
    }
}

/// Output of [`crate::parse`].
#[derive(Debug, Clone)]
pub struct ParsedChart {
    pub song: Song,
    pub courses: BTreeMap<Difficulty, Course>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedChart {
    pub fn course(&self, difficulty: Difficulty) -> Option<&Course> {
        self.courses.get(&difficulty)
    }
}
