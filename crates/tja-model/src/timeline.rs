//! Resolves a parsed course into absolute timestamps.
//!
//! BPM and signature changes apply at measure boundaries; token slots are
//! spread evenly across their measure. Times are seconds relative to the
//! audio start (chart time minus the song offset).

use std::collections::HashMap;
use std::ops::Range;

use log::{debug, warn};

use crate::chart::{BranchCondition, BranchKind, Course, Measure, Segment, Song, StateChange};
use crate::error::TimelineError;
use crate::note::NoteKind;

const TIME_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct TimedNote {
    pub time: f64,
    pub kind: NoteKind,
    /// Measure index along the note's own path.
    pub measure: usize,
    pub scroll: f64,
    pub bpm: f64,
    /// Path the note belongs to; `None` outside branch sections.
    pub branch: Option<BranchKind>,
    pub section: Option<usize>,
    /// Index of the paired roll start/end entry.
    pub partner: Option<usize>,
}

impl TimedNote {
    /// End time of a roll start, otherwise the note time.
    pub fn end_time(&self, notes: &[TimedNote]) -> f64 {
        self.partner
            .filter(|_| self.kind.roll().is_some())
            .and_then(|i| notes.get(i))
            .map_or(self.time, |end| end.time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingPoint {
    pub time: f64,
    pub bpm: f64,
}

/// Half-open `[start, end)` gogo interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GogoRange {
    pub start: f64,
    pub end: f64,
    pub branch: Option<BranchKind>,
}

impl GogoRange {
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Barline {
    pub time: f64,
    pub visible: bool,
    pub branch: Option<BranchKind>,
}

/// One branch block laid out in time.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSection {
    /// When the path for this section is decided: the start of the measure
    /// before the block.
    pub check_time: f64,
    pub start: f64,
    pub end: f64,
    pub condition: BranchCondition,
    /// Which of normal/expert/master the block declares.
    pub paths: [bool; 3],
    /// Whether entering each path locks the branch.
    pub level_hold: [bool; 3],
    /// Timeline indices holding this section's notes.
    pub notes: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    notes: Vec<TimedNote>,
    timing_points: Vec<TimingPoint>,
    gogo: Vec<GogoRange>,
    barlines: Vec<Barline>,
    sections: Vec<BranchSection>,
    section_resets: Vec<f64>,
    measure_starts: Vec<f64>,
    duration: f64,
    offset: f64,
}

impl Timeline {
    pub fn notes(&self) -> &[TimedNote] {
        &self.notes
    }

    pub fn timing_points(&self) -> &[TimingPoint] {
        &self.timing_points
    }

    pub fn gogo_ranges(&self) -> &[GogoRange] {
        &self.gogo
    }

    pub fn barlines(&self) -> &[Barline] {
        &self.barlines
    }

    pub fn sections(&self) -> &[BranchSection] {
        &self.sections
    }

    /// Times at which branch metrics are reset (`#SECTION`).
    pub fn section_resets(&self) -> &[f64] {
        &self.section_resets
    }

    pub fn measure_starts(&self) -> &[f64] {
        &self.measure_starts
    }

    /// Chart length in seconds, delays included.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Timestamp at which the chart ends.
    pub fn end_time(&self) -> f64 {
        self.duration - self.offset
    }

    pub fn has_branches(&self) -> bool {
        !self.sections.is_empty()
    }

    pub fn gogo_at(&self, time: f64, branch: Option<BranchKind>) -> bool {
        self.gogo
            .iter()
            .any(|r| (r.branch.is_none() || r.branch == branch) && r.contains(time))
    }

    pub fn bpm_at(&self, time: f64) -> f64 {
        let idx = self.timing_points.partition_point(|p| p.time <= time);
        self.timing_points
            .get(idx.saturating_sub(1))
            .map_or(0.0, |p| p.bpm)
    }

    /// Single-hit notes. Counts every path on a branched timeline.
    pub fn playable_note_count(&self) -> usize {
        self.notes.iter().filter(|n| n.kind.is_single()).count()
    }
}

#[derive(Debug, Clone)]
struct Cursor {
    time: f64,
    bpm: f64,
    scroll: f64,
    gogo_since: Option<f64>,
    measure: usize,
    last_measure_start: Option<f64>,
    open_roll: Option<u32>,
}

struct PendingNote {
    note: TimedNote,
    roll: Option<u32>,
}

/// Where a walked measure's output goes.
#[derive(Debug, Clone, Copy)]
struct Route {
    branch: Option<BranchKind>,
    section: Option<usize>,
    /// Only the path timing continues from records tempo and measure starts.
    primary: bool,
}

const COMMON: Route = Route {
    branch: None,
    section: None,
    primary: true,
};

struct Builder {
    offset: f64,
    notes: Vec<PendingNote>,
    gogo: Vec<GogoRange>,
    barlines: Vec<Barline>,
    timing_points: Vec<TimingPoint>,
    sections: Vec<BranchSection>,
    section_resets: Vec<f64>,
    measure_starts: Vec<f64>,
    next_roll: u32,
    walked: usize,
}

impl Builder {
    fn new(offset: f64) -> Self {
        Self {
            offset,
            notes: Vec::new(),
            gogo: Vec::new(),
            barlines: Vec::new(),
            timing_points: Vec::new(),
            sections: Vec::new(),
            section_resets: Vec::new(),
            measure_starts: Vec::new(),
            next_roll: 0,
            walked: 0,
        }
    }

    fn push_timing_point(&mut self, time: f64, bpm: f64) {
        match self.timing_points.last_mut() {
            Some(last) if (last.time - time).abs() < TIME_EPSILON => last.bpm = bpm,
            Some(last) if last.bpm == bpm => {}
            _ => self.timing_points.push(TimingPoint { time, bpm }),
        }
    }

    fn open_gogo(&mut self, cursor: &mut Cursor, time: f64) {
        if cursor.gogo_since.is_none() {
            cursor.gogo_since = Some(time);
        }
    }

    fn close_gogo(&mut self, cursor: &mut Cursor, time: f64, branch: Option<BranchKind>) {
        if let Some(since) = cursor.gogo_since.take().filter(|&since| time > since) {
            self.gogo.push(GogoRange {
                start: since - self.offset,
                end: time - self.offset,
                branch,
            });
        }
    }

    fn push_note(&mut self, cursor: &mut Cursor, kind: NoteKind, time: f64, route: Route) {
        let roll = if kind.roll().is_some() {
            let id = self.next_roll;
            self.next_roll += 1;
            cursor.open_roll = Some(id);
            Some(id)
        } else if kind.is_roll_end() {
            cursor.open_roll.take()
        } else {
            None
        };

        self.notes.push(PendingNote {
            note: TimedNote {
                time: time - self.offset,
                kind,
                measure: cursor.measure,
                scroll: cursor.scroll,
                bpm: cursor.bpm,
                branch: route.branch,
                section: route.section,
                partner: None,
            },
            roll,
        });
    }

    /// Ends a roll left open at `time` so every start has an end entry.
    fn close_roll(&mut self, cursor: &mut Cursor, time: f64, route: Route) {
        let Some(id) = cursor.open_roll else {
            return;
        };
        let kind = self
            .notes
            .iter()
            .find(|p| p.roll == Some(id))
            .map_or(NoteKind::DrumrollEnd, |p| match p.note.kind {
                NoteKind::BalloonStart { .. } => NoteKind::BalloonEnd,
                _ => NoteKind::DrumrollEnd,
            });
        warn!(
            "roll left open at {:.3}s; closing it at the segment end",
            time - self.offset
        );
        self.push_note(cursor, kind, time, route);
    }

    fn apply_change(&mut self, cursor: &mut Cursor, change: StateChange, time: f64, route: Route) {
        match change {
            StateChange::Scroll(scroll) => cursor.scroll = scroll,
            StateChange::GogoStart => self.open_gogo(cursor, time),
            StateChange::GogoEnd => self.close_gogo(cursor, time, route.branch),
        }
    }

    fn measure(
        &mut self,
        cursor: &mut Cursor,
        measure: &Measure,
        route: Route,
    ) -> Result<(), TimelineError> {
        if measure.numerator == 0 || measure.denominator == 0 {
            return Err(TimelineError::InvalidSignature {
                measure: cursor.measure,
            });
        }
        if let Some(bpm) = measure.bpm {
            cursor.bpm = bpm;
        }
        if !(cursor.bpm > 0.0) || !cursor.bpm.is_finite() {
            return Err(TimelineError::NonPositiveBpm {
                measure: cursor.measure,
                bpm: cursor.bpm,
            });
        }

        cursor.time += measure.delay;
        let start = cursor.time;
        let duration = measure.duration_at(cursor.bpm);

        if route.primary {
            self.push_timing_point(start - self.offset, cursor.bpm);
            self.measure_starts.push(start - self.offset);
            if measure.section_reset {
                self.section_resets.push(start - self.offset);
            }
        }
        self.barlines.push(Barline {
            time: start - self.offset,
            visible: measure.barline,
            branch: route.branch,
        });

        cursor.scroll = measure.scroll;
        if measure.gogo {
            self.open_gogo(cursor, start);
        } else {
            self.close_gogo(cursor, start, route.branch);
        }

        let slots = measure.notes.len();
        let mut events = measure.events.iter().peekable();
        for (i, &kind) in measure.notes.iter().enumerate() {
            let time = start + duration * i as f64 / slots as f64;
            while let Some(event) = events.next_if(|e| e.position <= i) {
                self.apply_change(cursor, event.change, time, route);
            }
            if kind != NoteKind::Rest {
                self.push_note(cursor, kind, time, route);
            }
        }
        for event in events {
            self.apply_change(cursor, event.change, start + duration, route);
        }

        cursor.last_measure_start = Some(start);
        cursor.time = start + duration;
        cursor.measure += 1;
        self.walked += 1;
        Ok(())
    }

    fn fixed_block(
        &mut self,
        cursor: &mut Cursor,
        block: &crate::chart::BranchBlock,
        index: usize,
        branch: BranchKind,
    ) -> Result<(), TimelineError> {
        let path = block
            .path(branch)
            .or_else(|| block.path(BranchKind::Normal));
        let Some(measures) = path else {
            if block.paths.iter().all(Option::is_none) {
                debug!("branch section {} has no paths; skipped", index);
                return Ok(());
            }
            return Err(TimelineError::MissingBranch {
                section: index,
                branch,
            });
        };
        for measure in measures {
            self.measure(cursor, measure, COMMON)?;
        }
        Ok(())
    }

    fn dynamic_block(
        &mut self,
        cursor: &mut Cursor,
        block: &crate::chart::BranchBlock,
    ) -> Result<(), TimelineError> {
        let index = self.sections.len();
        let start = cursor.time;
        let check = cursor.last_measure_start.unwrap_or(start);

        let gogo_open = cursor.gogo_since.is_some();
        self.close_gogo(cursor, start, None);
        self.close_roll(cursor, start, COMMON);

        let mut exit: Option<Cursor> = None;
        let mut ends = Vec::new();
        for kind in BranchKind::ALL {
            let Some(measures) = block.path(kind) else {
                continue;
            };
            let route = Route {
                branch: Some(kind),
                section: Some(index),
                primary: kind == BranchKind::Normal,
            };
            let mut path = cursor.clone();
            path.gogo_since = gogo_open.then_some(start);
            for measure in measures {
                self.measure(&mut path, measure, route)?;
            }
            let end = path.time;
            self.close_roll(&mut path, end, route);
            let still_gogo = path.gogo_since.is_some();
            self.close_gogo(&mut path, end, Some(kind));
            if still_gogo {
                path.gogo_since = Some(end);
            }
            ends.push(end);
            if kind == BranchKind::Normal || exit.is_none() {
                exit = Some(path);
            }
        }

        let exit = exit.unwrap_or_else(|| cursor.clone());
        if ends.iter().any(|&e| (e - exit.time).abs() > 1e-6) {
            warn!(
                "branch section {} paths differ in length; timing continues from the normal path",
                index
            );
        }

        self.sections.push(BranchSection {
            check_time: check - self.offset,
            start: start - self.offset,
            end: exit.time - self.offset,
            condition: block.condition,
            paths: BranchKind::ALL.map(|k| block.path(k).is_some()),
            level_hold: BranchKind::ALL.map(|k| block.has_level_hold(k)),
            notes: 0..0,
        });
        *cursor = exit;
        Ok(())
    }

    fn finish(mut self, mut cursor: Cursor) -> Result<Timeline, TimelineError> {
        if self.walked == 0 {
            return Err(TimelineError::EmptyCourse);
        }
        let end = cursor.time;
        self.close_roll(&mut cursor, end, COMMON);
        self.close_gogo(&mut cursor, end, None);

        self.notes
            .sort_by(|a, b| a.note.time.total_cmp(&b.note.time));

        let mut rolls: HashMap<u32, (Option<usize>, Option<usize>)> = HashMap::new();
        for (i, pending) in self.notes.iter().enumerate() {
            if let Some(id) = pending.roll {
                let entry = rolls.entry(id).or_default();
                if pending.note.kind.roll().is_some() {
                    entry.0 = Some(i);
                } else {
                    entry.1 = Some(i);
                }
            }
        }
        let mut notes: Vec<TimedNote> = self.notes.into_iter().map(|p| p.note).collect();
        for (start, end) in rolls.into_values() {
            if let (Some(s), Some(e)) = (start, end) {
                notes[s].partner = Some(e);
                notes[e].partner = Some(s);
            }
        }

        for (index, section) in self.sections.iter_mut().enumerate() {
            let mut members = notes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.section == Some(index))
                .map(|(i, _)| i);
            if let Some(first) = members.next() {
                let last = members.last().unwrap_or(first);
                section.notes = first..last + 1;
            }
        }

        self.gogo
            .sort_by(|a, b| a.start.total_cmp(&b.start));
        self.barlines
            .sort_by(|a, b| a.time.total_cmp(&b.time));

        Ok(Timeline {
            notes,
            timing_points: self.timing_points,
            gogo: self.gogo,
            barlines: self.barlines,
            sections: self.sections,
            section_resets: self.section_resets,
            measure_starts: self.measure_starts,
            duration: cursor.time,
            offset: self.offset,
        })
    }
}

/// Builds the timeline for `course`.
///
/// With `Some(branch)` every branch block is flattened to that path (falling
/// back to the normal path where it is missing). With `None` all paths are
/// laid out side by side and tagged so a session can pick one per section.
pub fn build_timeline(
    song: &Song,
    course: &Course,
    branch: Option<BranchKind>,
) -> Result<Timeline, TimelineError> {
    let mut builder = Builder::new(song.offset);
    let mut cursor = Cursor {
        time: 0.0,
        bpm: song.bpm,
        scroll: 1.0,
        gogo_since: None,
        measure: 0,
        last_measure_start: None,
        open_roll: None,
    };

    let mut block_index = 0;
    for segment in &course.segments {
        match segment {
            Segment::Measure(measure) => builder.measure(&mut cursor, measure, COMMON)?,
            Segment::Branch(block) => {
                match branch {
                    Some(kind) => builder.fixed_block(&mut cursor, block, block_index, kind)?,
                    None => builder.dynamic_block(&mut cursor, block)?,
                }
                block_index += 1;
            }
        }
    }

    let timeline = builder.finish(cursor)?;
    debug!(
        "timeline for {}: {} notes, {} sections, {:.3}s",
        course.difficulty,
        timeline.notes.len(),
        timeline.sections.len(),
        timeline.duration
    );
    Ok(timeline)
}
