//! Live judgment state for one play of a timeline.
//!
//! The session never reads a clock on its own. The host calls [`advance`]
//! once per frame and [`handle_input`] for each strike; both return the
//! judgments they caused.
//!
//! [`advance`]: JudgmentSession::advance
//! [`handle_input`]: JudgmentSession::handle_input

use log::{debug, info};
use serde::Serialize;
use tja_model::{BranchKind, RollKind, Timeline};

use crate::branch::{BranchResolver, BranchStats};
use crate::clock::PlaybackClock;
use crate::config::{BalloonRule, PlayConfig};
use crate::gauge::SoulGauge;
use crate::judge::{FastSlow, InputEvent, JudgeWindow, Quality, to_us};
use crate::score::{self, ScoreConfig};
use crate::summary::{Crown, QualityCounts, SessionSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoteState {
    Pending,
    Hit(Quality),
    Missed,
    /// Roll start whose interval has not ended.
    Rolling { hits: u32 },
    RollFinished { hits: u32 },
    Popped { hits: u32 },
    Unpopped { hits: u32 },
    /// Belongs to a branch path that was not taken.
    Skipped,
    /// Roll end entry; never judged itself.
    Marker,
}

impl NoteState {
    /// Still waiting for input or for its deadline.
    pub fn is_open(&self) -> bool {
        matches!(self, NoteState::Pending | NoteState::Rolling { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Outcome {
    Hit(Quality),
    Missed,
    RollHit { hits: u32 },
    RollFinished { hits: u32 },
    BalloonPopped { hits: u32 },
    BalloonUnpopped { hits: u32, required: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JudgmentResult {
    pub note_index: usize,
    /// Input time for hits, deadline for misses, end time for finished rolls.
    pub time: f64,
    pub outcome: Outcome,
    /// Input minus note time, single-note hits only.
    pub offset_ms: Option<f64>,
    pub fast_slow: Option<FastSlow>,
    pub score_delta: i64,
    pub combo: u32,
    pub gauge: f64,
    /// Set on the one result whose change exhausted the gauge.
    pub failed: bool,
}

pub struct JudgmentSession<'t> {
    timeline: &'t Timeline,
    window: JudgeWindow,
    score_config: ScoreConfig,
    balloon_rule: BalloonRule,
    input_offset: f64,
    gauge: SoulGauge,
    states: Vec<NoteState>,
    /// Points credited by each roll so far.
    roll_points: Vec<u64>,
    cursor: usize,
    now: f64,
    combo: u32,
    max_combo: u32,
    score: u64,
    counts: QualityCounts,
    resolver: BranchResolver,
    stats: BranchStats,
    paths: Vec<Option<BranchKind>>,
    next_section: usize,
    next_reset: usize,
}

impl<'t> JudgmentSession<'t> {
    pub fn new(timeline: &'t Timeline, config: &PlayConfig) -> Self {
        let states: Vec<NoteState> = timeline
            .notes()
            .iter()
            .map(|note| {
                if note.kind.roll().is_some() {
                    NoteState::Rolling { hits: 0 }
                } else if note.kind.is_single() {
                    NoteState::Pending
                } else {
                    NoteState::Marker
                }
            })
            .collect();
        debug!(
            "session start: {} entries, {} branch sections",
            states.len(),
            timeline.sections().len()
        );

        let mut session = Self {
            timeline,
            window: config.judge,
            score_config: config.score.resolve(timeline),
            balloon_rule: config.balloon_rule,
            input_offset: config.judge_offset_ms / 1000.0,
            gauge: SoulGauge::new(config.gauge.clone()),
            roll_points: vec![0; states.len()],
            states,
            cursor: 0,
            now: f64::NEG_INFINITY,
            combo: 0,
            max_combo: 0,
            score: 0,
            counts: QualityCounts::default(),
            resolver: BranchResolver::new(),
            stats: BranchStats::default(),
            paths: vec![None; timeline.sections().len()],
            next_section: 0,
            next_reset: 0,
        };
        session.refresh_cursor();
        session
    }

    pub fn timeline(&self) -> &'t Timeline {
        self.timeline
    }

    pub fn window(&self) -> &JudgeWindow {
        &self.window
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn gauge(&self) -> f64 {
        self.gauge.value()
    }

    pub fn is_failed(&self) -> bool {
        self.gauge.is_failed()
    }

    pub fn counts(&self) -> &QualityCounts {
        &self.counts
    }

    pub fn branch_stats(&self) -> &BranchStats {
        &self.stats
    }

    pub fn current_branch(&self) -> BranchKind {
        self.resolver.current()
    }

    /// Index of the first unresolved note.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn note_state(&self, index: usize) -> Option<NoteState> {
        self.states.get(index).copied()
    }

    /// Path decided for a branch section, if its checkpoint has passed.
    pub fn section_path(&self, section: usize) -> Option<BranchKind> {
        self.paths.get(section).copied().flatten()
    }

    /// Whether the note is on the path being played.
    pub fn is_note_active(&self, index: usize) -> bool {
        let Some(note) = self.timeline.notes().get(index) else {
            return false;
        };
        match note.section {
            None => true,
            Some(section) => {
                note.branch.is_some() && self.section_path(section) == note.branch
            }
        }
    }

    /// Drumrolls and balloons currently open at the last advanced time.
    pub fn active_rolls(&self) -> usize {
        let notes = self.timeline.notes();
        (self.cursor..notes.len())
            .take_while(|&i| notes[i].time <= self.now)
            .filter(|&i| matches!(self.states[i], NoteState::Rolling { .. }))
            .filter(|&i| self.is_note_active(i))
            .count()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.states.len()
    }

    /// Moves playback time forward, resolving every note whose deadline passed.
    ///
    /// Branch checkpoints and metric resets are applied in time order, each
    /// after the notes due before it. Time never moves backwards.
    pub fn advance(&mut self, now: f64) -> Vec<JudgmentResult> {
        if now < self.now {
            debug!("advance to {:.6}s ignored, already at {:.6}s", now, self.now);
        }
        self.now = self.now.max(now);
        let now = self.now;
        let now_us = to_us(now);
        let timeline = self.timeline;

        let mut results = Vec::new();
        loop {
            let check = timeline
                .sections()
                .get(self.next_section)
                .map(|s| s.check_time)
                .filter(|&t| to_us(t) <= now_us);
            let reset = timeline
                .section_resets()
                .get(self.next_reset)
                .copied()
                .filter(|&t| to_us(t) <= now_us);

            match (check, reset) {
                (Some(c), Some(r)) if r < c => self.reset_metrics(r, &mut results),
                (Some(c), _) => self.checkpoint(c, &mut results),
                (None, Some(r)) => self.reset_metrics(r, &mut results),
                (None, None) => break,
            }
        }
        self.expire(now, &mut results);
        // Rolls are visited by start time but report at their end.
        results.sort_by(|a, b| a.time.total_cmp(&b.time));
        results
    }

    pub fn advance_clock<C: PlaybackClock>(&mut self, clock: &C) -> Vec<JudgmentResult> {
        self.advance(clock.now())
    }

    /// Judges one strike. `None` for a stray input that touched no note.
    pub fn handle_input(&mut self, event: InputEvent) -> Option<JudgmentResult> {
        let timeline = self.timeline;
        let notes = timeline.notes();
        let time = event.time - self.input_offset;
        let time_us = to_us(time);
        let bad_us = self.window.bad_us();

        // Nearest pending note of the lane; the earlier one wins a tie.
        let mut best: Option<(usize, i64, Quality)> = None;
        for (i, note) in notes.iter().enumerate().skip(self.cursor) {
            let note_us = to_us(note.time);
            if note_us > time_us + bad_us {
                break;
            }
            if self.states[i] != NoteState::Pending
                || note.kind.lane() != Some(event.lane)
                || !self.is_note_active(i)
            {
                continue;
            }
            let diff = time_us - note_us;
            let Some(quality) = self.window.judge(diff) else {
                continue;
            };
            if best.is_none_or(|(_, d, _)| diff.abs() < d.abs()) {
                best = Some((i, diff, quality));
            }
        }
        if let Some((index, diff, quality)) = best {
            return Some(self.hit(index, diff, quality, time, event.big));
        }

        for (i, note) in notes.iter().enumerate().skip(self.cursor) {
            if to_us(note.time) > time_us {
                break;
            }
            let (NoteState::Rolling { hits }, Some(roll)) = (self.states[i], note.kind.roll())
            else {
                continue;
            };
            if !roll.accepts(event.lane) || !self.is_note_active(i) {
                continue;
            }
            if time_us < to_us(note.end_time(notes)) {
                return Some(self.roll_hit(i, roll, hits, time));
            }
        }
        None
    }

    /// Advances to the input's own chart time, then judges it.
    pub fn feed(&mut self, event: InputEvent) -> Vec<JudgmentResult> {
        let mut results = self.advance(event.time - self.input_offset);
        results.extend(self.handle_input(event));
        results
    }

    pub fn summary(&self) -> SessionSummary {
        let complete = self.is_finished();
        let cleared = self.gauge.is_cleared();
        SessionSummary {
            score: self.score,
            max_combo: self.max_combo,
            gauge_final: self.gauge.value(),
            counts: self.counts.clone(),
            failed: self.gauge.is_failed(),
            cleared,
            crown: Crown::from_result(&self.counts, cleared && complete),
            branches: self.paths.iter().flatten().copied().collect(),
            complete,
        }
    }

    fn checkpoint(&mut self, time: f64, results: &mut Vec<JudgmentResult>) {
        self.expire(time, results);
        self.decide_section();
    }

    fn reset_metrics(&mut self, time: f64, results: &mut Vec<JudgmentResult>) {
        self.expire(time, results);
        debug!("branch metrics reset at {:.3}s", time);
        self.stats.reset();
        self.next_reset += 1;
    }

    fn decide_section(&mut self) {
        let timeline = self.timeline;
        let index = self.next_section;
        self.next_section += 1;
        let Some(section) = timeline.sections().get(index) else {
            return;
        };

        let chosen = self
            .resolver
            .evaluate(index, &section.condition, &self.stats);
        let path = if section.paths[chosen.index()] {
            chosen
        } else {
            BranchKind::ALL
                .into_iter()
                .find(|k| section.paths[k.index()])
                .unwrap_or(chosen)
        };
        self.paths[index] = Some(path);
        if section.level_hold[path.index()] {
            self.resolver.hold();
        }

        let notes = timeline.notes();
        for i in section.notes.clone() {
            if notes[i].section == Some(index) && notes[i].branch != Some(path) {
                self.states[i] = NoteState::Skipped;
            }
        }
        self.refresh_cursor();
    }

    fn expire(&mut self, horizon: f64, results: &mut Vec<JudgmentResult>) {
        let timeline = self.timeline;
        let notes = timeline.notes();
        let horizon_us = to_us(horizon);
        let bad_us = self.window.bad_us();

        for (i, note) in notes.iter().enumerate().skip(self.cursor) {
            let note_us = to_us(note.time);
            if note_us > horizon_us {
                break;
            }
            if !self.is_note_active(i) {
                continue;
            }
            match self.states[i] {
                NoteState::Pending if horizon_us > note_us + bad_us => {
                    let deadline = (note_us + bad_us) as f64 / 1_000_000.0;
                    results.push(self.miss(i, deadline));
                }
                NoteState::Rolling { hits } => {
                    let end = note.end_time(notes);
                    if horizon_us >= to_us(end) {
                        results.push(self.finish_roll(i, hits, end));
                    }
                }
                _ => {}
            }
        }
        self.refresh_cursor();
    }

    fn refresh_cursor(&mut self) {
        while self.cursor < self.states.len() && !self.states[self.cursor].is_open() {
            self.cursor += 1;
        }
    }

    fn add_score(&mut self, delta: u64) {
        self.score = self.score.saturating_add(delta);
        self.stats.score = self.stats.score.saturating_add(delta);
    }

    fn make_result(
        &self,
        note_index: usize,
        time: f64,
        outcome: Outcome,
        score_delta: i64,
        failed: bool,
    ) -> JudgmentResult {
        JudgmentResult {
            note_index,
            time,
            outcome,
            offset_ms: None,
            fast_slow: None,
            score_delta,
            combo: self.combo,
            gauge: self.gauge.value(),
            failed,
        }
    }

    fn report_failure(&self, failed: bool, time: f64) {
        if failed {
            info!("soul gauge exhausted at {:.3}s", time);
        }
    }

    fn hit(
        &mut self,
        index: usize,
        diff_us: i64,
        quality: Quality,
        time: f64,
        big: bool,
    ) -> JudgmentResult {
        let timeline = self.timeline;
        let note = &timeline.notes()[index];
        self.states[index] = NoteState::Hit(quality);

        let combo_at_hit = self.combo;
        if quality.raises_combo() {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }

        let gogo = timeline.gogo_at(note.time, note.branch);
        let mut delta = score::score_delta(quality, combo_at_hit, gogo, &self.score_config);
        if big && note.kind.is_big() {
            delta = score::big_note_delta(delta, &self.score_config);
        }
        self.add_score(delta);

        let fast_slow = FastSlow::from_diff(diff_us, quality);
        self.counts.record(quality, fast_slow);
        self.stats.record(quality);
        let failed = self.gauge.on_hit(quality);
        self.report_failure(failed, time);

        self.refresh_cursor();

        JudgmentResult {
            offset_ms: Some(diff_us as f64 / 1_000.0),
            fast_slow: Some(fast_slow),
            ..self.make_result(index, time, Outcome::Hit(quality), signed(delta), failed)
        }
    }

    fn miss(&mut self, index: usize, deadline: f64) -> JudgmentResult {
        self.states[index] = NoteState::Missed;
        self.combo = 0;
        self.counts.miss += 1;
        self.stats.miss += 1;
        let failed = self.gauge.on_miss();
        self.report_failure(failed, deadline);
        self.refresh_cursor();
        self.make_result(index, deadline, Outcome::Missed, 0, failed)
    }

    fn roll_hit(&mut self, index: usize, roll: RollKind, hits: u32, time: f64) -> JudgmentResult {
        let timeline = self.timeline;
        let note = &timeline.notes()[index];
        let hits = hits + 1;
        let gogo = timeline.gogo_at(note.time, note.branch);
        let mut delta = score::roll_tick_delta(roll, hits, gogo, &self.score_config);

        self.counts.roll_hits += 1;
        self.stats.roll_hits += 1;
        let failed = self.gauge.on_roll_tick();

        let outcome = match roll {
            RollKind::Balloon { required_hits } if hits >= required_hits => {
                delta = delta.saturating_add(score::balloon_pop_delta(gogo, &self.score_config));
                self.states[index] = NoteState::Popped { hits };
                self.counts.balloons_popped += 1;
                Outcome::BalloonPopped { hits }
            }
            _ => {
                self.states[index] = NoteState::Rolling { hits };
                Outcome::RollHit { hits }
            }
        };
        self.roll_points[index] = self.roll_points[index].saturating_add(delta);
        self.add_score(delta);
        self.refresh_cursor();
        self.make_result(index, time, outcome, signed(delta), failed)
    }

    fn finish_roll(&mut self, index: usize, hits: u32, end: f64) -> JudgmentResult {
        match self.timeline.notes()[index].kind.roll() {
            Some(RollKind::Balloon { required_hits }) => {
                self.states[index] = NoteState::Unpopped { hits };
                self.counts.balloons_unpopped += 1;
                let delta = match self.balloon_rule {
                    BalloonRule::Partial => 0,
                    BalloonRule::Forfeit => {
                        let taken = std::mem::take(&mut self.roll_points[index]);
                        self.score = self.score.saturating_sub(taken);
                        self.stats.score = self.stats.score.saturating_sub(taken);
                        -signed(taken)
                    }
                };
                let outcome = Outcome::BalloonUnpopped {
                    hits,
                    required: required_hits,
                };
                self.make_result(index, end, outcome, delta, false)
            }
            _ => {
                self.states[index] = NoteState::RollFinished { hits };
                self.make_result(index, end, Outcome::RollFinished { hits }, 0, false)
            }
        }
    }
}

fn signed(delta: u64) -> i64 {
    i64::try_from(delta).unwrap_or(i64::MAX)
}
