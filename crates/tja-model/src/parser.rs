//! Line-oriented TJA chart parser.
//!
//! Produces a [`ParsedChart`] with the song header and one [`Course`] per
//! `#START` ... `#END` body. Malformed commands and header values are
//! recorded as warnings; only structural problems are fatal.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::chart::{
    BranchBlock, BranchCondition, BranchKind, BranchMetric, Course, Difficulty, Measure,
    MeasureEvent, ParsedChart, Segment, Song, StateChange,
};
use crate::error::{FormatError, FormatErrorKind, ParseWarning};
use crate::note::NoteKind;

/// Hits required by a balloon with no declared count.
pub const DEFAULT_BALLOON_HITS: u32 = 5;

/// Header keys that carry presentation data the core does not use.
const IGNORED_KEYS: &[&str] = &[
    "SONGVOL", "SEVOL", "SCOREMODE", "SIDE", "LIFE", "STYLE", "GAME", "HEADSCROLL", "BGIMAGE",
    "BGMOVIE", "MOVIEOFFSET", "MAKER", "NOTESDESIGNER", "TOWERTYPE", "EXAM",
];

pub fn parse(text: &str) -> Result<ParsedChart, FormatError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut parser = Parser::default();
    for (idx, raw) in normalized.split('\n').enumerate() {
        parser.line(idx + 1, raw)?;
    }
    parser.finish()
}

fn push_warning(warnings: &mut Vec<ParseWarning>, line: usize, message: impl Into<String>) {
    let message = message.into();
    warn!("line {}: {}", line, message);
    warnings.push(ParseWarning { line, message });
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// `KEY:VALUE` with an alphanumeric key. Note data never contains `:`.
fn split_header(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((key, value.trim()))
}

fn split_command(line: &str) -> (&str, &str) {
    let body = &line[1..];
    let end = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    (&body[..end], body[end..].trim())
}

fn parse_number_list(value: &str) -> Result<Vec<u32>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().map_err(|_| s.to_string()))
        .collect()
}

fn parse_branch_condition(arg: &str) -> Option<BranchCondition> {
    let mut parts = arg.split(',').map(str::trim);
    let metric = match parts.next()? {
        "p" => BranchMetric::Accuracy,
        "r" => BranchMetric::Drumroll,
        "s" => BranchMetric::Score,
        _ => return None,
    };
    let expert = parts.next()?.parse::<f64>().ok()?;
    let master = parts.next()?.parse::<f64>().ok()?;
    Some(BranchCondition {
        metric,
        expert,
        master,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenRoll {
    Drumroll,
    Balloon,
    Kusudama,
}

/// Course-level header values collected before `#START`.
#[derive(Debug, Default)]
struct CourseHeader {
    difficulty: Option<Difficulty>,
    level: u32,
    /// Common list, then the normal/expert/master overrides.
    balloons: [Vec<u32>; 4],
    score_init: Option<u32>,
    score_diff: Option<u32>,
}

impl CourseHeader {
    fn balloon_list(&self, path: Option<BranchKind>) -> usize {
        match path {
            Some(kind) if !self.balloons[kind.index() + 1].is_empty() => kind.index() + 1,
            _ => 0,
        }
    }
}

/// State carried from measure to measure along one path.
#[derive(Debug, Clone)]
struct PathState {
    numerator: u32,
    denominator: u32,
    scroll: f64,
    gogo: bool,
    barline: bool,
    pending_bpm: Option<f64>,
    pending_delay: f64,
    pending_section: bool,
    pending_level_hold: bool,
    open_roll: Option<OpenRoll>,
    balloon_cursors: [usize; 4],
}

impl Default for PathState {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
            scroll: 1.0,
            gogo: false,
            barline: true,
            pending_bpm: None,
            pending_delay: 0.0,
            pending_section: false,
            pending_level_hold: false,
            open_roll: None,
            balloon_cursors: [0; 4],
        }
    }
}

struct OpenBranch {
    block: BranchBlock,
    entry: PathState,
    current: Option<BranchKind>,
    exits: [Option<PathState>; 3],
}

struct CourseBody {
    start_line: usize,
    header: CourseHeader,
    difficulty: Difficulty,
    segments: Vec<Segment>,
    state: PathState,
    open: Option<Measure>,
    branch: Option<OpenBranch>,
}

impl CourseBody {
    fn new(start_line: usize, difficulty: Difficulty, header: CourseHeader) -> Self {
        Self {
            start_line,
            header,
            difficulty,
            segments: Vec::new(),
            state: PathState::default(),
            open: None,
            branch: None,
        }
    }

    fn current_path(&self) -> Option<BranchKind> {
        self.branch.as_ref().and_then(|b| b.current)
    }

    fn open_measure(&mut self, line: usize, warnings: &mut Vec<ParseWarning>) -> &mut Measure {
        if let Some(branch) = self.branch.as_mut().filter(|b| b.current.is_none()) {
            push_warning(
                warnings,
                line,
                "note data inside #BRANCHSTART before #N/#E/#M; using the normal path",
            );
            branch.current = Some(BranchKind::Normal);
            branch.block.paths[0].get_or_insert_with(Vec::new);
            self.state = branch.entry.clone();
        }

        let state = &mut self.state;
        self.open.get_or_insert_with(|| Measure {
            numerator: state.numerator,
            denominator: state.denominator,
            bpm: state.pending_bpm.take(),
            scroll: state.scroll,
            gogo: state.gogo,
            barline: state.barline,
            delay: std::mem::take(&mut state.pending_delay),
            section_reset: std::mem::take(&mut state.pending_section),
            level_hold: std::mem::take(&mut state.pending_level_hold),
            notes: Vec::new(),
            events: Vec::new(),
            line,
        })
    }

    fn close_measure(&mut self) {
        let Some(measure) = self.open.take() else {
            return;
        };
        match self.branch.as_mut() {
            Some(branch) => {
                let kind = branch.current.unwrap_or(BranchKind::Normal);
                branch.block.paths[kind.index()]
                    .get_or_insert_with(Vec::new)
                    .push(measure);
            }
            None => self.segments.push(Segment::Measure(measure)),
        }
    }

    /// Closes a measure left open by a structural command.
    fn close_measure_early(&mut self, line: usize, warnings: &mut Vec<ParseWarning>) {
        if self.open.is_some() {
            push_warning(warnings, line, "measure not terminated with ','; closing it here");
            self.close_measure();
        }
    }

    fn record_event(&mut self, change: StateChange) {
        if let Some(measure) = self.open.as_mut() {
            measure.events.push(MeasureEvent {
                position: measure.notes.len(),
                change,
            });
        }
    }

    fn next_balloon_count(&mut self) -> u32 {
        let list = self.header.balloon_list(self.current_path());
        let cursor = &mut self.state.balloon_cursors[list];
        let count = self.header.balloons[list]
            .get(*cursor)
            .copied()
            .unwrap_or(DEFAULT_BALLOON_HITS);
        *cursor += 1;
        count.max(1)
    }

    fn decode_token(
        &mut self,
        token: char,
        line: usize,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<NoteKind, FormatError> {
        let kind = match token {
            '0' | 'C' | 'F' | 'G' => NoteKind::Rest,
            '1' | 'n' | 'd' | 'o' => NoteKind::Don,
            '2' | 't' | 'k' => NoteKind::Katsu,
            '3' | 'A' => NoteKind::BigDon,
            '4' | 'B' => NoteKind::BigKatsu,
            '5' | '6' | '7' | '9' => self.open_roll(token, line, warnings),
            '8' => match self.state.open_roll.take() {
                Some(OpenRoll::Drumroll) => NoteKind::DrumrollEnd,
                Some(OpenRoll::Balloon) | Some(OpenRoll::Kusudama) => NoteKind::BalloonEnd,
                None => {
                    push_warning(warnings, line, "'8' without an open drumroll or balloon");
                    NoteKind::Rest
                }
            },
            other => {
                return Err(FormatError::new(line, FormatErrorKind::UnknownToken(other)));
            }
        };
        Ok(kind)
    }

    fn open_roll(&mut self, token: char, line: usize, warnings: &mut Vec<ParseWarning>) -> NoteKind {
        if let Some(open) = self.state.open_roll {
            // A repeated kusudama marker just extends the open kusudama.
            if !(token == '9' && open == OpenRoll::Kusudama) {
                push_warning(
                    warnings,
                    line,
                    format!("'{}' while a roll is still open; ignored", token),
                );
            }
            return NoteKind::Rest;
        }
        let (roll, kind) = match token {
            '5' => (OpenRoll::Drumroll, NoteKind::DrumrollStart { big: false }),
            '6' => (OpenRoll::Drumroll, NoteKind::DrumrollStart { big: true }),
            '7' => (
                OpenRoll::Balloon,
                NoteKind::BalloonStart {
                    required_hits: self.next_balloon_count(),
                },
            ),
            _ => (
                OpenRoll::Kusudama,
                NoteKind::BalloonStart {
                    required_hits: self.next_balloon_count(),
                },
            ),
        };
        self.state.open_roll = Some(roll);
        kind
    }

    fn data(
        &mut self,
        data: &str,
        line: usize,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<(), FormatError> {
        for ch in data.chars().filter(|c| !c.is_whitespace()) {
            if ch == ',' {
                self.open_measure(line, warnings);
                self.close_measure();
                continue;
            }
            let kind = self.decode_token(ch, line, warnings)?;
            self.open_measure(line, warnings).notes.push(kind);
        }
        Ok(())
    }

    fn start_branch(&mut self, arg: &str, line: usize, warnings: &mut Vec<ParseWarning>) {
        self.close_measure_early(line, warnings);
        self.end_branch();
        let condition = parse_branch_condition(arg).unwrap_or_else(|| {
            push_warning(
                warnings,
                line,
                format!("malformed #BRANCHSTART '{}'; branch never leaves normal", arg),
            );
            BranchCondition::unreachable()
        });
        self.branch = Some(OpenBranch {
            block: BranchBlock {
                condition,
                paths: [None, None, None],
                line,
            },
            entry: self.state.clone(),
            current: None,
            exits: [None, None, None],
        });
    }

    fn select_path(&mut self, kind: BranchKind, line: usize, warnings: &mut Vec<ParseWarning>) {
        self.close_measure_early(line, warnings);
        let Some(branch) = self.branch.as_mut() else {
            push_warning(warnings, line, "branch path marker outside #BRANCHSTART; ignored");
            return;
        };
        if let Some(current) = branch.current {
            branch.exits[current.index()] = Some(self.state.clone());
        }
        if branch.block.paths[kind.index()].is_some() {
            push_warning(
                warnings,
                line,
                format!("{:?} path declared twice; appending", kind),
            );
        }
        branch.block.paths[kind.index()].get_or_insert_with(Vec::new);
        branch.current = Some(kind);
        self.state = branch.entry.clone();
    }

    /// Closes the open branch block, continuing from the normal path's state.
    fn end_branch(&mut self) {
        let Some(mut branch) = self.branch.take() else {
            return;
        };
        if let Some(current) = branch.current {
            branch.exits[current.index()] = Some(self.state.clone());
        }
        let [normal, expert, master] = branch.exits;
        self.state = normal.or(expert).or(master).unwrap_or(branch.entry);
        self.segments.push(Segment::Branch(branch.block));
    }

    fn command(
        &mut self,
        name: &str,
        arg: &str,
        line: usize,
        warnings: &mut Vec<ParseWarning>,
    ) {
        match name {
            "BPMCHANGE" => match arg.parse::<f64>() {
                Ok(bpm) => self.state.pending_bpm = Some(bpm),
                Err(_) => push_warning(warnings, line, format!("bad #BPMCHANGE value '{}'", arg)),
            },
            "MEASURE" => {
                let signature = arg
                    .split_once('/')
                    .and_then(|(n, d)| Some((n.trim().parse::<u32>().ok()?, d.trim().parse::<u32>().ok()?)))
                    .filter(|&(n, d)| n > 0 && d > 0);
                match signature {
                    Some((n, d)) => {
                        self.state.numerator = n;
                        self.state.denominator = d;
                    }
                    None => push_warning(warnings, line, format!("bad #MEASURE value '{}'", arg)),
                }
            }
            "SCROLL" => match arg.parse::<f64>() {
                Ok(scroll) => {
                    self.state.scroll = scroll;
                    self.record_event(StateChange::Scroll(scroll));
                }
                Err(_) => push_warning(warnings, line, format!("bad #SCROLL value '{}'", arg)),
            },
            "GOGOSTART" => {
                self.state.gogo = true;
                self.record_event(StateChange::GogoStart);
            }
            "GOGOEND" => {
                self.state.gogo = false;
                self.record_event(StateChange::GogoEnd);
            }
            "BARLINEON" => self.state.barline = true,
            "BARLINEOFF" => self.state.barline = false,
            "DELAY" => match arg.parse::<f64>() {
                Ok(delay) if delay.is_finite() && delay >= 0.0 => self.state.pending_delay += delay,
                _ => push_warning(warnings, line, format!("bad #DELAY value '{}'", arg)),
            },
            "SECTION" => self.state.pending_section = true,
            "LEVELHOLD" => match self.open.as_mut() {
                Some(measure) => measure.level_hold = true,
                None => self.state.pending_level_hold = true,
            },
            "BRANCHSTART" => self.start_branch(arg, line, warnings),
            "N" => self.select_path(BranchKind::Normal, line, warnings),
            "E" => self.select_path(BranchKind::Expert, line, warnings),
            "M" => self.select_path(BranchKind::Master, line, warnings),
            "BRANCHEND" => {
                if self.branch.is_none() {
                    push_warning(warnings, line, "#BRANCHEND without #BRANCHSTART");
                } else {
                    self.close_measure_early(line, warnings);
                    self.end_branch();
                }
            }
            "START" => push_warning(warnings, line, "nested #START; ignored"),
            _ => push_warning(warnings, line, format!("unsupported command #{}", name)),
        }
    }

    fn finish(
        mut self,
        line: usize,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<Course, FormatError> {
        if let Some(branch) = &self.branch {
            return Err(FormatError::new(
                branch.block.line,
                FormatErrorKind::UnterminatedBranch,
            ));
        }
        self.close_measure_early(line, warnings);
        if self.state.open_roll.is_some() {
            push_warning(warnings, line, "roll still open at #END; it ends with the course");
        }

        Ok(Course {
            difficulty: self.difficulty,
            level: self.header.level,
            score_init: self.header.score_init,
            score_diff: self.header.score_diff,
            segments: self.segments,
            line: self.start_line,
        })
    }
}

#[derive(Default)]
struct Parser {
    song: Song,
    courses: BTreeMap<Difficulty, Course>,
    warnings: Vec<ParseWarning>,
    header: CourseHeader,
    body: Option<CourseBody>,
}

impl Parser {
    fn line(&mut self, line: usize, raw: &str) -> Result<(), FormatError> {
        let text = strip_comment(raw).trim();
        if text.is_empty() {
            return Ok(());
        }

        if text.starts_with('#') {
            let (name, arg) = split_command(text);
            let name = name.to_ascii_uppercase();
            return self.command(&name, arg, line);
        }

        if let Some((key, value)) = split_header(text) {
            if self.body.is_some() {
                push_warning(
                    &mut self.warnings,
                    line,
                    format!("header {} inside a course body; ignored", key),
                );
            } else {
                self.header_field(&key.to_ascii_uppercase(), value, line);
            }
            return Ok(());
        }

        match self.body.as_mut() {
            Some(body) => body.data(text, line, &mut self.warnings),
            None => {
                push_warning(&mut self.warnings, line, "note data outside #START/#END; ignored");
                Ok(())
            }
        }
    }

    fn command(&mut self, name: &str, arg: &str, line: usize) -> Result<(), FormatError> {
        match name {
            "START" if self.body.is_none() => {
                let Some(difficulty) = self.header.difficulty else {
                    return Err(FormatError::new(line, FormatErrorKind::MissingCourseLabel));
                };
                if !arg.is_empty() {
                    push_warning(
                        &mut self.warnings,
                        line,
                        format!("#START {} player side ignored", arg),
                    );
                }
                let header = std::mem::take(&mut self.header);
                debug!("course {} starts at line {}", difficulty, line);
                self.body = Some(CourseBody::new(line, difficulty, header));
            }
            "END" if self.body.is_some() => {
                if let Some(body) = self.body.take() {
                    let course = body.finish(line, &mut self.warnings)?;
                    if self.courses.contains_key(&course.difficulty) {
                        push_warning(
                            &mut self.warnings,
                            line,
                            format!("course {} declared twice; keeping the last", course.difficulty),
                        );
                    }
                    self.courses.insert(course.difficulty, course);
                }
            }
            _ => match self.body.as_mut() {
                Some(body) => body.command(name, arg, line, &mut self.warnings),
                None => push_warning(
                    &mut self.warnings,
                    line,
                    format!("#{} outside a course body; ignored", name),
                ),
            },
        }
        Ok(())
    }

    fn header_field(&mut self, key: &str, value: &str, line: usize) {
        let warnings = &mut self.warnings;
        match key {
            "TITLE" => self.song.title = value.to_string(),
            "SUBTITLE" => {
                let stripped = value
                    .strip_prefix("--")
                    .or_else(|| value.strip_prefix("++"))
                    .unwrap_or(value);
                self.song.subtitle = stripped.to_string();
            }
            "TITLECN" => self.song.title_alt = Some(value.to_string()),
            "SUBTITLECN" => self.song.subtitle_alt = Some(value.to_string()),
            "WAVE" => self.song.wave = Some(value.to_string()),
            "GENRE" => self.song.genre = value.to_string(),
            "BPM" | "OFFSET" | "DEMOSTART" => match value.parse::<f64>() {
                Ok(v) if key == "BPM" => self.song.bpm = v,
                Ok(v) if key == "OFFSET" => self.song.offset = v,
                Ok(v) => self.song.demo_start = v,
                Err(_) => push_warning(warnings, line, format!("bad {} value '{}'", key, value)),
            },
            "COURSE" => match Difficulty::from_label(value) {
                Some(d) => self.header.difficulty = Some(d),
                None => push_warning(warnings, line, format!("unknown COURSE '{}'", value)),
            },
            "LEVEL" => match value.parse::<u32>() {
                Ok(level) => self.header.level = level,
                Err(_) => push_warning(warnings, line, format!("bad LEVEL value '{}'", value)),
            },
            "BALLOON" | "BALLOONNOR" | "BALLOONEXP" | "BALLOONMAS" => {
                let slot = match key {
                    "BALLOON" => 0,
                    "BALLOONNOR" => 1,
                    "BALLOONEXP" => 2,
                    _ => 3,
                };
                match parse_number_list(value) {
                    Ok(counts) => self.header.balloons[slot] = counts,
                    Err(bad) => {
                        push_warning(warnings, line, format!("bad {} entry '{}'", key, bad))
                    }
                }
            }
            "SCOREINIT" | "SCOREDIFF" => {
                let first = value.split(',').next().unwrap_or("").trim();
                match first.parse::<u32>() {
                    Ok(v) if key == "SCOREINIT" => self.header.score_init = Some(v),
                    Ok(v) => self.header.score_diff = Some(v),
                    Err(_) if first.is_empty() => {}
                    Err(_) => {
                        push_warning(warnings, line, format!("bad {} value '{}'", key, value))
                    }
                }
            }
            _ if IGNORED_KEYS.contains(&key) => {}
            _ => push_warning(warnings, line, format!("unknown header {}", key)),
        }
    }

    fn finish(self) -> Result<ParsedChart, FormatError> {
        if let Some(body) = &self.body {
            return Err(FormatError::new(
                body.start_line,
                FormatErrorKind::UnterminatedCourse,
            ));
        }
        if self.song.title.trim().is_empty() {
            return Err(FormatError::new(0, FormatErrorKind::MissingTitle));
        }
        if self.courses.is_empty() {
            return Err(FormatError::new(0, FormatErrorKind::MissingCourseBody));
        }
        debug!(
            "parsed '{}': {} course(s), {} warning(s)",
            self.song.title,
            self.courses.len(),
            self.warnings.len()
        );
        Ok(ParsedChart {
            song: self.song,
            courses: self.courses,
            warnings: self.warnings,
        })
    }
}
