use tja_model::{NoteKind, RollKind};

use crate::config::PlayConfig;
use crate::judge::{InputEvent, to_us};
use crate::session::JudgmentSession;

/// Strikes per second used for drumrolls and balloons.
pub const DEFAULT_ROLL_RATE: f64 = 20.0;

/// Generates perfect input for whatever path a session is playing.
///
/// Inputs are produced lazily, one window at a time, so branch sections are
/// only played once their path has been decided.
#[derive(Debug, Clone)]
pub struct AutoPlayer {
    roll_interval: f64,
    input_offset: f64,
    /// Start of the next window to generate.
    from: f64,
}

impl AutoPlayer {
    pub fn new(config: &PlayConfig) -> Self {
        Self::with_roll_rate(config, DEFAULT_ROLL_RATE)
    }

    pub fn with_roll_rate(config: &PlayConfig, rate: f64) -> Self {
        Self {
            roll_interval: 1.0 / rate.max(1.0),
            input_offset: config.judge_offset_ms / 1000.0,
            from: f64::NEG_INFINITY,
        }
    }

    /// Inputs with chart time in `(previous to, to]`, sorted by time.
    pub fn inputs_until(&mut self, session: &JudgmentSession<'_>, to: f64) -> Vec<InputEvent> {
        let from = self.from;
        if to <= from {
            return Vec::new();
        }
        self.from = to;

        let notes = session.timeline().notes();
        let in_window = |t: f64| t > from && t <= to;
        let mut inputs = Vec::new();

        for (i, note) in notes.iter().enumerate().skip(session.cursor()) {
            if note.time > to {
                break;
            }
            if !session.is_note_active(i) {
                continue;
            }
            match note.kind {
                kind if kind.is_single() => {
                    if let (Some(lane), true) = (kind.lane(), in_window(note.time)) {
                        inputs.push(InputEvent {
                            time: note.time,
                            lane,
                            big: kind.is_big(),
                        });
                    }
                }
                NoteKind::DrumrollStart { .. } | NoteKind::BalloonStart { .. } => {
                    let Some(roll) = note.kind.roll() else {
                        continue;
                    };
                    let end = note.end_time(notes);
                    for time in self.roll_ticks(roll, note.time, end, session) {
                        if in_window(time) {
                            inputs.push(InputEvent::don(time));
                        }
                    }
                }
                _ => {}
            }
        }

        inputs.sort_by(|a, b| a.time.total_cmp(&b.time));
        for input in &mut inputs {
            input.time += self.input_offset;
        }
        inputs
    }

    /// Tick times for a whole roll interval, independent of the window.
    fn roll_ticks(
        &self,
        roll: RollKind,
        start: f64,
        end: f64,
        session: &JudgmentSession<'_>,
    ) -> Vec<f64> {
        let span = end - start;
        if span <= 0.0 {
            return Vec::new();
        }
        match roll {
            RollKind::Drumroll { .. } => {
                // Leave the tail clear so the last tick never lands on a following note.
                let cutoff = to_us(end) - session.window().bad_us();
                (0..)
                    .map(|k| start + k as f64 * self.roll_interval)
                    .take_while(|&t| to_us(t) < to_us(end))
                    .enumerate()
                    .filter(|&(k, t)| k == 0 || to_us(t) <= cutoff)
                    .map(|(_, t)| t)
                    .collect()
            }
            RollKind::Balloon { required_hits } => {
                if required_hits == 0 {
                    return Vec::new();
                }
                let step = self.roll_interval.min(span / required_hits as f64);
                (0..required_hits)
                    .map(|k| start + k as f64 * step)
                    .take_while(|&t| to_us(t) < to_us(end))
                    .collect()
            }
        }
    }
}

/// Plays a session to the end with perfect input, in `frame` second steps.
///
/// Returns the inputs that were fed, ready to be saved as an input log.
pub fn run_autoplay(
    session: &mut JudgmentSession<'_>,
    player: &mut AutoPlayer,
    frame: f64,
) -> Vec<InputEvent> {
    let frame = frame.max(0.001);
    let end = session.timeline().end_time() + session.window().bad_us() as f64 / 1e6 + frame;
    let mut now = session
        .timeline()
        .notes()
        .first()
        .map_or(0.0, |n| n.time.min(0.0))
        - frame;
    let mut fed = Vec::new();
    while now <= end && !session.is_finished() {
        now += frame;
        for input in player.inputs_until(session, now) {
            session.feed(input);
            fed.push(input);
        }
        session.advance(now);
    }
    session.advance(end);
    fed
}
