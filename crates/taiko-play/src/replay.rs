//! Recorded input logs and their playback through a session.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::judge::InputEvent;
use crate::session::{JudgmentResult, JudgmentSession};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to access input log {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input log: {0}")]
    Json(#[from] serde_json::Error),

    #[error("input {index} has a non-finite time")]
    NonFinite { index: usize },

    #[error("input {index} at {time:.6}s is earlier than the input before it")]
    OutOfOrder { index: usize, time: f64 },
}

/// Strikes in the order they were made, times on the playback clock.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InputLog {
    events: Vec<InputEvent>,
}

impl InputLog {
    pub fn new(events: Vec<InputEvent>) -> Result<Self, ReplayError> {
        let mut last = f64::NEG_INFINITY;
        for (index, event) in events.iter().enumerate() {
            if !event.time.is_finite() {
                return Err(ReplayError::NonFinite { index });
            }
            if event.time < last {
                return Err(ReplayError::OutOfOrder {
                    index,
                    time: event.time,
                });
            }
            last = event.time;
        }
        Ok(Self { events })
    }

    pub fn from_json(text: &str) -> Result<Self, ReplayError> {
        let events: Vec<InputEvent> = serde_json::from_str(text)?;
        Self::new(events)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ReplayError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Steps the clock `frame` seconds at a time, feeding each input in the frame
/// it falls in. Returns every judgment in emission order.
///
/// Stepping stops once every note is past its window; inputs logged after
/// that are fed in one go and can only land as strays.
pub fn replay(
    session: &mut JudgmentSession<'_>,
    log: &InputLog,
    frame: f64,
) -> Vec<JudgmentResult> {
    let frame = frame.max(0.001);
    let timeline = session.timeline();
    let end = timeline.end_time() + session.window().bad_us() as f64 / 1_000_000.0;
    let first_note = timeline.notes().first().map_or(0.0, |n| n.time);

    let mut now = first_note.min(0.0) - frame;
    let mut events = log.events.iter().copied().peekable();
    let mut results = Vec::new();
    while now <= end {
        now += frame;
        while let Some(event) = events.next_if(|e| e.time <= now) {
            results.extend(session.feed(event));
        }
        results.extend(session.advance(now));
    }
    let strays = events.len();
    if strays > 0 {
        debug!("{} inputs logged after the chart ended", strays);
    }
    for event in events {
        results.extend(session.feed(event));
    }
    results
}
