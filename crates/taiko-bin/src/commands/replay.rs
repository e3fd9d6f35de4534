use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use taiko_play::{InputLog, replay, start_session};

use super::{PlayTarget, frame_seconds};

pub fn run(target: &PlayTarget, inputs: &Path, frame_ms: f64, judgments: bool) -> Result<()> {
    let frame = frame_seconds(frame_ms)?;
    let prepared = target.prepare()?;
    let log = InputLog::load_from(inputs)
        .with_context(|| format!("loading input log {}", inputs.display()))?;
    info!("replaying {} inputs", log.len());

    let mut session = start_session(&prepared.timeline, &prepared.config);
    let results = replay(&mut session, &log, frame);

    if judgments {
        for result in &results {
            println!("{}", serde_json::to_string(result)?);
        }
    }
    super::print_summary(&session.summary())
}
