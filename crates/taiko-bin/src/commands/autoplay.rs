use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use taiko_play::{AutoPlayer, InputLog, run_autoplay, start_session};

use super::{PlayTarget, frame_seconds};

pub fn run(target: &PlayTarget, frame_ms: f64, record: Option<&Path>) -> Result<()> {
    let frame = frame_seconds(frame_ms)?;
    let prepared = target.prepare()?;

    let mut session = start_session(&prepared.timeline, &prepared.config);
    let mut player = AutoPlayer::new(&prepared.config);
    let recorded = run_autoplay(&mut session, &mut player, frame);

    let summary = session.summary();
    info!(
        "autoplay finished: score {} crown {}",
        summary.score,
        summary.crown.as_str()
    );

    if let Some(path) = record {
        InputLog::new(recorded)?
            .save_to(path)
            .with_context(|| format!("saving input log {}", path.display()))?;
        info!("input log saved to {}", path.display());
    }
    super::print_summary(&summary)
}
