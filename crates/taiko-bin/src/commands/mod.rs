//! Subcommand implementations.

pub mod autoplay;
pub mod info;
pub mod replay;

use anyhow::{Context, Result, anyhow, bail};
use log::info;
use std::path::{Path, PathBuf};
use taiko_play::{PlayConfig, SessionSummary};
use tja_model::{BranchKind, Difficulty, ParsedChart, Timeline, build_timeline, load_chart_file};

/// Chart, course and settings shared by the play commands.
pub struct PlayTarget {
    pub chart: PathBuf,
    pub course: Difficulty,
    pub branch: Option<BranchKind>,
    pub config: Option<PathBuf>,
}

pub struct Prepared {
    pub timeline: Timeline,
    pub config: PlayConfig,
}

impl PlayTarget {
    pub fn prepare(&self) -> Result<Prepared> {
        let chart = load_chart(&self.chart)?;
        let course = chart.course(self.course).ok_or_else(|| {
            anyhow!(
                "{} has no {} course",
                self.chart.display(),
                self.course.name()
            )
        })?;
        let timeline = build_timeline(&chart.song, course, self.branch)
            .with_context(|| format!("building timeline for {}", self.course))?;

        let config = match &self.config {
            Some(path) => PlayConfig::load_from(path)
                .with_context(|| format!("loading play config {}", path.display()))?,
            None => PlayConfig::for_course(course),
        };
        info!(
            "{} [{}] {} notes, {:.1}s",
            chart.song.title,
            self.course,
            timeline.playable_note_count(),
            timeline.duration()
        );
        Ok(Prepared {
            timeline,
            config,
        })
    }
}

pub fn load_chart(path: &Path) -> Result<ParsedChart> {
    let chart =
        load_chart_file(path).with_context(|| format!("loading chart {}", path.display()))?;
    for warning in &chart.warnings {
        log::warn!("{}: {}", path.display(), warning);
    }
    Ok(chart)
}

/// Clock step in seconds; the loops never advance with a non-positive step.
pub fn frame_seconds(frame_ms: f64) -> Result<f64> {
    if !(frame_ms.is_finite() && frame_ms > 0.0) {
        bail!("--frame-ms must be a positive number of milliseconds, got {}", frame_ms);
    }
    Ok(frame_ms / 1000.0)
}

pub fn print_summary(summary: &SessionSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
