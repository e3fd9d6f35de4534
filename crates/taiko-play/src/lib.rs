//! Live play of a taiko timeline: judgment, scoring, soul gauge and branch
//! selection, driven by an external playback clock.

pub mod autoplay;
pub mod branch;
pub mod clock;
pub mod config;
pub mod gauge;
pub mod judge;
pub mod replay;
pub mod score;
pub mod session;
pub mod summary;

pub use autoplay::{AutoPlayer, DEFAULT_ROLL_RATE, run_autoplay};
pub use branch::{BranchDecision, BranchResolver, BranchStats, select_branch};
pub use clock::{ManualClock, PlaybackClock};
pub use config::{BalloonRule, PlayConfig};
pub use gauge::{GaugeConfig, SoulGauge};
pub use judge::{FastSlow, InputEvent, JudgeWindow, Quality, to_us};
pub use replay::{InputLog, ReplayError, replay};
pub use score::{ScoreConfig, ScoreMode, shinuchi_note_points};
pub use session::{JudgmentResult, JudgmentSession, NoteState, Outcome};
pub use summary::{Crown, QualityCounts, SessionSummary};

use tja_model::Timeline;

/// Starts a session over `timeline` with all counters at zero.
pub fn start_session<'t>(timeline: &'t Timeline, config: &PlayConfig) -> JudgmentSession<'t> {
    JudgmentSession::new(timeline, config)
}

pub fn session_summary(session: &JudgmentSession<'_>) -> SessionSummary {
    session.summary()
}
