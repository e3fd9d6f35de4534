use serde::{Deserialize, Serialize};

/// Strike category an input or single note belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    Don,
    Katsu,
}

/// Sustained note behaviour between a start and its end entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollKind {
    /// Uncapped hit counter, any lane.
    Drumroll { big: bool },
    /// Capped hit counter, don strikes only.
    Balloon { required_hits: u32 },
}

impl RollKind {
    pub fn accepts(&self, lane: Lane) -> bool {
        match self {
            RollKind::Drumroll { .. } => true,
            RollKind::Balloon { .. } => lane == Lane::Don,
        }
    }
}

/// Every note variant a chart slot can hold.
///
/// Behaviour that differs per variant lives in the methods below so that a
/// new variant only has to be added here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteKind {
    Rest,
    Don,
    Katsu,
    BigDon,
    BigKatsu,
    DrumrollStart { big: bool },
    DrumrollEnd,
    BalloonStart { required_hits: u32 },
    BalloonEnd,
}

impl NoteKind {
    /// Lane a single-hit note must be struck on. `None` for everything else.
    pub fn lane(&self) -> Option<Lane> {
        match self {
            NoteKind::Don | NoteKind::BigDon => Some(Lane::Don),
            NoteKind::Katsu | NoteKind::BigKatsu => Some(Lane::Katsu),
            _ => None,
        }
    }

    pub fn is_single(&self) -> bool {
        self.lane().is_some()
    }

    pub fn is_big(&self) -> bool {
        matches!(
            self,
            NoteKind::BigDon | NoteKind::BigKatsu | NoteKind::DrumrollStart { big: true }
        )
    }

    pub fn roll(&self) -> Option<RollKind> {
        match *self {
            NoteKind::DrumrollStart { big } => Some(RollKind::Drumroll { big }),
            NoteKind::BalloonStart { required_hits } => Some(RollKind::Balloon { required_hits }),
            _ => None,
        }
    }

    pub fn is_roll_end(&self) -> bool {
        matches!(self, NoteKind::DrumrollEnd | NoteKind::BalloonEnd)
    }

    /// Entry the judgment engine acts on (single notes and roll starts).
    pub fn is_judged(&self) -> bool {
        self.is_single() || self.roll().is_some()
    }

    /// Short display name used by the CLI and logs.
    pub fn name(&self) -> &'static str {
        match self {
            NoteKind::Rest => "rest",
            NoteKind::Don => "don",
            NoteKind::Katsu => "katsu",
            NoteKind::BigDon => "big don",
            NoteKind::BigKatsu => "big katsu",
            NoteKind::DrumrollStart { big: false } => "drumroll",
            NoteKind::DrumrollStart { big: true } => "big drumroll",
            NoteKind::DrumrollEnd => "drumroll end",
            NoteKind::BalloonStart { .. } => "balloon",
            NoteKind::BalloonEnd => "balloon end",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_table() {
        assert_eq!(NoteKind::Don.lane(), Some(Lane::Don));
        assert_eq!(NoteKind::BigDon.lane(), Some(Lane::Don));
        assert_eq!(NoteKind::Katsu.lane(), Some(Lane::Katsu));
        assert_eq!(NoteKind::BigKatsu.lane(), Some(Lane::Katsu));
        assert_eq!(NoteKind::Rest.lane(), None);
        assert_eq!(NoteKind::DrumrollStart { big: false }.lane(), None);
    }

    #[test]
    fn test_roll_lane_acceptance() {
        let roll = NoteKind::DrumrollStart { big: true }.roll().unwrap();
        assert!(roll.accepts(Lane::Don));
        assert!(roll.accepts(Lane::Katsu));

        let balloon = NoteKind::BalloonStart { required_hits: 5 }.roll().unwrap();
        assert!(balloon.accepts(Lane::Don));
        assert!(!balloon.accepts(Lane::Katsu));
    }

    #[test]
    fn test_judged_entries() {
        assert!(NoteKind::Don.is_judged());
        assert!(NoteKind::BalloonStart { required_hits: 3 }.is_judged());
        assert!(!NoteKind::DrumrollEnd.is_judged());
        assert!(!NoteKind::Rest.is_judged());
        assert!(NoteKind::BalloonEnd.is_roll_end());
    }
}
