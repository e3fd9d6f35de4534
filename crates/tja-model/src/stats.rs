use serde::Serialize;

use crate::note::NoteKind;
use crate::timeline::Timeline;

/// Summary numbers for one resolved path, as shown by `taiko info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseStats {
    pub dons: usize,
    pub katsus: usize,
    pub big_dons: usize,
    pub big_katsus: usize,
    pub drumrolls: usize,
    pub balloons: usize,
    /// Combo reached by hitting every single note.
    pub max_combo: usize,
    /// Total seconds spent inside drumrolls.
    pub drumroll_seconds: f64,
    pub balloon_hits: u32,
    /// First to last single note.
    pub play_length: f64,
    pub duration: f64,
}

impl CourseStats {
    /// Intended for timelines built for a fixed branch.
    pub fn from_timeline(timeline: &Timeline) -> Self {
        let notes = timeline.notes();
        let mut stats = CourseStats {
            duration: timeline.duration(),
            ..Default::default()
        };

        let mut first: Option<f64> = None;
        let mut last: Option<f64> = None;
        for note in notes {
            match note.kind {
                NoteKind::Don => stats.dons += 1,
                NoteKind::Katsu => stats.katsus += 1,
                NoteKind::BigDon => stats.big_dons += 1,
                NoteKind::BigKatsu => stats.big_katsus += 1,
                NoteKind::DrumrollStart { .. } => {
                    stats.drumrolls += 1;
                    stats.drumroll_seconds += note.end_time(notes) - note.time;
                }
                NoteKind::BalloonStart { required_hits } => {
                    stats.balloons += 1;
                    stats.balloon_hits += required_hits;
                }
                NoteKind::DrumrollEnd | NoteKind::BalloonEnd | NoteKind::Rest => {}
            }
            if note.kind.is_single() {
                first.get_or_insert(note.time);
                last = Some(note.time);
            }
        }

        stats.max_combo = stats.dons + stats.katsus + stats.big_dons + stats.big_katsus;
        if let (Some(first), Some(last)) = (first, last) {
            stats.play_length = last - first;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BranchKind, Difficulty, build_timeline, parse};

    #[test]
    fn test_counts() {
        let text = "TITLE:t\nBPM:120\nCOURSE:Oni\nBALLOON:8\n#START\n1234,\n5008,\n7008,\n#END\n";
        let parsed = parse(text).unwrap();
        let course = parsed.course(Difficulty::Oni).unwrap();
        let tl = build_timeline(&parsed.song, course, Some(BranchKind::Normal)).unwrap();
        let stats = CourseStats::from_timeline(&tl);

        assert_eq!(stats.dons, 1);
        assert_eq!(stats.katsus, 1);
        assert_eq!(stats.big_dons, 1);
        assert_eq!(stats.big_katsus, 1);
        assert_eq!(stats.max_combo, 4);
        assert_eq!(stats.drumrolls, 1);
        assert!((stats.drumroll_seconds - 1.5).abs() < 1e-9);
        assert_eq!(stats.balloons, 1);
        assert_eq!(stats.balloon_hits, 8);
        assert!((stats.play_length - 1.5).abs() < 1e-9);
        assert!((stats.duration - 6.0).abs() < 1e-9);
    }
}
