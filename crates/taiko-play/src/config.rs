use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tja_model::Course;

use crate::gauge::GaugeConfig;
use crate::judge::JudgeWindow;
use crate::score::ScoreConfig;

/// What an unpopped balloon keeps of its per-hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BalloonRule {
    /// Hits already scored stay.
    #[default]
    Partial,
    /// Hits already scored are taken back.
    Forfeit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlayConfig {
    pub judge: JudgeWindow,
    pub score: ScoreConfig,
    pub gauge: GaugeConfig,
    pub balloon_rule: BalloonRule,
    /// Added latency of the input path; subtracted from every input time.
    pub judge_offset_ms: f64,
}

impl PlayConfig {
    /// Windows and scoring suited to `course`.
    pub fn for_course(course: &Course) -> Self {
        Self {
            judge: JudgeWindow::for_difficulty(course.difficulty),
            score: ScoreConfig::for_course(course),
            ..Default::default()
        }
    }

    /// Reads play settings from a JSON file. A missing file yields the
    /// defaults, as does any field the file leaves out.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Writes the settings as pretty JSON, e.g. to seed a per-player file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreMode;
    use tempfile::tempdir;
    use tja_model::{Difficulty, load_chart};

    #[test]
    fn test_default_values() {
        let config = PlayConfig::default();
        assert_eq!(config.judge, JudgeWindow::default());
        assert_eq!(config.balloon_rule, BalloonRule::Partial);
        assert_eq!(config.judge_offset_ms, 0.0);
        assert_eq!(config.score.great_points, 300);
    }

    #[test]
    fn test_file_io() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("play.json");

        let config = PlayConfig {
            judge: JudgeWindow {
                great: 20.0,
                good: 45.0,
                bad: 90.0,
            },
            balloon_rule: BalloonRule::Forfeit,
            judge_offset_ms: 12.5,
            ..Default::default()
        };

        config.save_to(&file_path).unwrap();
        let loaded = PlayConfig::load_from(&file_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let dir = tempdir().unwrap();
        let config = PlayConfig::load_from(dir.path().join("missing.json")).unwrap();
        assert_eq!(config, PlayConfig::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlayConfig =
            serde_json::from_str(r#"{"judge": {"great": 30.0}, "judge_offset_ms": 5.0}"#).unwrap();
        assert_eq!(config.judge.great, 30.0);
        assert_eq!(config.judge.bad, 100.0);
        assert_eq!(config.judge_offset_ms, 5.0);
        assert_eq!(config.gauge, GaugeConfig::default());
    }

    #[test]
    fn test_shinuchi_mode_from_json() {
        let config: PlayConfig =
            serde_json::from_str(r#"{"score": {"mode": "ShinUchi"}}"#).unwrap();
        assert_eq!(config.score.mode, ScoreMode::ShinUchi);
        assert_eq!(config.score.shinuchi_points, None);
        assert_eq!(config.score.great_points, 300);
    }

    #[test]
    fn test_for_course() {
        let chart = load_chart(
            "TITLE:x\nCOURSE:Oni\nSCOREINIT:420\nSCOREDIFF:110\n#START\n1,\n#END\n",
        )
        .unwrap();
        let config = PlayConfig::for_course(chart.course(Difficulty::Oni).unwrap());
        assert_eq!(config.judge, JudgeWindow::for_difficulty(Difficulty::Oni));
        assert_eq!(config.score.great_points, 420);
        assert_eq!(config.score.tier_points, 110);
    }
}
