//! TJA chart model: parsing chart text and resolving courses into timelines.

pub mod chart;
pub mod decode;
pub mod error;
pub mod note;
pub mod parser;
pub mod stats;
pub mod timeline;

pub use chart::{
    BranchBlock, BranchCondition, BranchKind, BranchMetric, Course, DEFAULT_BPM, Difficulty,
    Measure, MeasureEvent, ParsedChart, Segment, Song, StateChange,
};
pub use decode::{decode_chart_bytes, load_chart_file, read_chart_file};
pub use error::{ChartError, FormatError, FormatErrorKind, ParseWarning, TimelineError};
pub use note::{Lane, NoteKind, RollKind};
pub use parser::{DEFAULT_BALLOON_HITS, parse};
pub use stats::CourseStats;
pub use timeline::{
    Barline, BranchSection, GogoRange, TimedNote, Timeline, TimingPoint, build_timeline,
};

/// Parses chart text into its song header and courses.
pub fn load_chart(text: &str) -> Result<ParsedChart, FormatError> {
    parse(text)
}
