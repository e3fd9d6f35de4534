use std::path::PathBuf;

use thiserror::Error;

/// Fatal structural problem in chart text.
///
/// `line` is 1-based; `0` refers to the file as a whole.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {kind}")]
pub struct FormatError {
    pub line: usize,
    pub kind: FormatErrorKind,
}

impl FormatError {
    pub fn new(line: usize, kind: FormatErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatErrorKind {
    #[error("missing TITLE header")]
    MissingTitle,

    #[error("#START without a COURSE label")]
    MissingCourseLabel,

    #[error("no #START ... #END course body")]
    MissingCourseBody,

    #[error("unrecognized note token '{0}'")]
    UnknownToken(char),

    #[error("#BRANCHSTART block is never closed")]
    UnterminatedBranch,

    #[error("#START without matching #END")]
    UnterminatedCourse,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    #[error("non-positive BPM {bpm} active at measure {measure}")]
    NonPositiveBpm { measure: usize, bpm: f64 },

    #[error("course has no measures")]
    EmptyCourse,

    #[error("invalid time signature at measure {measure}")]
    InvalidSignature { measure: usize },

    #[error("branch section {section} has neither the {branch:?} nor the normal path")]
    MissingBranch {
        section: usize,
        branch: crate::BranchKind,
    },
}

/// Errors from reading a chart off disk.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("failed to read chart file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chart file is neither UTF-8 nor Shift-JIS: {path}")]
    Decode { path: PathBuf },

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Recoverable irregularity found while parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}
