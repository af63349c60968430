//! Error types
//!
//! Per-cell failures ([`CellError`]) are caught at the grid boundary and turn
//! into a failed status for that cell only. Pre-grid failures ([`MaskError`],
//! [`ConfigError`], [`GridError`]) abort the whole run.

use std::path::PathBuf;

use thiserror::Error;

/// Raw disturbance inputs outside their declared ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeverityError {
    #[error("drainage class {0} is outside 0..=1")]
    Drainage(i32),

    #[error("fire season {0} is outside 1..=4")]
    Season(i32),

    #[error("fire size class {0} is outside 0..=4")]
    Size(i32),

    #[error("fire severity {0} is outside 0..=4")]
    Severity(i32),
}

/// Restart record validation and restart store failures.
#[derive(Debug, Error)]
pub enum RestartError {
    #[error("restart field '{field}'{index} holds the missing-value sentinel")]
    Missing {
        field: &'static str,
        index: FieldIndex,
    },

    #[error("restart field '{field}'{index} = {value} is implausible: {reason}")]
    OutOfRange {
        field: &'static str,
        index: FieldIndex,
        value: f64,
        reason: &'static str,
    },

    #[error("restart field '{field}' has {actual} entries, expected {expected}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("restart soil layer count {0} is outside 1..=MAX_SOIL_LAYERS")]
    LayerCount(i32),

    #[error("restart soil layer {index} has unknown kind code {code}")]
    LayerKind { index: usize, code: i32 },

    #[error("cell ({row}, {col}) is outside the {rows}x{cols} restart store")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("stage {0} does not checkpoint")]
    NoStore(&'static str),

    #[error("restart store {path:?} covers {actual} cells, expected {expected}")]
    StoreShape {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("restart store I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("restart store encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Optional array position of a restart field, rendered as `[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIndex(pub Option<usize>);

impl std::fmt::Display for FieldIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(i) => write!(f, "[{i}]"),
            None => Ok(()),
        }
    }
}

/// Anything that aborts one cell's run.
#[derive(Debug, Error)]
pub enum CellError {
    #[error(transparent)]
    Restart(#[from] RestartError),

    #[error(transparent)]
    Severity(#[from] SeverityError),

    #[error("fire return interval must be at least one year, got {0}")]
    InvalidFri(u32),

    #[error("process update failed in year {year}, month {month}: {reason}")]
    Process {
        year: u32,
        month: u32,
        reason: String,
    },

    #[error("cell input unavailable: {0}")]
    Input(String),

    #[error("panic during cell run: {0}")]
    Panicked(String),
}

/// Malformed run mask.
#[derive(Debug, Error)]
pub enum MaskError {
    #[error("run mask has no cells")]
    Empty,

    #[error("run mask row {row} has {actual} columns, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("run mask value {value} at ({row}, {col}) is not 0 or 1")]
    Value { row: usize, col: usize, value: i64 },

    #[error("reading run mask {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing run mask: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Control file problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading control file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing control file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures setting up the grid run, before any cell starts.
#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Mask(#[from] MaskError),

    #[error("preparing restart stores: {0}")]
    Restart(#[from] RestartError),

    #[error("output I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("building worker pool: {0}")]
    ThreadPool(String),
}
