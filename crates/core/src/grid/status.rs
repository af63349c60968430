//! Per-cell run status and the shared failure log
//!
//! Both are written concurrently by cell runs. Status slots are independent
//! atomics, so cells never contend; the failure log serialises whole lines
//! behind a mutex. The status grid can also save itself while the run is in
//! progress, at most once per interval.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error};

use crate::config::write_replacing;
use crate::core_types::{CellCoord, MISSING_I};
use crate::error::GridError;

/// Status of a slot no cell run has reached yet
pub const UNINITIALIZED: i32 = MISSING_I;

/// Final state of one cell's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellStatus {
    /// Masked out, not simulated
    Skipped,
    Succeeded,
    Failed,
}

impl CellStatus {
    /// Value written to the status file
    pub const fn code(self) -> i32 {
        match self {
            CellStatus::Skipped => 0,
            CellStatus::Succeeded => 100,
            CellStatus::Failed => -100,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CellStatus::Skipped),
            100 => Some(CellStatus::Succeeded),
            -100 => Some(CellStatus::Failed),
            _ => None,
        }
    }
}

/// Status code per grid cell.
#[derive(Debug)]
pub struct RunStatusGrid {
    rows: usize,
    cols: usize,
    slots: Vec<AtomicI32>,
    autosave: Option<Autosave>,
}

#[derive(Debug)]
struct Autosave {
    path: PathBuf,
    interval: Duration,
    last: Mutex<Instant>,
}

#[derive(Serialize)]
struct StatusFile {
    rows: usize,
    cols: usize,
    status: Vec<Vec<i32>>,
}

impl RunStatusGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            slots: (0..rows * cols).map(|_| AtomicI32::new(UNINITIALIZED)).collect(),
            autosave: None,
        }
    }

    /// Let [`RunStatusGrid::autosave`] write the grid to `path`, no more
    /// often than once per `interval`.
    pub fn with_autosave(mut self, path: &Path, interval: Duration) -> Self {
        self.autosave = Some(Autosave {
            path: path.to_path_buf(),
            interval,
            last: Mutex::new(Instant::now()),
        });
        self
    }

    /// Save the grid if autosave is enabled and the interval has passed.
    /// Skipped while another thread is saving; a failed save is reported
    /// and never fails the caller.
    pub fn autosave(&self) {
        let Some(auto) = &self.autosave else {
            return;
        };
        let Ok(mut last) = auto.last.try_lock() else {
            return;
        };
        if last.elapsed() < auto.interval {
            return;
        }
        match self.save(&auto.path) {
            Ok(()) => {
                *last = Instant::now();
                debug!(path = ?auto.path, "saved run status");
            }
            Err(e) => error!(error = %e, "failed to save run status"),
        }
    }

    /// Record a cell's final status. Coordinates outside the grid are
    /// ignored.
    pub fn record(&self, coord: CellCoord, status: CellStatus) {
        if let Some(slot) = self.slot(coord) {
            slot.store(status.code(), Ordering::Release);
        }
    }

    /// Raw code for a cell, [`UNINITIALIZED`] until recorded
    pub fn code(&self, coord: CellCoord) -> Option<i32> {
        self.slot(coord).map(|s| s.load(Ordering::Acquire))
    }

    pub fn status(&self, coord: CellCoord) -> Option<CellStatus> {
        self.code(coord).and_then(CellStatus::from_code)
    }

    /// Codes in row-major rows
    pub fn snapshot(&self) -> Vec<Vec<i32>> {
        self.slots
            .chunks(self.cols.max(1))
            .map(|row| row.iter().map(|s| s.load(Ordering::Acquire)).collect())
            .collect()
    }

    /// Write the grid as JSON.
    ///
    /// # Errors
    /// Returns [`GridError::Io`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), GridError> {
        let file = StatusFile {
            rows: self.rows,
            cols: self.cols,
            status: self.snapshot(),
        };
        let contents = serde_json::to_string_pretty(&file)
            .map_err(|e| io_error(path, std::io::Error::other(e)))?;
        write_replacing(path, contents.as_bytes()).map_err(|e| io_error(path, e))
    }

    fn slot(&self, coord: CellCoord) -> Option<&AtomicI32> {
        (coord.row < self.rows && coord.col < self.cols)
            .then(|| &self.slots[coord.row * self.cols + coord.col])
    }
}

fn io_error(path: &Path, source: std::io::Error) -> GridError {
    GridError::Io {
        path: path.to_path_buf(),
        source,
    }
}

enum Sink {
    File(File),
    Memory(Vec<String>),
}

/// Append-only log of cell failures, one `row,col: message` line each.
pub struct FailureLog {
    path: Option<PathBuf>,
    sink: Mutex<Sink>,
}

impl FailureLog {
    /// Open (creating if needed) a log file for appending.
    ///
    /// # Errors
    /// Returns [`GridError::Io`] when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, GridError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_error(path, e))?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            sink: Mutex::new(Sink::File(file)),
        })
    }

    /// A log kept in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            sink: Mutex::new(Sink::Memory(Vec::new())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one failure. A log that cannot be written is reported but
    /// never fails the caller.
    pub fn record(&self, coord: CellCoord, message: &str) {
        // One line per failure, even for multi-line messages
        let line = format!("{},{}: {}\n", coord.row, coord.col, message.replace('\n', " "));
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *sink {
            Sink::File(file) => {
                if let Err(e) = file.write_all(line.as_bytes()) {
                    error!(path = ?self.path, error = %e, "failed to append to failure log");
                }
            }
            Sink::Memory(lines) => lines.push(line.trim_end().to_string()),
        }
    }

    /// Lines recorded by an in-memory log; empty for file-backed logs
    pub fn lines(&self) -> Vec<String> {
        match &*self.sink.lock().unwrap_or_else(PoisonError::into_inner) {
            Sink::Memory(lines) => lines.clone(),
            Sink::File(_) => Vec::new(),
        }
    }
}

impl std::fmt::Debug for FailureLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureLog").field("path", &self.path).finish_non_exhaustive()
    }
}
