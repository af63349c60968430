//! Parallel per-cell runs over a run mask
//!
//! Every active cell gets an independent run of the full stage sequence on
//! a rayon worker. A cell's run owns its `CellState`, its fire engine and its
//! module switches; the only things shared between runs are the restart
//! stores (one slot per cell), the status grid (one atomic per cell) and the
//! failure log. Errors and panics stop at the cell boundary.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::{error, info, info_span, warn};

use super::run_mask::RunMask;
use super::status::{CellStatus, FailureLog, RunStatusGrid};
use crate::core_types::{CellCoord, CellState};
use crate::disturbance::{FireParameters, FireSchedule, WildFire};
use crate::error::{CellError, GridError};
use crate::restart::RestartStores;
use crate::simulation::{MonthlyProcesses, StageController, StageOutcome, StagePlan};

/// Initial conditions for one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellInput {
    /// State the first stage starts from, fire regime included
    pub state: CellState,
    /// Explicit fires for the transient and scenario stages
    pub schedule: FireSchedule,
}

/// Supplies each cell's initial conditions.
pub trait CellSource: Send + Sync {
    /// # Errors
    /// When no input exists for `coord` or it cannot be read.
    fn load(&self, coord: CellCoord) -> Result<CellInput, CellError>;
}

/// Gives every cell a copy of the same template.
#[derive(Debug, Clone)]
pub struct TemplateCellSource {
    input: CellInput,
}

impl TemplateCellSource {
    pub fn new(state: CellState, schedule: FireSchedule) -> Self {
        Self {
            input: CellInput { state, schedule },
        }
    }
}

impl CellSource for TemplateCellSource {
    fn load(&self, _coord: CellCoord) -> Result<CellInput, CellError> {
        Ok(self.input.clone())
    }
}

/// Cell counts of a finished grid run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridSummary {
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl GridSummary {
    pub fn total(&self) -> usize {
        self.skipped + self.succeeded + self.failed
    }
}

/// Where a grid run records its results.
#[derive(Debug)]
pub struct GridOutputs<'a> {
    pub stores: &'a RestartStores,
    pub status: &'a RunStatusGrid,
    pub failures: &'a FailureLog,
}

/// Runs the stage sequence for every active cell.
pub struct GridOrchestrator {
    plan: StagePlan,
    fire_params: FireParameters,
    processes: Box<dyn MonthlyProcesses>,
    source: Box<dyn CellSource>,
    threads: usize,
}

impl GridOrchestrator {
    pub fn new(
        plan: StagePlan,
        fire_params: FireParameters,
        processes: Box<dyn MonthlyProcesses>,
        source: Box<dyn CellSource>,
    ) -> Self {
        Self {
            plan,
            fire_params,
            processes,
            source,
            threads: 0,
        }
    }

    /// Worker count; 0 uses rayon's global pool
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    /// Simulate every active cell of `mask`.
    ///
    /// Skipped cells are recorded as such without running anything. Each
    /// active cell ends as succeeded or failed; a failure is logged with
    /// its coordinates and never affects another cell.
    ///
    /// # Errors
    /// Only when the worker pool cannot be built. Cell failures are
    /// reported through `outputs`, not here.
    pub fn run(&self, mask: &RunMask, outputs: &GridOutputs<'_>) -> Result<GridSummary, GridError> {
        let mut summary = GridSummary::default();
        let mut active = Vec::with_capacity(mask.active_count());
        for coord in mask.coords() {
            if mask.is_active(coord) {
                active.push(coord);
            } else {
                outputs.status.record(coord, CellStatus::Skipped);
                summary.skipped += 1;
            }
        }

        info!(
            rows = mask.rows(),
            cols = mask.cols(),
            active = active.len(),
            threads = self.threads,
            "starting grid run"
        );

        let run_all = || -> Vec<CellStatus> {
            active
                .par_iter()
                .map(|&coord| self.run_isolated(coord, outputs))
                .collect()
        };

        let statuses = if self.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build()
                .map_err(|e| GridError::ThreadPool(e.to_string()))?
                .install(run_all)
        } else {
            run_all()
        };

        for status in statuses {
            match status {
                CellStatus::Succeeded => summary.succeeded += 1,
                CellStatus::Failed => summary.failed += 1,
                CellStatus::Skipped => summary.skipped += 1,
            }
        }

        if summary.failed > 0 {
            warn!(failed = summary.failed, succeeded = summary.succeeded, "grid run finished with failed cells");
        } else {
            info!(succeeded = summary.succeeded, skipped = summary.skipped, "grid run finished");
        }
        Ok(summary)
    }

    /// Full stage sequence for one cell, without failure isolation.
    ///
    /// # Errors
    /// Anything that aborts the cell's run.
    pub fn run_cell(
        &self,
        coord: CellCoord,
        stores: &RestartStores,
    ) -> Result<Vec<StageOutcome>, CellError> {
        let input = self.source.load(coord)?;
        let fire = WildFire::new(self.fire_params.clone(), input.schedule);
        let controller = StageController::new(self.processes.as_ref(), &fire);
        let mut cell = input.state;
        controller.run_cell(coord, &mut cell, &self.plan, stores)
    }

    /// Run one cell, catching errors and panics, and record the result.
    fn run_isolated(&self, coord: CellCoord, outputs: &GridOutputs<'_>) -> CellStatus {
        let _span = info_span!("cell", row = coord.row, col = coord.col).entered();

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_cell(coord, outputs.stores)))
            .unwrap_or_else(|payload| Err(CellError::Panicked(panic_message(payload.as_ref()))));

        let status = match result {
            Ok(outcomes) => {
                info!(stages = outcomes.len(), "cell run succeeded");
                CellStatus::Succeeded
            }
            Err(err) => {
                error!(error = %err, "cell run failed");
                outputs.failures.record(coord, &err.to_string());
                CellStatus::Failed
            }
        };
        outputs.status.record(coord, status);
        outputs.status.autosave();
        status
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl std::fmt::Debug for GridOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridOrchestrator")
            .field("plan", &self.plan)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}
