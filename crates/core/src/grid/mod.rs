//! Grid runs: run mask, parallel per-cell dispatch, status and failure
//! reporting

pub mod orchestrator;
pub mod run_mask;
pub mod status;

pub use orchestrator::{
    CellInput, CellSource, GridOrchestrator, GridOutputs, GridSummary, TemplateCellSource,
};
pub use run_mask::RunMask;
pub use status::{CellStatus, FailureLog, RunStatusGrid, UNINITIALIZED};
