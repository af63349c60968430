//! Terrestrial ecosystem model core
//!
//! Stage-sequenced simulation of soil, vegetation and fire carbon/nitrogen
//! dynamics for a grid of independent cells.
//!
//! ## Layout
//!
//! - [`core_types`]: cell state (vegetation, soil column, snow, fire pools)
//! - [`disturbance`]: wildfire ignition, severity and burn redistribution
//! - [`restart`]: checkpoint records and per-stage stores
//! - [`simulation`]: the stage state machine and per-cell stage controller
//! - [`grid`]: run mask, parallel dispatch, run status and failure log
//! - [`config`]: the JSON control file
//!
//! A cell run walks Pre-run → Equilibrium → Spinup → Transient → Scenario,
//! skipping stages with no years. Each stage after Pre-run writes a restart
//! record; the next stage starts from it.

pub mod config;
pub mod core_types;
pub mod disturbance;
pub mod error;
pub mod grid;
pub mod restart;
pub mod simulation;

pub use config::{CellTemplate, RunConfig};
pub use core_types::{CellCoord, CellState, FireRegime};
pub use disturbance::{BurnSummary, FireParameters, FireSchedule, Severity, WildFire};
pub use error::{CellError, ConfigError, GridError, MaskError, RestartError, SeverityError};
pub use grid::{
    CellSource, CellStatus, FailureLog, GridOrchestrator, GridOutputs, GridSummary, RunMask,
    RunStatusGrid, TemplateCellSource,
};
pub use restart::{RestartRecord, RestartStore, RestartStores};
pub use simulation::{
    BaselineProcesses, ModuleConfig, MonthlyProcesses, Stage, StageController, StageOutcome,
    StagePlan, StageYears,
};
