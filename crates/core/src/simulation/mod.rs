//! Stage-sequenced simulation of a single cell
//!
//! - [`stage`]: the five stages and the state machine that walks them
//! - [`modules`]: per-stage module switches
//! - [`processes`]: the opaque monthly process collaborator
//! - [`controller`]: runs stages against a cell and hands off checkpoints

pub mod controller;
pub mod modules;
pub mod processes;
pub mod stage;

pub use controller::{
    effective_equilibrium_years, EffectiveYears, StageController, StageOutcome, StagePlan,
    EQUILIBRIUM_SAFETY_MARGIN,
};
pub use modules::{ModuleConfig, ModuleOverrides};
pub use processes::{BaselineProcesses, MonthlyProcesses};
pub use stage::{Stage, StageMachine, StageState, StageYears};
