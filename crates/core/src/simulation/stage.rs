//! Run stages and the stage state machine
//!
//! Stages always run in the fixed order Pre-run → Equilibrium → Spinup →
//! Transient → Scenario. [`Stage::next`] is the only transition; a stage
//! configured with zero years is skipped without a checkpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::modules::ModuleConfig;
use crate::disturbance::IgnitionSource;

/// One phase of the multi-stage simulation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "pre-run")]
    PreRun,
    #[serde(rename = "eq-run")]
    Equilibrium,
    #[serde(rename = "sp-run")]
    Spinup,
    #[serde(rename = "tr-run")]
    Transient,
    #[serde(rename = "sc-run")]
    Scenario,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::PreRun,
        Stage::Equilibrium,
        Stage::Spinup,
        Stage::Transient,
        Stage::Scenario,
    ];

    /// Identifier used in logs and record keys
    pub const fn id(self) -> &'static str {
        match self {
            Stage::PreRun => "pre-run",
            Stage::Equilibrium => "eq-run",
            Stage::Spinup => "sp-run",
            Stage::Transient => "tr-run",
            Stage::Scenario => "sc-run",
        }
    }

    /// The stage that follows this one, if any
    pub const fn next(self) -> Option<Stage> {
        match self {
            Stage::PreRun => Some(Stage::Equilibrium),
            Stage::Equilibrium => Some(Stage::Spinup),
            Stage::Spinup => Some(Stage::Transient),
            Stage::Transient => Some(Stage::Scenario),
            Stage::Scenario => None,
        }
    }

    /// Whether the stage writes a restart record when it completes
    pub const fn checkpoints(self) -> bool {
        !matches!(self, Stage::PreRun)
    }

    /// Name of the stage's restart store, `None` for Pre-run
    pub const fn restart_tag(self) -> Option<&'static str> {
        match self {
            Stage::PreRun => None,
            Stage::Equilibrium => Some("restart-eq"),
            Stage::Spinup => Some("restart-sp"),
            Stage::Transient => Some("restart-tr"),
            Stage::Scenario => Some("restart-sc"),
        }
    }

    /// Stage whose checkpoint this stage starts from.
    ///
    /// Pre-run and Equilibrium start from the cell's initial (or pre-run
    /// conditioned) state and take no record.
    pub const fn restart_source(self) -> Option<Stage> {
        match self {
            Stage::PreRun | Stage::Equilibrium => None,
            Stage::Spinup => Some(Stage::Equilibrium),
            Stage::Transient => Some(Stage::Spinup),
            Stage::Scenario => Some(Stage::Transient),
        }
    }

    /// How fires are timed in this stage
    pub const fn ignition_source(self) -> IgnitionSource {
        match self {
            Stage::PreRun | Stage::Equilibrium | Stage::Spinup => IgnitionSource::FriDerived,
            Stage::Transient | Stage::Scenario => IgnitionSource::Explicit,
        }
    }

    /// Module switches used when the control file does not override them
    pub const fn default_modules(self) -> ModuleConfig {
        match self {
            Stage::PreRun => ModuleConfig::ENV_ONLY,
            _ => ModuleConfig::FULL,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.id() == s)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

/// Requested duration of every stage, in years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageYears {
    pub pr_yrs: u32,
    pub eq_yrs: u32,
    pub sp_yrs: u32,
    pub tr_yrs: u32,
    pub sc_yrs: u32,
}

impl Default for StageYears {
    fn default() -> Self {
        Self {
            pr_yrs: 10,
            eq_yrs: 1000,
            sp_yrs: 100,
            tr_yrs: 0,
            sc_yrs: 0,
        }
    }
}

impl StageYears {
    /// Every stage set to zero years
    pub const NONE: StageYears = StageYears {
        pr_yrs: 0,
        eq_yrs: 0,
        sp_yrs: 0,
        tr_yrs: 0,
        sc_yrs: 0,
    };

    pub const fn years(&self, stage: Stage) -> u32 {
        match stage {
            Stage::PreRun => self.pr_yrs,
            Stage::Equilibrium => self.eq_yrs,
            Stage::Spinup => self.sp_yrs,
            Stage::Transient => self.tr_yrs,
            Stage::Scenario => self.sc_yrs,
        }
    }

    pub fn set_years(&mut self, stage: Stage, years: u32) {
        match stage {
            Stage::PreRun => self.pr_yrs = years,
            Stage::Equilibrium => self.eq_yrs = years,
            Stage::Spinup => self.sp_yrs = years,
            Stage::Transient => self.tr_yrs = years,
            Stage::Scenario => self.sc_yrs = years,
        }
    }

    /// Stages that will run, in order
    pub fn active_stages(&self) -> Vec<Stage> {
        StageMachine::new(*self).collect()
    }
}

/// Position in the stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    NotStarted,
    Running(Stage),
    Finished,
}

/// Walks the stage sequence for one cell, skipping zero-year stages.
///
/// Iterating yields each stage that has work to do, strictly forward.
#[derive(Debug, Clone)]
pub struct StageMachine {
    years: StageYears,
    state: StageState,
}

impl StageMachine {
    pub fn new(years: StageYears) -> Self {
        Self {
            years,
            state: StageState::NotStarted,
        }
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    /// The single transition function: move to the next stage with a
    /// nonzero duration, or to `Finished`.
    pub fn advance(&mut self) -> StageState {
        let mut candidate = match self.state {
            StageState::NotStarted => Some(Stage::PreRun),
            StageState::Running(stage) => stage.next(),
            StageState::Finished => None,
        };
        while let Some(stage) = candidate {
            if self.years.years(stage) > 0 {
                break;
            }
            candidate = stage.next();
        }
        self.state = candidate.map_or(StageState::Finished, StageState::Running);
        self.state
    }
}

impl Iterator for StageMachine {
    type Item = Stage;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            StageState::Running(stage) => Some(stage),
            StageState::NotStarted | StageState::Finished => None,
        }
    }
}
