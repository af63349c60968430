//! Stage execution for one cell
//!
//! [`StageController::run_stage`] runs one stage's years against a cell;
//! [`StageController::run_cell`] walks the whole stage sequence, loading each
//! stage's incoming checkpoint and writing its outgoing one. The restart
//! record written at the end of a stage is the only thing the next stage
//! starts from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use super::modules::{ModuleConfig, ModuleOverrides};
use super::processes::MonthlyProcesses;
use super::stage::{Stage, StageMachine, StageYears};
use crate::core_types::{CellCoord, CellState, CnFlux, MONTHS_PER_YEAR};
use crate::disturbance::{IgnitionSource, WildFire};
use crate::error::CellError;
use crate::restart::{RestartRecord, RestartStores};

/// Years in the equilibrium stage held back from the end of the last fire
/// cycle
pub const EQUILIBRIUM_SAFETY_MARGIN: u32 = 2;

/// Stage durations plus per-stage module overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePlan {
    #[serde(flatten)]
    pub years: StageYears,
    pub modules: BTreeMap<Stage, ModuleOverrides>,
}

impl StagePlan {
    pub fn new(years: StageYears) -> Self {
        Self {
            years,
            modules: BTreeMap::new(),
        }
    }

    /// Module switches for a stage: its defaults with any overrides applied
    pub fn modules_for(&self, stage: Stage) -> ModuleConfig {
        let base = stage.default_modules();
        self.modules
            .get(&stage)
            .map_or(base, |overrides| overrides.apply(base))
    }
}

/// Equilibrium duration after rounding to whole fire cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveYears {
    pub years: u32,
    /// The requested duration was shorter than one FRI and was used as is
    pub shorter_than_fri: bool,
}

/// Round a requested equilibrium duration so the stage does not stop
/// mid fire-cycle.
///
/// Durations that are not a multiple of `fri` extend to the end of the
/// current cycle; either way the last [`EQUILIBRIUM_SAFETY_MARGIN`] years are
/// dropped. A request shorter than one cycle is returned unchanged and
/// flagged.
///
/// ```
/// use tem_core::simulation::effective_equilibrium_years;
/// assert_eq!(effective_equilibrium_years(25, 10).years, 28);
/// assert_eq!(effective_equilibrium_years(20, 10).years, 18);
/// assert!(effective_equilibrium_years(5, 10).shorter_than_fri);
/// ```
pub fn effective_equilibrium_years(requested: u32, fri: u32) -> EffectiveYears {
    if fri == 0 || requested < fri {
        return EffectiveYears {
            years: requested,
            shorter_than_fri: fri > 0,
        };
    }

    let cycle_end = if requested % fri == 0 {
        requested
    } else {
        (requested / fri + 1) * fri
    };
    EffectiveYears {
        years: cycle_end.saturating_sub(EQUILIBRIUM_SAFETY_MARGIN).max(1),
        shorter_than_fri: false,
    }
}

/// What one stage did to one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: Stage,
    pub requested_years: u32,
    pub effective_years: u32,
    pub modules: ModuleConfig,
    /// Fires that actually burned
    pub ignitions: u32,
    /// Total carbon and nitrogen emitted by fire over the stage
    pub fire_emissions: CnFlux,
    /// Checkpoint for the next stage, `None` for Pre-run
    pub record: Option<RestartRecord>,
    /// The equilibrium duration was shorter than one fire cycle
    pub fri_inconsistent: bool,
}

/// Runs stages against a cell with a fixed set of process and fire
/// collaborators.
pub struct StageController<'a> {
    processes: &'a dyn MonthlyProcesses,
    fire: &'a WildFire,
}

impl<'a> StageController<'a> {
    pub fn new(processes: &'a dyn MonthlyProcesses, fire: &'a WildFire) -> Self {
        Self { processes, fire }
    }

    /// Run `years` years of `stage` against `cell`.
    ///
    /// # Arguments
    /// * `cell` - State to advance in place
    /// * `stage` - Stage being run
    /// * `years` - Requested duration
    /// * `modules` - Switches for this stage only
    /// * `incoming` - Checkpoint to start from, validated and applied first
    ///
    /// # Returns
    /// The stage outcome, carrying the outgoing checkpoint for every stage
    /// except Pre-run.
    ///
    /// # Errors
    /// An invalid incoming record, an invalid fire regime, or any failure
    /// from the monthly processes. The cell is left mid-stage on error.
    pub fn run_stage(
        &self,
        cell: &mut CellState,
        stage: Stage,
        years: u32,
        modules: ModuleConfig,
        incoming: Option<&RestartRecord>,
    ) -> Result<StageOutcome, CellError> {
        if let Some(record) = incoming {
            record.apply_to(cell)?;
            debug!(stage = stage.id(), "applied incoming restart record");
        }

        let fri = cell.regime.fri;
        if modules.dsb && fri == 0 {
            return Err(CellError::InvalidFri(fri));
        }

        let mut effective_years = years;
        let mut fri_inconsistent = false;
        if stage == Stage::Equilibrium && modules.dsb {
            let eff = effective_equilibrium_years(years, fri);
            if eff.shorter_than_fri {
                warn!(
                    requested = years,
                    fri, "equilibrium run is shorter than one fire cycle, running it anyway"
                );
            } else if eff.years != years {
                info!(requested = years, effective = eff.years, fri, "equilibrium duration rounded to fire cycles");
            }
            effective_years = eff.years;
            fri_inconsistent = eff.shorter_than_fri;
        }

        let mut ignitions = 0;
        let mut fire_emissions = CnFlux::ZERO;

        for year in 0..effective_years {
            cell.fire.begin_of_year();
            let mut burned_this_year = false;

            for month in 0..MONTHS_PER_YEAR {
                self.processes.update_month(cell, &modules, year, month)?;

                // One fire per year at most, even if later fire-season months qualify
                if !modules.dsb || burned_this_year {
                    continue;
                }
                if !self.fire.should_ignite(fri, year, month, stage) {
                    continue;
                }
                burned_this_year = true;

                let severity = self.fire.ignition_severity(&cell.regime, year, month, stage)?;
                let summary = self.fire.burn(cell, severity);
                if severity.burns() {
                    ignitions += 1;
                    let emitted = summary.emitted();
                    fire_emissions.c += emitted.c;
                    fire_emissions.n += emitted.n;
                    if stage.ignition_source() == IgnitionSource::Explicit {
                        debug!(
                            year,
                            month,
                            atm_to_soil_n = cell.fire.atm_to_soil_n,
                            "fire nitrogen amortised over FRI for a scheduled fire"
                        );
                    }
                }
            }

            cell.fire.end_of_year();
        }

        let record = if stage.checkpoints() {
            Some(RestartRecord::from_state(cell)?)
        } else {
            None
        };

        info!(
            stage = stage.id(),
            years = effective_years,
            ignitions,
            total_c = cell.total_carbon(),
            "stage complete"
        );

        Ok(StageOutcome {
            stage,
            requested_years: years,
            effective_years,
            modules,
            ignitions,
            fire_emissions,
            record,
            fri_inconsistent,
        })
    }

    /// Run every stage in `plan` with a nonzero duration, in order.
    ///
    /// Each checkpointing stage writes its record into its store at
    /// `coord`; each stage with a restart source reads from that source's
    /// store first.
    ///
    /// # Errors
    /// The first stage failure, or a missing store for a stage that needs
    /// one. Later stages do not run.
    pub fn run_cell(
        &self,
        coord: CellCoord,
        cell: &mut CellState,
        plan: &StagePlan,
        stores: &RestartStores,
    ) -> Result<Vec<StageOutcome>, CellError> {
        let mut outcomes = Vec::new();

        for stage in StageMachine::new(plan.years) {
            let _span = info_span!("stage", stage = stage.id()).entered();

            let incoming = match stage.restart_source() {
                Some(source) => Some(
                    stores
                        .get(source)
                        .ok_or_else(|| {
                            CellError::Input(format!("no {source} restart store for {stage}"))
                        })?
                        .read(coord.row, coord.col)?,
                ),
                None => None,
            };

            let outcome = self.run_stage(
                cell,
                stage,
                plan.years.years(stage),
                plan.modules_for(stage),
                incoming.as_ref(),
            )?;

            if let Some(record) = &outcome.record {
                let store = stores.get(stage).ok_or_else(|| {
                    CellError::Input(format!("no restart store for {stage}"))
                })?;
                store.write(coord.row, coord.col, record.clone())?;
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
