//! Grid runs: one failing cell never affects its neighbours

use std::fs;

use tem_core::core_types::{CellCoord, CellState};
use tem_core::disturbance::{FireParameters, FireSchedule};
use tem_core::error::CellError;
use tem_core::grid::{
    CellInput, CellSource, CellStatus, FailureLog, GridOrchestrator, GridOutputs, GridSummary,
    RunMask, RunStatusGrid, TemplateCellSource,
};
use tem_core::restart::RestartStores;
use tem_core::simulation::{
    BaselineProcesses, ModuleConfig, MonthlyProcesses, Stage, StagePlan, StageYears,
};

/// Fire return interval that marks a cell whose processes panic
const PANIC_FRI: u32 = 13;

/// Baseline processes that panic for marked cells
struct PanicOnMarker(BaselineProcesses);

impl MonthlyProcesses for PanicOnMarker {
    fn update_month(
        &self,
        cell: &mut CellState,
        modules: &ModuleConfig,
        year: u32,
        month: u32,
    ) -> Result<(), CellError> {
        assert!(cell.regime.fri != PANIC_FRI, "synthetic process failure");
        self.0.update_month(cell, modules, year, month)
    }
}

/// The template everywhere except one cell, which gets `fri`
struct OddCellOut {
    coord: CellCoord,
    fri: u32,
}

impl CellSource for OddCellOut {
    fn load(&self, coord: CellCoord) -> Result<CellInput, CellError> {
        let mut state = CellState::boreal_black_spruce();
        state.regime.fri = if coord == self.coord { self.fri } else { 5 };
        Ok(CellInput {
            state,
            schedule: FireSchedule::new(),
        })
    }
}

/// Route cell spans and events to the test harness; `RUST_LOG` filters
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn plan() -> StagePlan {
    StagePlan::new(StageYears {
        pr_yrs: 1,
        eq_yrs: 10,
        sp_yrs: 2,
        tr_yrs: 0,
        sc_yrs: 0,
    })
}

fn orchestrator(source: impl CellSource + 'static) -> GridOrchestrator {
    GridOrchestrator::new(
        plan(),
        FireParameters::default(),
        Box::new(PanicOnMarker(BaselineProcesses::default())),
        Box::new(source),
    )
}

#[test]
fn test_panicking_cell_isolated() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mask = RunMask::from_rows(&[vec![1, 1], vec![0, 1]]).unwrap();
    let stores = RestartStores::prepare(dir.path(), &plan().years, 2, 2).unwrap();
    let status = RunStatusGrid::new(2, 2);
    let log_path = dir.path().join("fail_log.txt");
    let failures = FailureLog::open(&log_path).unwrap();

    let summary = orchestrator(OddCellOut {
        coord: CellCoord::new(1, 1),
        fri: PANIC_FRI,
    })
    .run(
        &mask,
        &GridOutputs {
            stores: &stores,
            status: &status,
            failures: &failures,
        },
    )
    .unwrap();

    assert_eq!(
        summary,
        GridSummary {
            skipped: 1,
            succeeded: 2,
            failed: 1
        }
    );
    assert_eq!(status.snapshot(), vec![vec![100, 100], vec![0, -100]]);
    assert_eq!(status.status(CellCoord::new(1, 1)), Some(CellStatus::Failed));

    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(log, "1,1: panic during cell run: synthetic process failure\n");

    let spinup = stores.get(Stage::Spinup).unwrap();
    assert!(!spinup.read(0, 0).unwrap().is_missing());
    assert!(!spinup.read(0, 1).unwrap().is_missing());
    assert!(spinup.read(1, 0).unwrap().is_missing());
    assert!(spinup.read(1, 1).unwrap().is_missing());

    let status_path = dir.path().join("run_status.json");
    status.save(&status_path).unwrap();
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&status_path).unwrap()).unwrap();
    assert_eq!(saved["status"], serde_json::json!([[100, 100], [0, -100]]));
}

#[test]
fn test_invalid_fri_fails_only_that_cell() {
    init_tracing();
    let mask = RunMask::all_active(1, 3);
    let stores = RestartStores::in_memory(1, 3);
    let status = RunStatusGrid::new(1, 3);
    let failures = FailureLog::in_memory();

    let summary = orchestrator(OddCellOut {
        coord: CellCoord::new(0, 1),
        fri: 0,
    })
    .run(
        &mask,
        &GridOutputs {
            stores: &stores,
            status: &status,
            failures: &failures,
        },
    )
    .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(status.snapshot(), vec![vec![100, -100, 100]]);
    assert_eq!(
        failures.lines(),
        vec!["0,1: fire return interval must be at least one year, got 0"]
    );
    // Pre-run finished but equilibrium never checkpointed
    assert!(stores.get(Stage::Equilibrium).unwrap().read(0, 1).unwrap().is_missing());
}

#[test]
fn test_cells_match_their_standalone_runs() {
    init_tracing();
    let template = || {
        let mut state = CellState::boreal_black_spruce();
        state.regime.fri = 5;
        TemplateCellSource::new(state, FireSchedule::new())
    };

    let grid_stores = RestartStores::in_memory(2, 2);
    let status = RunStatusGrid::new(2, 2);
    let failures = FailureLog::in_memory();
    orchestrator(template())
        .with_threads(3)
        .run(
            &RunMask::all_active(2, 2),
            &GridOutputs {
                stores: &grid_stores,
                status: &status,
                failures: &failures,
            },
        )
        .unwrap();

    let single_stores = RestartStores::in_memory(1, 1);
    let outcomes = orchestrator(template())
        .run_cell(CellCoord::new(0, 0), &single_stores)
        .unwrap();
    let expected = outcomes.last().unwrap().record.clone().unwrap();

    let spinup = grid_stores.get(Stage::Spinup).unwrap();
    for coord in RunMask::all_active(2, 2).coords() {
        assert_eq!(spinup.read(coord.row, coord.col).unwrap(), expected, "cell {coord}");
    }
}
