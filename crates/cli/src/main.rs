//! Command-line driver: loads the control file and run mask, prepares the
//! output directory and runs the grid.
//!
//! The exit code reflects only failures before the grid loop starts.
//! Individual cell failures show up in the run-status file and failure log.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tem_core::config::{FAIL_LOG_FILE, RUN_STATUS_FILE};
use tem_core::{
    ConfigError, FailureLog, GridError, GridOrchestrator, GridOutputs, GridSummary, MaskError,
    RestartError, RestartStores, RunConfig, RunMask, RunStatusGrid, Stage, TemplateCellSource,
};

/// Multi-stage terrestrial ecosystem model with wildfire
#[derive(Parser, Debug)]
#[command(name = "tem")]
#[command(about = "Stage-sequenced ecosystem carbon/nitrogen simulation over a grid", long_about = None)]
struct Args {
    /// JSON control file (defaults apply when omitted)
    #[arg(short = 'f', long = "ctrl-file")]
    ctrl_file: Option<PathBuf>,

    /// Pre-run years
    #[arg(short = 'p', long)]
    pr_yrs: Option<u32>,

    /// Equilibrium years
    #[arg(short = 'e', long)]
    eq_yrs: Option<u32>,

    /// Spinup years
    #[arg(short = 's', long)]
    sp_yrs: Option<u32>,

    /// Transient years
    #[arg(short = 't', long)]
    tr_yrs: Option<u32>,

    /// Scenario years
    #[arg(short = 'n', long)]
    sc_yrs: Option<u32>,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,

    /// Worker threads (0 = one per core)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Keep the previous run's status file and failure log
    #[arg(long)]
    no_output_cleanup: bool,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mask(#[from] MaskError),

    #[error(transparent)]
    Restart(#[from] RestartError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("preparing output directory {path:?}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => 2,
            AppError::Mask(_) => 3,
            AppError::Restart(_) | AppError::Output { .. } => 4,
            AppError::Grid(_) => 5,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(&args) {
        Ok(summary) => {
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                skipped = summary.skipped,
                "run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: &Args) -> Result<GridSummary, AppError> {
    let mut config = match &args.ctrl_file {
        Some(path) => RunConfig::load(path)?,
        None => {
            let config = RunConfig::default();
            config.validate()?;
            config
        }
    };
    apply_year_overrides(&mut config, args);

    let mask = match &config.run_mask {
        Some(path) => RunMask::load(path)?,
        None => RunMask::all_active(1, 1),
    };
    let (rows, cols) = (mask.rows(), mask.cols());

    prepare_output_dir(&config.output_dir, !args.no_output_cleanup)?;

    info!(
        run = %config.run_name,
        rows,
        cols,
        active = mask.active_count(),
        stages = ?config.stages.years.active_stages(),
        "preparing grid run"
    );

    let stores = RestartStores::prepare(&config.output_dir, &config.stages.years, rows, cols)?;
    let status_path = config.run_status_path();
    let status =
        RunStatusGrid::new(rows, cols).with_autosave(&status_path, config.status_save_interval());
    status.save(&status_path)?;
    let failures = FailureLog::open(&config.fail_log_path())?;

    let source = TemplateCellSource::new(config.cell.cell_state(), config.cell.fire_schedule.clone());
    let orchestrator = GridOrchestrator::new(
        config.stages.clone(),
        config.fire.clone(),
        Box::new(config.processes.clone()),
        Box::new(source),
    )
    .with_threads(args.threads);

    let summary = orchestrator.run(
        &mask,
        &GridOutputs {
            stores: &stores,
            status: &status,
            failures: &failures,
        },
    )?;
    status.save(&status_path)?;

    if summary.failed > 0 {
        warn!(
            failed = summary.failed,
            log = ?failures.path(),
            "some cells failed"
        );
    }
    Ok(summary)
}

fn apply_year_overrides(config: &mut RunConfig, args: &Args) {
    let overrides = [
        (Stage::PreRun, args.pr_yrs),
        (Stage::Equilibrium, args.eq_yrs),
        (Stage::Spinup, args.sp_yrs),
        (Stage::Transient, args.tr_yrs),
        (Stage::Scenario, args.sc_yrs),
    ];
    for (stage, years) in overrides {
        if let Some(years) = years {
            config.stages.years.set_years(stage, years);
        }
    }
}

/// Create the output directory and, unless told not to, clear the previous
/// run's status file and failure log. Restart stores are left for stages
/// that resume from them.
fn prepare_output_dir(dir: &Path, cleanup: bool) -> Result<(), AppError> {
    let io_err = |source| AppError::Output {
        path: dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(io_err)?;
    if cleanup {
        for name in [RUN_STATUS_FILE, FAIL_LOG_FILE] {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_file(&path).map_err(io_err)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_flags_override_control_file() {
        let args = Args::parse_from(["tem", "-p", "0", "-e", "250", "--sc-yrs", "5"]);
        let mut config = RunConfig::default();
        apply_year_overrides(&mut config, &args);
        assert_eq!(config.stages.years.pr_yrs, 0);
        assert_eq!(config.stages.years.eq_yrs, 250);
        assert_eq!(config.stages.years.sp_yrs, 100);
        assert_eq!(config.stages.years.sc_yrs, 5);
    }

    #[test]
    fn test_cleanup_removes_only_run_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in [RUN_STATUS_FILE, FAIL_LOG_FILE] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("restart-eq")).unwrap();
        prepare_output_dir(dir.path(), true).unwrap();
        assert!(!dir.path().join(RUN_STATUS_FILE).exists());
        assert!(!dir.path().join(FAIL_LOG_FILE).exists());
        assert!(dir.path().join("restart-eq").is_dir());
    }

    #[test]
    fn test_end_to_end_single_cell() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let ctrl = dir.path().join("config.json");
        fs::write(
            &ctrl,
            format!(
                r#"{{"output_dir": {:?}, "stages": {{"pr_yrs": 1, "eq_yrs": 12, "sp_yrs": 2}},
                    "cell": {{"regime": {{"fri": 5, "drainage": "well", "fri_severity": 2}}}}}}"#,
                out.to_str().unwrap()
            ),
        )
        .unwrap();

        let args = Args::parse_from(["tem", "-f", ctrl.to_str().unwrap()]);
        let summary = run(&args).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert!(out.join("restart-eq").is_dir());
        assert!(out.join("restart-sp").join("0_0.json").exists());
        assert!(!out.join("restart-tr").exists());

        let status: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(RUN_STATUS_FILE)).unwrap()).unwrap();
        assert_eq!(status["status"], serde_json::json!([[100]]));
    }
}
