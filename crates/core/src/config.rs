//! Run configuration loaded from a JSON control file
//!
//! Every section is optional; missing keys take their defaults, so
//! `{}` is a valid control file describing a single black spruce cell run
//! with the default stage durations.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core_types::{CellState, FireRegime, MAX_SOIL_LAYERS};
use crate::disturbance::{FireParameters, FireSchedule, Severity};
use crate::error::ConfigError;
use crate::simulation::{BaselineProcesses, StagePlan};

/// Name of the run-status file inside the output directory
pub const RUN_STATUS_FILE: &str = "run_status.json";

/// Name of the failure log inside the output directory
pub const FAIL_LOG_FILE: &str = "fail_log.txt";

/// Replace `path` with `contents` through a sibling temporary file, so a
/// reader never sees a partially written file.
pub(crate) fn write_replacing(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// Initial conditions shared by every cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellTemplate {
    pub regime: FireRegime,
    /// Explicit fires for transient and scenario stages
    pub fire_schedule: FireSchedule,
    /// Starting state; the built-in black spruce stand when absent
    pub initial_state: Option<CellState>,
}

impl CellTemplate {
    /// Starting state with this template's fire regime
    pub fn cell_state(&self) -> CellState {
        let mut state = self
            .initial_state
            .clone()
            .unwrap_or_else(CellState::boreal_black_spruce);
        state.regime = self.regime;
        state.sync_pft_soil_views();
        state
    }
}

/// Everything a run needs besides the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub run_name: String,
    pub output_dir: PathBuf,
    /// JSON array-of-arrays mask; a single active cell when absent
    pub run_mask: Option<PathBuf>,
    pub stages: StagePlan,
    pub fire: FireParameters,
    pub processes: BaselineProcesses,
    pub cell: CellTemplate,
    /// Minimum seconds between run-status saves while the grid runs
    pub status_save_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_name: "tem-run".to_string(),
            output_dir: PathBuf::from("output"),
            run_mask: None,
            stages: StagePlan::default(),
            fire: FireParameters::default(),
            processes: BaselineProcesses::default(),
            cell: CellTemplate::default(),
            status_save_secs: 30,
        }
    }
}

impl RunConfig {
    /// Read and validate a control file.
    ///
    /// # Errors
    /// Unreadable or malformed files, and anything [`RunConfig::validate`]
    /// rejects.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!(path = ?path, run = %config.run_name, "loaded control file");
        Ok(config)
    }

    /// Check the parts of the configuration a cell run cannot recover from.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fire.validate()?;

        let regime = &self.cell.regime;
        if regime.fri == 0 {
            return Err(ConfigError::Invalid(
                "cell.regime.fri must be at least 1".to_string(),
            ));
        }
        Severity::try_from(regime.fri_severity)
            .map_err(|e| ConfigError::Invalid(format!("cell.regime.fri_severity: {e}")))?;

        if let Some(state) = &self.cell.initial_state {
            if state.soil.is_empty() || state.soil.len() > MAX_SOIL_LAYERS {
                return Err(ConfigError::Invalid(format!(
                    "cell.initial_state has {} soil layers, expected 1..={MAX_SOIL_LAYERS}",
                    state.soil.len()
                )));
            }
            if !state.root_fractions_normalized(1e-6) {
                return Err(ConfigError::Invalid(
                    "cell.initial_state root fractions do not sum to 1 for every present PFT"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn run_status_path(&self) -> PathBuf {
        self.output_dir.join(RUN_STATUS_FILE)
    }

    pub fn fail_log_path(&self) -> PathBuf {
        self.output_dir.join(FAIL_LOG_FILE)
    }

    pub fn status_save_interval(&self) -> Duration {
        Duration::from_secs(self.status_save_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Stage;

    #[test]
    fn test_empty_control_file_uses_defaults() {
        let config: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.stages.years.eq_yrs, 1000);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "run_name": "test",
                "stages": {"pr_yrs": 2, "eq_yrs": 40, "modules": {"sp-run": {"dsb": false}}},
                "cell": {"regime": {"fri": 20, "drainage": "poor", "fri_severity": 3}},
                "fire": {"r_retain_c": 0.2}
            }"#,
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.run_name, "test");
        assert_eq!(config.stages.years.eq_yrs, 40);
        assert!(!config.stages.modules_for(Stage::Spinup).dsb);
        assert_eq!(config.cell.cell_state().regime.fri, 20);
        assert_eq!(config.fire.r_retain_c, 0.2);
    }

    #[test]
    fn test_invalid_regime_rejected() {
        let mut config = RunConfig::default();
        config.cell.regime.fri = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = RunConfig::default();
        config.cell.regime.fri_severity = 7;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fri_severity"), "{err}");
    }

    #[test]
    fn test_initial_state_checked() {
        let mut state = CellState::boreal_black_spruce();
        state.soil.layers[3].root_frac[0] += 0.3;
        let mut config = RunConfig::default();
        config.cell.initial_state = Some(state);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_replacing_leaves_no_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_status.json");
        fs::write(&path, "old").unwrap();
        write_replacing(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!dir.path().join("run_status.json.tmp").exists());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RunConfig::load(Path::new("/nonexistent/tem/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
