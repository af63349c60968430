//! Per-stage restart stores
//!
//! Each checkpointing stage owns one store covering the full grid. On disk
//! a store is a directory holding its extent and one file per cell slot;
//! a slot with no file holds the sentinel record. Each cell only ever reads
//! or writes its own slot, so cell runs never wait on each other and a
//! crash mid-write can damage at most the slot being replaced.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::record::RestartRecord;
use crate::config::write_replacing;
use crate::error::RestartError;
use crate::simulation::{Stage, StageYears};

/// File inside a store directory recording its grid extent
pub const EXTENT_FILE: &str = "extent.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Extent {
    rows: usize,
    cols: usize,
}

#[derive(Debug)]
enum Slots {
    Memory(Vec<Mutex<RestartRecord>>),
    Files(PathBuf),
}

/// Restart records for one stage, one slot per grid cell.
#[derive(Debug)]
pub struct RestartStore {
    stage: Stage,
    rows: usize,
    cols: usize,
    slots: Slots,
}

impl RestartStore {
    /// Directory of a stage's store inside an output directory, `None` for
    /// stages that never checkpoint.
    pub fn path_for(dir: &Path, stage: Stage) -> Option<PathBuf> {
        stage.restart_tag().map(|tag| dir.join(tag))
    }

    /// A store that lives only in memory.
    pub fn in_memory(stage: Stage, rows: usize, cols: usize) -> Self {
        Self {
            stage,
            rows,
            cols,
            slots: Slots::Memory(
                (0..rows * cols)
                    .map(|_| Mutex::new(RestartRecord::missing()))
                    .collect(),
            ),
        }
    }

    /// Create (or empty) a stage's store at full extent, every slot
    /// holding the sentinel record.
    ///
    /// # Errors
    /// Returns [`RestartError::Io`] when the directory cannot be prepared,
    /// or [`RestartError::NoStore`] for a stage that never checkpoints.
    pub fn create(dir: &Path, stage: Stage, rows: usize, cols: usize) -> Result<Self, RestartError> {
        let path = Self::path_for(dir, stage).ok_or(RestartError::NoStore(stage.id()))?;
        let io_err = |source| RestartError::Io {
            path: path.clone(),
            source,
        };
        if let Err(e) = fs::remove_dir_all(&path) {
            if e.kind() != ErrorKind::NotFound {
                return Err(io_err(e));
            }
        }
        fs::create_dir_all(&path).map_err(io_err)?;

        let extent_path = path.join(EXTENT_FILE);
        let contents = serde_json::to_vec(&Extent { rows, cols })?;
        write_replacing(&extent_path, &contents).map_err(|source| RestartError::Io {
            path: extent_path,
            source,
        })?;

        info!(stage = stage.id(), rows, cols, path = ?path, "created restart store");
        Ok(Self {
            stage,
            rows,
            cols,
            slots: Slots::Files(path),
        })
    }

    /// Open an existing store written by an earlier invocation.
    ///
    /// # Errors
    /// I/O or decoding failures on the extent file, or a store whose extent
    /// differs from `rows` × `cols`.
    pub fn open(dir: &Path, stage: Stage, rows: usize, cols: usize) -> Result<Self, RestartError> {
        let path = Self::path_for(dir, stage).ok_or(RestartError::NoStore(stage.id()))?;
        let extent_path = path.join(EXTENT_FILE);
        let contents = fs::read_to_string(&extent_path).map_err(|source| RestartError::Io {
            path: extent_path.clone(),
            source,
        })?;
        let extent: Extent = serde_json::from_str(&contents)?;

        if extent != (Extent { rows, cols }) {
            return Err(RestartError::StoreShape {
                path,
                expected: rows * cols,
                actual: extent.rows * extent.cols,
            });
        }

        debug!(stage = stage.id(), path = ?path, "opened restart store");
        Ok(Self {
            stage,
            rows,
            cols,
            slots: Slots::Files(path),
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Store directory, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        match &self.slots {
            Slots::Files(dir) => Some(dir),
            Slots::Memory(_) => None,
        }
    }

    /// File backing one slot, `None` for in-memory stores
    pub fn slot_path(&self, row: usize, col: usize) -> Option<PathBuf> {
        self.path().map(|dir| slot_file(dir, row, col))
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Copy of one cell's record.
    ///
    /// # Errors
    /// Returns [`RestartError::OutOfBounds`] for a coordinate outside the
    /// grid, or an I/O or decoding failure on the slot file.
    pub fn read(&self, row: usize, col: usize) -> Result<RestartRecord, RestartError> {
        let idx = self.index(row, col)?;
        match &self.slots {
            Slots::Memory(records) => Ok(lock(&records[idx]).clone()),
            Slots::Files(dir) => {
                let path = slot_file(dir, row, col);
                match fs::read_to_string(&path) {
                    Ok(contents) => Ok(serde_json::from_str(&contents)?),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(RestartRecord::missing()),
                    Err(source) => Err(RestartError::Io { path, source }),
                }
            }
        }
    }

    /// Replace one cell's record. Other slots are never touched.
    ///
    /// # Errors
    /// Out-of-bounds coordinates, or failure writing the slot file.
    pub fn write(&self, row: usize, col: usize, record: RestartRecord) -> Result<(), RestartError> {
        let idx = self.index(row, col)?;
        match &self.slots {
            Slots::Memory(records) => {
                *lock(&records[idx]) = record;
                Ok(())
            }
            Slots::Files(dir) => {
                let path = slot_file(dir, row, col);
                let contents = serde_json::to_vec(&record)?;
                write_replacing(&path, &contents).map_err(|source| RestartError::Io { path, source })
            }
        }
    }

    fn index(&self, row: usize, col: usize) -> Result<usize, RestartError> {
        if row < self.rows && col < self.cols {
            Ok(row * self.cols + col)
        } else {
            Err(RestartError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }
}

fn slot_file(dir: &Path, row: usize, col: usize) -> PathBuf {
    dir.join(format!("{row}_{col}.json"))
}

fn lock(slot: &Mutex<RestartRecord>) -> std::sync::MutexGuard<'_, RestartRecord> {
    // A panic elsewhere never leaves a half-written record behind
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The restart stores one grid run reads from and writes to.
#[derive(Debug, Default)]
pub struct RestartStores {
    by_stage: BTreeMap<Stage, RestartStore>,
}

impl RestartStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory stores for every checkpointing stage.
    pub fn in_memory(rows: usize, cols: usize) -> Self {
        let mut stores = Self::new();
        for stage in Stage::ALL.into_iter().filter(|s| s.checkpoints()) {
            stores.insert(RestartStore::in_memory(stage, rows, cols));
        }
        stores
    }

    /// Create a store for every stage that will run, and open the stores
    /// those stages restart from when an earlier invocation wrote them.
    ///
    /// # Errors
    /// Failure creating an output store, or a missing or malformed store
    /// that an active stage needs to restart from.
    pub fn prepare(
        dir: &Path,
        years: &StageYears,
        rows: usize,
        cols: usize,
    ) -> Result<Self, RestartError> {
        let active = years.active_stages();
        let mut stores = Self::new();

        for &stage in active.iter().filter(|s| s.checkpoints()) {
            stores.insert(RestartStore::create(dir, stage, rows, cols)?);
        }
        for source in active.iter().filter_map(|s| s.restart_source()) {
            if stores.get(source).is_none() {
                stores.insert(RestartStore::open(dir, source, rows, cols)?);
            }
        }
        Ok(stores)
    }

    pub fn insert(&mut self, store: RestartStore) {
        self.by_stage.insert(store.stage(), store);
    }

    pub fn get(&self, stage: Stage) -> Option<&RestartStore> {
        self.by_stage.get(&stage)
    }

    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.by_stage.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::CellState;

    #[test]
    fn test_created_store_is_all_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::create(dir.path(), Stage::Equilibrium, 2, 3).unwrap();
        assert!(dir.path().join("restart-eq").join(EXTENT_FILE).exists());
        for row in 0..2 {
            for col in 0..3 {
                assert!(store.read(row, col).unwrap().is_missing());
            }
        }
    }

    #[test]
    fn test_write_persists_only_its_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::create(dir.path(), Stage::Spinup, 2, 2).unwrap();
        let rec = RestartRecord::from_state(&CellState::boreal_black_spruce()).unwrap();
        store.write(1, 0, rec.clone()).unwrap();

        let reopened = RestartStore::open(dir.path(), Stage::Spinup, 2, 2).unwrap();
        assert_eq!(reopened.read(1, 0).unwrap(), rec);
        assert!(reopened.read(0, 0).unwrap().is_missing());
        assert!(reopened.read(1, 1).unwrap().is_missing());
    }

    #[test]
    fn test_write_leaves_other_slot_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::create(dir.path(), Stage::Equilibrium, 3, 3).unwrap();
        let rec = RestartRecord::from_state(&CellState::boreal_black_spruce()).unwrap();

        store.write(0, 0, rec.clone()).unwrap();
        let first = store.slot_path(0, 0).unwrap();
        let written_at = fs::metadata(&first).unwrap().modified().unwrap();
        let bytes = fs::read(&first).unwrap();

        let mut other = rec.clone();
        other.ysf = 42;
        store.write(2, 1, other).unwrap();
        store.write(2, 1, rec).unwrap();

        assert_eq!(fs::metadata(&first).unwrap().modified().unwrap(), written_at);
        assert_eq!(fs::read(&first).unwrap(), bytes);

        let mut names: Vec<String> = fs::read_dir(store.path().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["0_0.json", "2_1.json", EXTENT_FILE]);
    }

    #[test]
    fn test_concurrent_writes_stay_in_their_slots() {
        use rayon::prelude::*;

        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::create(dir.path(), Stage::Spinup, 8, 8).unwrap();
        let base = RestartRecord::from_state(&CellState::boreal_black_spruce()).unwrap();
        (0..64usize).into_par_iter().for_each(|i| {
            let mut rec = base.clone();
            rec.ysf = i as i32;
            store.write(i / 8, i % 8, rec).unwrap();
        });
        for i in 0..64usize {
            assert_eq!(store.read(i / 8, i % 8).unwrap().ysf, i as i32);
        }
    }

    #[test]
    fn test_create_empties_previous_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::create(dir.path(), Stage::Transient, 1, 2).unwrap();
        let rec = RestartRecord::from_state(&CellState::boreal_black_spruce()).unwrap();
        store.write(0, 1, rec).unwrap();

        let recreated = RestartStore::create(dir.path(), Stage::Transient, 1, 2).unwrap();
        assert!(recreated.read(0, 1).unwrap().is_missing());
    }

    #[test]
    fn test_corrupt_slot_is_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::create(dir.path(), Stage::Scenario, 1, 1).unwrap();
        fs::write(store.slot_path(0, 0).unwrap(), "[1, 2").unwrap();
        assert!(matches!(store.read(0, 0), Err(RestartError::Encoding(_))));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let store = RestartStore::in_memory(Stage::Transient, 2, 2);
        assert!(matches!(
            store.read(2, 0),
            Err(RestartError::OutOfBounds { row: 2, col: 0, .. })
        ));
        assert!(store.write(0, 5, RestartRecord::missing()).is_err());
    }

    #[test]
    fn test_open_rejects_wrong_extent() {
        let dir = tempfile::tempdir().unwrap();
        RestartStore::create(dir.path(), Stage::Scenario, 2, 2).unwrap();
        assert!(matches!(
            RestartStore::open(dir.path(), Stage::Scenario, 3, 2),
            Err(RestartError::StoreShape { expected: 6, actual: 4, .. })
        ));
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RestartStore::open(dir.path(), Stage::Spinup, 1, 1),
            Err(RestartError::Io { .. })
        ));
    }

    #[test]
    fn test_pre_run_has_no_store() {
        assert_eq!(RestartStore::path_for(Path::new("out"), Stage::PreRun), None);
        assert_eq!(
            RestartStore::path_for(Path::new("out"), Stage::Transient),
            Some(PathBuf::from("out/restart-tr"))
        );
    }

    #[test]
    fn test_prepare_creates_active_and_opens_sources() {
        let dir = tempfile::tempdir().unwrap();
        let first = StageYears {
            pr_yrs: 1,
            eq_yrs: 5,
            ..StageYears::NONE
        };
        let stores = RestartStores::prepare(dir.path(), &first, 1, 2).unwrap();
        assert_eq!(stores.stages().collect::<Vec<_>>(), vec![Stage::Equilibrium]);

        // A later invocation continues from the equilibrium checkpoint
        let second = StageYears {
            sp_yrs: 5,
            ..StageYears::NONE
        };
        let stores = RestartStores::prepare(dir.path(), &second, 1, 2).unwrap();
        assert_eq!(
            stores.stages().collect::<Vec<_>>(),
            vec![Stage::Equilibrium, Stage::Spinup]
        );
    }

    #[test]
    fn test_prepare_without_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let years = StageYears {
            tr_yrs: 3,
            ..StageYears::NONE
        };
        assert!(matches!(
            RestartStores::prepare(dir.path(), &years, 1, 1),
            Err(RestartError::Io { .. })
        ));
    }
}
