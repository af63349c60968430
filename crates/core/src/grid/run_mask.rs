//! Run mask: which cells of the grid to simulate

use std::fs;
use std::path::Path;

use crate::core_types::CellCoord;
use crate::error::MaskError;

/// Rectangular grid of on/off flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMask {
    rows: usize,
    cols: usize,
    active: Vec<bool>,
}

impl RunMask {
    /// Build a mask from rows of 0/1 values.
    ///
    /// # Errors
    /// An empty mask, rows of differing length, or any value other than 0 or 1.
    pub fn from_rows(rows: &[Vec<i64>]) -> Result<Self, MaskError> {
        let cols = rows.first().map_or(0, Vec::len);
        if cols == 0 {
            return Err(MaskError::Empty);
        }

        let mut active = Vec::with_capacity(rows.len() * cols);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != cols {
                return Err(MaskError::Ragged {
                    row,
                    expected: cols,
                    actual: values.len(),
                });
            }
            for (col, &value) in values.iter().enumerate() {
                match value {
                    0 => active.push(false),
                    1 => active.push(true),
                    _ => return Err(MaskError::Value { row, col, value }),
                }
            }
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            active,
        })
    }

    /// Read a mask stored as a JSON array of arrays.
    ///
    /// # Errors
    /// I/O and parse failures, plus everything [`RunMask::from_rows`] rejects.
    pub fn load(path: &Path) -> Result<Self, MaskError> {
        let contents = fs::read_to_string(path).map_err(|source| MaskError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rows: Vec<Vec<i64>> = serde_json::from_str(&contents)?;
        Self::from_rows(&rows)
    }

    /// Every cell active
    pub fn all_active(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            active: vec![true; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_active(&self, coord: CellCoord) -> bool {
        coord.row < self.rows
            && coord.col < self.cols
            && self.active[coord.row * self.cols + coord.col]
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Every coordinate in row-major order
    pub fn coords(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| CellCoord::new(row, col)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let mask = RunMask::from_rows(&[vec![1, 0, 1], vec![0, 1, 0]]).unwrap();
        assert_eq!((mask.rows(), mask.cols()), (2, 3));
        assert_eq!(mask.active_count(), 3);
        assert!(mask.is_active(CellCoord::new(1, 1)));
        assert!(!mask.is_active(CellCoord::new(1, 2)));
        assert!(!mask.is_active(CellCoord::new(5, 0)));
        assert_eq!(mask.coords().count(), 6);
    }

    #[test]
    fn test_malformed_masks_rejected() {
        assert!(matches!(RunMask::from_rows(&[]), Err(MaskError::Empty)));
        assert!(matches!(
            RunMask::from_rows(&[vec![1, 1], vec![1]]),
            Err(MaskError::Ragged { row: 1, expected: 2, actual: 1 })
        ));
        assert!(matches!(
            RunMask::from_rows(&[vec![1, 2]]),
            Err(MaskError::Value { row: 0, col: 1, value: 2 })
        ));
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run-mask.json");
        fs::write(&path, "[[0, 1], [1, 1]]").unwrap();
        let mask = RunMask::load(&path).unwrap();
        assert_eq!(mask.active_count(), 3);

        fs::write(&path, "[[0, 1], oops").unwrap();
        assert!(matches!(RunMask::load(&path), Err(MaskError::Parse(_))));
        assert!(matches!(
            RunMask::load(&dir.path().join("absent.json")),
            Err(MaskError::Io { .. })
        ));
    }
}
