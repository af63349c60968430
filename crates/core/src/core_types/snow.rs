//! Snow pack state carried between stages
//!
//! Snow physics is outside this crate; the pack is carried so a restart
//! resumes with the same insulation the processes left behind.

use serde::{Deserialize, Serialize};

/// Bulk snow pack.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SnowPack {
    /// Depth (m)
    pub thickness: f64,
    /// Snow water equivalent (kg/m²)
    pub swe: f64,
    /// Bulk temperature (°C)
    pub temperature: f64,
}

impl SnowPack {
    pub fn is_bare(&self) -> bool {
        self.swe <= 0.0
    }
}
