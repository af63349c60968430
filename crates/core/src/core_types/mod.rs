//! Core types: cell state, vegetation and soil pools, fire diagnostics

pub mod cell;
pub mod fire_data;
pub mod pft;
pub mod snow;
pub mod soil;

pub use cell::{CellCoord, CellState, Drainage, FireRegime};
pub use fire_data::{CnFlux, FireData};
pub use pft::{PftPart, VegetationPools};
pub use snow::SnowPack;
pub use soil::{SoilColumn, SoilLayer, SoilLayerKind};

/// Number of plant functional type slots per cell
pub const NUM_PFT: usize = 10;

/// Fixed soil layer capacity of a restart record
pub const MAX_SOIL_LAYERS: usize = 23;

/// Sentinel marking a missing or uninitialised numeric value
pub const MISSING: f64 = -9999.0;

/// Integer form of [`MISSING`]
pub const MISSING_I: i32 = -9999;

pub const MONTHS_PER_YEAR: u32 = 12;
