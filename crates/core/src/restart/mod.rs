//! Checkpoint and restart persistence between stages

pub mod record;
pub mod store;

pub use record::{RestartRecord, SOIL_TEMPERATURE_FLOOR};
pub use store::{RestartStore, RestartStores, EXTENT_FILE};
