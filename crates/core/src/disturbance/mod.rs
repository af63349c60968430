//! Disturbance: wildfire timing, severity and burn redistribution

pub mod ignition;
pub mod params;
pub mod severity;
pub mod wildfire;

pub use ignition::{fri_ignition, FireEvent, FireSchedule, IgnitionSource, FRI_FIRE_MONTHS};
pub use params::FireParameters;
pub use severity::{
    derive_fire_severity, derive_fire_severity_raw, FireSeason, FireSize, Severity,
};
pub use wildfire::{BurnSummary, WildFire};
