//! Module-enablement switches
//!
//! A `ModuleConfig` is a plain value built for each stage and handed down the
//! call chain of one cell's run. Nothing here is global, so concurrent cell
//! runs never see each other's switches.

use serde::{Deserialize, Serialize};

/// Which physical subsystems are active.
#[expect(clippy::struct_excessive_bools, reason = "one independent switch per subsystem")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Environment: snow/soil thermal and hydrologic state
    pub env: bool,
    /// Biogeochemistry: vegetation and soil C/N cycling
    pub bgc: bool,
    /// Nitrogen limitation feedback on growth
    pub nfeed: bool,
    /// Disturbance (fire)
    pub dsb: bool,
    /// Dynamic vegetation
    pub dvm: bool,
    /// Dynamic soil layering
    pub dsl: bool,
}

impl ModuleConfig {
    /// Environment only, used to bring soil temperature and moisture to a
    /// reasonable starting point
    pub const ENV_ONLY: ModuleConfig = ModuleConfig {
        env: true,
        bgc: false,
        nfeed: false,
        dsb: false,
        dvm: false,
        dsl: false,
    };

    /// Every subsystem on
    pub const FULL: ModuleConfig = ModuleConfig {
        env: true,
        bgc: true,
        nfeed: true,
        dsb: true,
        dvm: true,
        dsl: true,
    };
}

/// Optional per-switch overrides read from the control file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleOverrides {
    pub env: Option<bool>,
    pub bgc: Option<bool>,
    pub nfeed: Option<bool>,
    pub dsb: Option<bool>,
    pub dvm: Option<bool>,
    pub dsl: Option<bool>,
}

impl ModuleOverrides {
    /// Apply the overrides on top of `base`
    pub fn apply(&self, base: ModuleConfig) -> ModuleConfig {
        ModuleConfig {
            env: self.env.unwrap_or(base.env),
            bgc: self.bgc.unwrap_or(base.bgc),
            nfeed: self.nfeed.unwrap_or(base.nfeed),
            dsb: self.dsb.unwrap_or(base.dsb),
            dvm: self.dvm.unwrap_or(base.dvm),
            dsl: self.dsl.unwrap_or(base.dsl),
        }
    }
}
