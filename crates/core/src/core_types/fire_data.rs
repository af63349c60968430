//! Fire-derived diagnostic pools
//!
//! Fluxes accumulate within a year and are zeroed by [`FireData::begin_of_year`].
//! The atmosphere-to-soil nitrogen rate is different: it spreads one fire's
//! nitrogen loss over a whole fire cycle, so it survives year boundaries and
//! only changes when a new fire recomputes it.

use serde::{Deserialize, Serialize};

/// Carbon/nitrogen pair (g/m²)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CnFlux {
    pub c: f64,
    pub n: f64,
}

impl CnFlux {
    pub const ZERO: CnFlux = CnFlux { c: 0.0, n: 0.0 };

    pub const fn new(c: f64, n: f64) -> Self {
        Self { c, n }
    }
}

/// Fire fluxes and counters for one cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FireData {
    /// Years since the last fire
    pub ysf: u32,
    /// Organic soil burned by the most recent fire this year (m)
    pub burn_thickness: f64,
    /// Vegetation to atmosphere
    pub veg_to_atm: CnFlux,
    /// Retained above-ground vegetation returned to soil
    pub veg_to_soil_above: CnFlux,
    /// Fire-killed roots returned to soil
    pub veg_to_soil_below: CnFlux,
    /// Soil (and surface debris) to atmosphere
    pub soil_to_atm: CnFlux,
    /// Amortised atmosphere-to-soil nitrogen deposition (g/m²/yr)
    pub atm_to_soil_n: f64,
}

impl FireData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset everything, including the year counter and the amortised
    /// deposition rate.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Zero the within-year accumulators.
    pub fn begin_of_year(&mut self) {
        self.burn_thickness = 0.0;
        self.veg_to_atm = CnFlux::ZERO;
        self.veg_to_soil_above = CnFlux::ZERO;
        self.veg_to_soil_below = CnFlux::ZERO;
        self.soil_to_atm = CnFlux::ZERO;
    }

    pub fn end_of_year(&mut self) {
        self.ysf = self.ysf.saturating_add(1);
    }

    /// Total carbon lost to the atmosphere this year
    pub fn emitted_carbon(&self) -> f64 {
        self.veg_to_atm.c + self.soil_to_atm.c
    }

    /// Total nitrogen lost to the atmosphere this year
    pub fn emitted_nitrogen(&self) -> f64 {
        self.veg_to_atm.n + self.soil_to_atm.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> FireData {
        FireData {
            ysf: 7,
            burn_thickness: 0.12,
            veg_to_atm: CnFlux::new(100.0, 2.0),
            veg_to_soil_above: CnFlux::new(10.0, 0.5),
            veg_to_soil_below: CnFlux::new(20.0, 0.4),
            soil_to_atm: CnFlux::new(300.0, 6.0),
            atm_to_soil_n: 0.8,
        }
    }

    #[test]
    fn test_begin_of_year_zeroes_accumulators() {
        let mut fd = loaded();
        fd.begin_of_year();
        assert_eq!(fd.burn_thickness, 0.0);
        assert_eq!(fd.veg_to_atm, CnFlux::ZERO);
        assert_eq!(fd.veg_to_soil_above, CnFlux::ZERO);
        assert_eq!(fd.veg_to_soil_below, CnFlux::ZERO);
        assert_eq!(fd.soil_to_atm, CnFlux::ZERO);
        // Counter and amortised rate are not within-year quantities
        assert_eq!(fd.ysf, 7);
        assert_eq!(fd.atm_to_soil_n, 0.8);

        let once = fd.clone();
        fd.begin_of_year();
        assert_eq!(fd, once);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut fd = loaded();
        fd.clear();
        assert_eq!(fd, FireData::default());
    }

    #[test]
    fn test_end_of_year_counts_up() {
        let mut fd = FireData::new();
        fd.end_of_year();
        fd.end_of_year();
        assert_eq!(fd.ysf, 2);
    }
}
