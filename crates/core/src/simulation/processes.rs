//! Monthly process updates applied to a cell
//!
//! The stage controller treats process physics as opaque: it hands the cell,
//! the stage's module switches and the current year and month to a
//! [`MonthlyProcesses`] implementation and expects the cell back. The
//! baseline implementation here is a small deterministic box model that keeps
//! pools moving between fires. It is not a physical model.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use super::modules::ModuleConfig;
use crate::core_types::{CellState, PftPart, MONTHS_PER_YEAR, NUM_PFT};
use crate::error::CellError;

/// One month of everything that is not disturbance.
pub trait MonthlyProcesses: Send + Sync {
    /// Advance `cell` by one month.
    ///
    /// # Errors
    /// Any failure that should abort this cell's run.
    fn update_month(
        &self,
        cell: &mut CellState,
        modules: &ModuleConfig,
        year: u32,
        month: u32,
    ) -> Result<(), CellError>;
}

/// Deterministic seasonal box model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineProcesses {
    /// Annual mean surface temperature (°C)
    pub mean_temperature: f64,
    /// Half the annual surface temperature range (°C)
    pub temperature_amplitude: f64,
    /// e-folding depth of the seasonal soil temperature wave (m)
    pub damping_depth: f64,
    /// Net primary production at full cover (gC/m²/yr)
    pub npp: f64,
    /// Leaf:stem:root allocation of new growth
    pub allocation: [f64; 3],
    /// C:N of new leaf, stem and root tissue
    pub tissue_cn: [f64; 3],
    /// Monthly turnover of leaf, stem and root
    pub turnover: [f64; 3],
    /// Monthly fraction of standing dead that falls to woody debris
    pub deadfall: f64,
    /// Monthly decomposition rate of raw carbon at 10 °C
    pub decomposition: f64,
    /// Decomposition temperature sensitivity
    pub q10: f64,
    /// Dead moss accumulation in growing-season months (gC/m²)
    pub moss_growth: f64,
}

impl Default for BaselineProcesses {
    fn default() -> Self {
        Self {
            mean_temperature: -3.0,
            temperature_amplitude: 18.0,
            damping_depth: 0.6,
            npp: 180.0,
            allocation: [0.3, 0.45, 0.25],
            tissue_cn: [40.0, 300.0, 80.0],
            turnover: [0.02, 0.001, 0.006],
            deadfall: 0.008,
            decomposition: 0.004,
            q10: 2.0,
            moss_growth: 1.5,
        }
    }
}

/// Zero-based months (May through September) with growth
const GROWING_MONTHS: std::ops::RangeInclusive<u32> = 4..=8;

/// Relative decay rates of raw, active, physically and chemically resistant
/// carbon
const POOL_DECAY: [f64; 4] = [1.0, 0.5, 0.05, 0.005];

/// Dead moss C:N
const MOSS_CN: f64 = 75.0;

/// Snow density (kg/m³)
const SNOW_DENSITY: f64 = 250.0;

impl BaselineProcesses {
    /// Surface temperature for a zero-based month, coldest in January
    pub fn surface_temperature(&self, month: u32) -> f64 {
        let phase = TAU * (f64::from(month) + 0.5) / f64::from(MONTHS_PER_YEAR);
        self.mean_temperature - self.temperature_amplitude * (phase - TAU / 24.0).cos()
    }

    fn update_environment(&self, cell: &mut CellState, month: u32) {
        let t_air = self.surface_temperature(month);

        // Snow accumulates below freezing and melts above
        if t_air < 0.0 {
            cell.snow.swe += 25.0;
        } else {
            cell.snow.swe = (cell.snow.swe - 12.0 * t_air).max(0.0);
        }
        cell.snow.thickness = cell.snow.swe / SNOW_DENSITY;
        cell.snow.temperature = if cell.snow.is_bare() { 0.0 } else { t_air.min(0.0) };

        // Snow insulates the column against the cold half of the wave
        let insulation = (-cell.snow.thickness / 0.25).exp();
        let anomaly = t_air - self.mean_temperature;
        let surface_anomaly = if anomaly < 0.0 { anomaly * insulation } else { anomaly };

        let mut top = 0.0;
        for layer in &mut cell.soil.layers {
            let mid = top + 0.5 * layer.thickness;
            top += layer.thickness;
            layer.temperature =
                self.mean_temperature + surface_anomaly * (-mid / self.damping_depth).exp();
        }
    }

    fn update_vegetation(&self, cell: &mut CellState, modules: &ModuleConfig, month: u32) {
        let growing = GROWING_MONTHS.contains(&month);
        let months = GROWING_MONTHS.count() as f64;

        for ip in 0..NUM_PFT {
            if !cell.veg[ip].is_present() {
                continue;
            }

            // Turnover: leaves to surface litter, stems to woody debris,
            // roots to litter where they grew
            let mut litter = [(0.0, 0.0); 3];
            {
                let veg = &mut cell.veg[ip];
                for part in PftPart::ALL {
                    let i = part.index();
                    let c = veg.c[i] * self.turnover[i];
                    let n = veg.strn[i] * self.turnover[i];
                    veg.c[i] -= c;
                    veg.strn[i] -= n;
                    litter[i] = (c, n);
                }
            }
            let (leaf_c, leaf_n) = litter[PftPart::Leaf.index()];
            let (stem_c, stem_n) = litter[PftPart::Stem.index()];
            let (root_c, root_n) = litter[PftPart::Root.index()];
            cell.soil.wdebrisc += stem_c;
            cell.soil.wdebrisn += stem_n;
            if let Some(surface) = cell.soil.layers.first_mut() {
                surface.rawc += leaf_c;
                surface.orgn += leaf_n;
            }
            for layer in &mut cell.soil.layers {
                layer.rawc += root_c * layer.root_frac[ip];
                layer.orgn += root_n * layer.root_frac[ip];
            }

            let veg = &mut cell.veg[ip];
            let fall_c = veg.deadc * self.deadfall;
            let fall_n = veg.deadn * self.deadfall;
            veg.deadc -= fall_c;
            veg.deadn -= fall_n;
            cell.soil.wdebrisc += fall_c;
            cell.soil.wdebrisn += fall_n;

            if !(modules.dvm && growing) {
                continue;
            }

            let growth_c = self.npp * cell.veg[ip].cover / months;
            let demand_n: f64 = (0..3)
                .map(|i| growth_c * self.allocation[i] / self.tissue_cn[i])
                .sum();
            let scale = if modules.nfeed {
                take_available_n(cell, ip, demand_n) / demand_n.max(f64::MIN_POSITIVE)
            } else {
                1.0
            };

            let veg = &mut cell.veg[ip];
            for i in 0..3 {
                let c = growth_c * self.allocation[i] * scale;
                veg.c[i] += c;
                veg.strn[i] += c / self.tissue_cn[i];
            }
        }
    }

    fn update_soil(&self, cell: &mut CellState, modules: &ModuleConfig, month: u32) {
        for layer in &mut cell.soil.layers {
            let k = self.decomposition * self.q10.powf((layer.temperature - 10.0) / 10.0);
            let c_before = layer.organic_carbon();
            layer.rawc -= layer.rawc * (k * POOL_DECAY[0]).min(1.0);
            layer.soma -= layer.soma * (k * POOL_DECAY[1]).min(1.0);
            layer.sompr -= layer.sompr * (k * POOL_DECAY[2]).min(1.0);
            layer.somcr -= layer.somcr * (k * POOL_DECAY[3]).min(1.0);

            // Nitrogen mineralises in step with carbon
            if c_before > 0.0 {
                let lost = 1.0 - layer.organic_carbon() / c_before;
                let mineralised = layer.orgn * lost;
                layer.orgn -= mineralised;
                layer.avln += mineralised;
            }
        }

        let k_debris = self.decomposition * 0.25;
        cell.soil.wdebrisc -= cell.soil.wdebrisc * k_debris;
        cell.soil.wdebrisn -= cell.soil.wdebrisn * k_debris;

        if modules.dsl && GROWING_MONTHS.contains(&month) {
            cell.soil.dmossc += self.moss_growth;
            cell.soil.dmossn += self.moss_growth / MOSS_CN;
        }

        // Fire nitrogen comes back evenly over the year
        if modules.dsb {
            if let Some(surface) = cell.soil.layers.first_mut() {
                surface.avln += cell.fire.atm_to_soil_n / f64::from(MONTHS_PER_YEAR);
            }
        }
    }
}

/// Draw up to `demand` available nitrogen from the layers a PFT roots in.
fn take_available_n(cell: &mut CellState, ip: usize, demand: f64) -> f64 {
    let supply: f64 = cell
        .soil
        .layers
        .iter()
        .map(|l| l.avln * l.root_frac[ip])
        .sum();
    if supply <= 0.0 {
        return 0.0;
    }
    let taken = demand.min(supply);
    let share = taken / supply;
    for layer in &mut cell.soil.layers {
        layer.avln -= layer.avln * layer.root_frac[ip] * share;
    }
    taken
}

impl MonthlyProcesses for BaselineProcesses {
    fn update_month(
        &self,
        cell: &mut CellState,
        modules: &ModuleConfig,
        year: u32,
        month: u32,
    ) -> Result<(), CellError> {
        if modules.env {
            self.update_environment(cell, month);
        }
        if modules.bgc {
            self.update_vegetation(cell, modules, month);
            self.update_soil(cell, modules, month);
        }
        if modules.env || modules.bgc {
            cell.sync_pft_soil_views();
        }

        let carbon = cell.total_carbon();
        if !carbon.is_finite() || carbon < 0.0 {
            return Err(CellError::Process {
                year,
                month,
                reason: format!("total carbon became {carbon}"),
            });
        }
        Ok(())
    }
}
