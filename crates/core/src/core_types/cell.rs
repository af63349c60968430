//! Full mutable state of one spatial cell
//!
//! A `CellState` is owned by exactly one run of one cell. The canonical soil
//! column lives in `soil`; `pft_soil` holds per-PFT copies that are re-derived
//! with [`CellState::sync_pft_soil_views`] after anything mutates the column.
//! The all-PFT vegetation view is never stored, see
//! [`CellState::aggregate_vegetation`].

use serde::{Deserialize, Serialize};

use super::fire_data::FireData;
use super::pft::{self, PftPart, VegetationPools};
use super::snow::SnowPack;
use super::soil::{SoilColumn, SoilLayer, SoilLayerKind};
use super::NUM_PFT;

/// Landscape drainage class of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Drainage {
    Well,
    Poor,
}

/// Per-cell fire statistics, supplied by the cell's input data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FireRegime {
    /// Fire return interval in years (at least 1)
    pub fri: u32,
    pub drainage: Drainage,
    /// Severity class (0-4) applied to FRI-derived fires
    pub fri_severity: i32,
}

impl Default for FireRegime {
    fn default() -> Self {
        Self {
            fri: 100,
            drainage: Drainage::Well,
            fri_severity: 2,
        }
    }
}

/// Grid coordinate of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: usize,
    pub col: usize,
}

impl CellCoord {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Simulation state for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    pub veg: [VegetationPools; NUM_PFT],
    pub soil: SoilColumn,
    /// Per-PFT copies of `soil`; `None` for PFTs with no cover
    pub pft_soil: [Option<SoilColumn>; NUM_PFT],
    pub snow: SnowPack,
    pub fire: FireData,
    pub regime: FireRegime,
}

impl CellState {
    /// Build a state from vegetation and a soil column, with derived views
    /// already in sync.
    pub fn new(veg: [VegetationPools; NUM_PFT], soil: SoilColumn, regime: FireRegime) -> Self {
        let mut state = Self {
            veg,
            soil,
            pft_soil: std::array::from_fn(|_| None),
            snow: SnowPack::default(),
            fire: FireData::new(),
            regime,
        };
        state.sync_pft_soil_views();
        state
    }

    /// Black spruce forest over a thick organic mat on permafrost.
    ///
    /// Three PFTs (spruce, deciduous shrub, moss/lichen) on a ten-layer
    /// column: one dead-moss layer, two shallow and two deep organic layers,
    /// five mineral layers.
    pub fn boreal_black_spruce() -> Self {
        let horizons: [(SoilLayerKind, f64, f64, f64, f64); 10] = [
            // kind, thickness, porosity, vwc, carbon scale
            (SoilLayerKind::DeadMoss, 0.02, 0.98, 0.10, 0.2),
            (SoilLayerKind::Shallow, 0.04, 0.90, 0.20, 1.0),
            (SoilLayerKind::Shallow, 0.04, 0.90, 0.25, 1.0),
            (SoilLayerKind::Deep, 0.08, 0.80, 0.30, 2.0),
            (SoilLayerKind::Deep, 0.10, 0.80, 0.60, 2.5),
            (SoilLayerKind::Mineral, 0.10, 0.45, 0.30, 0.5),
            (SoilLayerKind::Mineral, 0.20, 0.45, 0.30, 0.3),
            (SoilLayerKind::Mineral, 0.30, 0.45, 0.35, 0.2),
            (SoilLayerKind::Mineral, 0.50, 0.45, 0.40, 0.1),
            (SoilLayerKind::Mineral, 1.00, 0.45, 0.40, 0.05),
        ];
        let roots = [0.0, 0.20, 0.20, 0.25, 0.15, 0.10, 0.05, 0.05, 0.0, 0.0];
        let covers = [0.6, 0.3, 0.1];

        let layers = horizons
            .iter()
            .zip(roots)
            .map(|(&(kind, dz, por, vwc, scale), root)| {
                let mut layer = SoilLayer::empty(kind, dz, por);
                layer.vwc = vwc;
                layer.temperature = -1.0;
                layer.rawc = 400.0 * scale;
                layer.soma = 300.0 * scale;
                layer.sompr = 800.0 * scale;
                layer.somcr = 1500.0 * scale;
                layer.orgn = 100.0 * scale;
                layer.avln = 0.5 * scale;
                for (ip, &cover) in covers.iter().enumerate() {
                    if cover > 0.0 {
                        layer.root_frac[ip] = root;
                    }
                }
                layer
            })
            .collect();

        let mut soil = SoilColumn::new(layers);
        soil.dmossc = 150.0;
        soil.dmossn = 2.0;
        soil.wdebrisc = 600.0;
        soil.wdebrisn = 3.0;

        let mut veg = [VegetationPools::EMPTY; NUM_PFT];
        let templates = [
            ([250.0, 4000.0, 900.0], [4.0, 12.0, 6.0], 1.0, 300.0, 1.0),
            ([120.0, 600.0, 300.0], [3.0, 3.0, 2.0], 0.5, 40.0, 0.2),
            ([80.0, 0.0, 20.0], [1.2, 0.0, 0.3], 0.2, 0.0, 0.0),
        ];
        for (ip, (c, strn, labn, deadc, deadn)) in templates.into_iter().enumerate() {
            veg[ip] = VegetationPools {
                cover: covers[ip],
                c,
                strn,
                labn,
                deadc,
                deadn,
            };
        }

        let mut state = Self::new(veg, soil, FireRegime::default());
        state.snow = SnowPack {
            thickness: 0.0,
            swe: 0.0,
            temperature: 0.0,
        };
        state
    }

    /// Sum of all PFT slots, recomputed on every call
    pub fn aggregate_vegetation(&self) -> VegetationPools {
        pft::aggregate(&self.veg)
    }

    /// Indices of PFTs with nonzero cover
    pub fn present_pfts(&self) -> impl Iterator<Item = usize> + '_ {
        self.veg
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_present())
            .map(|(ip, _)| ip)
    }

    /// Copy the canonical soil column to every present PFT's view.
    pub fn sync_pft_soil_views(&mut self) {
        for ip in 0..NUM_PFT {
            self.pft_soil[ip] = if self.veg[ip].is_present() {
                Some(self.soil.clone())
            } else {
                None
            };
        }
    }

    /// Carbon held in vegetation (live and standing dead) and soil
    pub fn total_carbon(&self) -> f64 {
        self.veg.iter().map(VegetationPools::total_carbon).sum::<f64>() + self.soil.total_carbon()
    }

    /// Nitrogen held in vegetation (live, labile, standing dead) and soil
    pub fn total_nitrogen(&self) -> f64 {
        self.veg.iter().map(VegetationPools::total_nitrogen).sum::<f64>()
            + self.soil.total_nitrogen()
    }

    /// Root carbon of one PFT
    pub fn root_carbon(&self, pft: usize) -> f64 {
        self.veg[pft].carbon(PftPart::Root)
    }

    /// Whether every present PFT's root fractions sum to 1 within `tol`
    pub fn root_fractions_normalized(&self, tol: f64) -> bool {
        self.present_pfts()
            .all(|ip| (self.soil.root_fraction_sum(ip) - 1.0).abs() <= tol)
    }
}
