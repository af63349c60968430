//! Soil column state
//!
//! The column is an ordered top-down sequence of layers. Organic layers
//! (dead moss, shallow and deep organic) sit above mineral soil; the fire
//! engine only ever consumes organic layers.

use serde::{Deserialize, Serialize};

use super::NUM_PFT;

/// Classification of a soil layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SoilLayerKind {
    /// Dead moss at the surface
    DeadMoss = 0,
    /// Shallow (fibric) organic horizon
    Shallow = 1,
    /// Deep (humic) organic horizon
    Deep = 2,
    /// Mineral soil
    Mineral = 3,
}

impl SoilLayerKind {
    /// Whether the layer is organic, and therefore combustible
    #[inline]
    pub const fn is_organic(self) -> bool {
        !matches!(self, SoilLayerKind::Mineral)
    }

    /// Numeric code used by restart records
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Inverse of [`SoilLayerKind::code`]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SoilLayerKind::DeadMoss),
            1 => Some(SoilLayerKind::Shallow),
            2 => Some(SoilLayerKind::Deep),
            3 => Some(SoilLayerKind::Mineral),
            _ => None,
        }
    }
}

/// One soil layer. Pools are g/m², thickness in metres, temperature in °C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    pub kind: SoilLayerKind,
    pub thickness: f64,
    /// Raw (litter) organic carbon
    pub rawc: f64,
    /// Active organic carbon
    pub soma: f64,
    /// Physically resistant organic carbon
    pub sompr: f64,
    /// Chemically resistant organic carbon
    pub somcr: f64,
    /// Organic nitrogen
    pub orgn: f64,
    /// Available (mineral) nitrogen
    pub avln: f64,
    /// Volumetric water content (m³/m³)
    pub vwc: f64,
    pub porosity: f64,
    pub temperature: f64,
    /// Fine-root fraction held in this layer, per PFT
    pub root_frac: [f64; NUM_PFT],
}

impl SoilLayer {
    /// A layer with no carbon, nitrogen, water or roots
    pub fn empty(kind: SoilLayerKind, thickness: f64, porosity: f64) -> Self {
        Self {
            kind,
            thickness,
            rawc: 0.0,
            soma: 0.0,
            sompr: 0.0,
            somcr: 0.0,
            orgn: 0.0,
            avln: 0.0,
            vwc: 0.0,
            porosity,
            temperature: 0.0,
            root_frac: [0.0; NUM_PFT],
        }
    }

    /// Sum of the four organic carbon pools
    #[inline]
    pub fn organic_carbon(&self) -> f64 {
        self.rawc + self.soma + self.sompr + self.somcr
    }

    /// Organic plus available nitrogen
    #[inline]
    pub fn nitrogen(&self) -> f64 {
        self.orgn + self.avln
    }

    /// Multiply every C/N pool by `keep` (0-1)
    pub fn scale_pools(&mut self, keep: f64) {
        self.rawc *= keep;
        self.soma *= keep;
        self.sompr *= keep;
        self.somcr *= keep;
        self.orgn *= keep;
        self.avln *= keep;
    }
}

/// Ordered soil layers plus column-level surface pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilColumn {
    pub layers: Vec<SoilLayer>,
    /// Dead moss carbon
    pub dmossc: f64,
    /// Dead moss nitrogen
    pub dmossn: f64,
    /// Woody debris carbon
    pub wdebrisc: f64,
    /// Woody debris nitrogen
    pub wdebrisn: f64,
}

impl SoilColumn {
    pub fn new(layers: Vec<SoilLayer>) -> Self {
        Self {
            layers,
            dmossc: 0.0,
            dmossn: 0.0,
            wdebrisc: 0.0,
            wdebrisn: 0.0,
        }
    }

    /// Number of layers
    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn thickness_of(&self, kind: SoilLayerKind) -> f64 {
        self.layers
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.thickness)
            .sum()
    }

    /// Combined thickness of dead-moss layers
    pub fn moss_thickness(&self) -> f64 {
        self.thickness_of(SoilLayerKind::DeadMoss)
    }

    /// Combined thickness of shallow organic layers
    pub fn shallow_thickness(&self) -> f64 {
        self.thickness_of(SoilLayerKind::Shallow)
    }

    /// Combined thickness of deep organic layers
    pub fn deep_thickness(&self) -> f64 {
        self.thickness_of(SoilLayerKind::Deep)
    }

    /// Moss + shallow + deep thickness
    pub fn organic_thickness(&self) -> f64 {
        self.moss_thickness() + self.shallow_thickness() + self.deep_thickness()
    }

    /// All carbon held by the column, including surface moss and debris
    pub fn total_carbon(&self) -> f64 {
        self.layers.iter().map(SoilLayer::organic_carbon).sum::<f64>() + self.dmossc + self.wdebrisc
    }

    /// All nitrogen held by the column, including surface moss and debris
    pub fn total_nitrogen(&self) -> f64 {
        self.layers.iter().map(SoilLayer::nitrogen).sum::<f64>() + self.dmossn + self.wdebrisn
    }

    /// Sum of root fractions for one PFT over all layers
    pub fn root_fraction_sum(&self, pft: usize) -> f64 {
        self.layers.iter().map(|l| l.root_frac[pft]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column() -> SoilColumn {
        SoilColumn::new(vec![
            SoilLayer::empty(SoilLayerKind::DeadMoss, 0.02, 0.98),
            SoilLayer::empty(SoilLayerKind::Shallow, 0.05, 0.9),
            SoilLayer::empty(SoilLayerKind::Shallow, 0.05, 0.9),
            SoilLayer::empty(SoilLayerKind::Deep, 0.10, 0.8),
            SoilLayer::empty(SoilLayerKind::Mineral, 0.50, 0.45),
        ])
    }

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in [
            SoilLayerKind::DeadMoss,
            SoilLayerKind::Shallow,
            SoilLayerKind::Deep,
            SoilLayerKind::Mineral,
        ] {
            assert_eq!(SoilLayerKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(SoilLayerKind::from_code(7), None);
        assert!(!SoilLayerKind::Mineral.is_organic());
    }

    #[test]
    fn test_horizon_thickness() {
        let col = column();
        assert!((col.moss_thickness() - 0.02).abs() < 1e-12);
        assert!((col.shallow_thickness() - 0.10).abs() < 1e-12);
        assert!((col.deep_thickness() - 0.10).abs() < 1e-12);
        assert!((col.organic_thickness() - 0.22).abs() < 1e-12);
    }

    #[test]
    fn test_scale_pools() {
        let mut layer = SoilLayer::empty(SoilLayerKind::Deep, 0.1, 0.8);
        layer.rawc = 10.0;
        layer.somcr = 30.0;
        layer.orgn = 2.0;
        layer.scale_pools(0.25);
        assert_eq!(layer.organic_carbon(), 10.0);
        assert_eq!(layer.nitrogen(), 0.5);
    }
}
