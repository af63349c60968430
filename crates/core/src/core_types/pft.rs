//! Plant functional type (PFT) vegetation pools
//!
//! Each cell carries one `VegetationPools` per PFT slot. Slots with zero cover
//! are inert: the disturbance engine and the restart validator skip them.

use serde::{Deserialize, Serialize};

use super::NUM_PFT;

/// Structural compartment of a plant, used to index the carbon and
/// structural-nitrogen arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PftPart {
    /// Foliage
    Leaf = 0,
    /// Above-ground woody tissue
    Stem = 1,
    /// Fine and coarse roots
    Root = 2,
}

impl PftPart {
    /// Number of compartments per PFT
    pub const COUNT: usize = 3;

    /// All compartments in storage order
    pub const ALL: [PftPart; 3] = [PftPart::Leaf, PftPart::Stem, PftPart::Root];

    /// Array index of this compartment
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the compartment sits above the soil surface
    pub const fn is_above_ground(self) -> bool {
        matches!(self, PftPart::Leaf | PftPart::Stem)
    }
}

/// Carbon and nitrogen state of one plant functional type (g/m²).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VegetationPools {
    /// Fractional cover of the cell (0-1)
    pub cover: f64,
    /// Live carbon per compartment, indexed by [`PftPart`]
    pub c: [f64; PftPart::COUNT],
    /// Structural nitrogen per compartment, indexed by [`PftPart`]
    pub strn: [f64; PftPart::COUNT],
    /// Labile (mobile) nitrogen
    pub labn: f64,
    /// Standing dead carbon
    pub deadc: f64,
    /// Standing dead nitrogen
    pub deadn: f64,
}

impl VegetationPools {
    /// An empty slot with no cover
    pub const EMPTY: VegetationPools = VegetationPools {
        cover: 0.0,
        c: [0.0; PftPart::COUNT],
        strn: [0.0; PftPart::COUNT],
        labn: 0.0,
        deadc: 0.0,
        deadn: 0.0,
    };

    /// Whether this PFT occupies any of the cell
    #[inline]
    pub fn is_present(&self) -> bool {
        self.cover > 0.0
    }

    /// Carbon of one compartment
    #[inline]
    pub fn carbon(&self, part: PftPart) -> f64 {
        self.c[part.index()]
    }

    /// Structural nitrogen of one compartment
    #[inline]
    pub fn nitrogen(&self, part: PftPart) -> f64 {
        self.strn[part.index()]
    }

    /// Total live carbon
    pub fn call(&self) -> f64 {
        self.c.iter().sum()
    }

    /// Total live nitrogen (structural plus labile)
    pub fn nall(&self) -> f64 {
        self.strn.iter().sum::<f64>() + self.labn
    }

    /// Live plus standing dead carbon
    pub fn total_carbon(&self) -> f64 {
        self.call() + self.deadc
    }

    /// Live plus standing dead nitrogen
    pub fn total_nitrogen(&self) -> f64 {
        self.nall() + self.deadn
    }

    /// Element-wise sum, used to build the all-PFT aggregate view
    pub fn accumulate(&mut self, other: &VegetationPools) {
        self.cover += other.cover;
        for i in 0..PftPart::COUNT {
            self.c[i] += other.c[i];
            self.strn[i] += other.strn[i];
        }
        self.labn += other.labn;
        self.deadc += other.deadc;
        self.deadn += other.deadn;
    }
}

/// Reduce every PFT slot into one aggregate pool set.
pub fn aggregate(pfts: &[VegetationPools; NUM_PFT]) -> VegetationPools {
    pfts.iter().fold(VegetationPools::EMPTY, |mut acc, pft| {
        acc.accumulate(pft);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_indices_are_storage_order() {
        for (i, part) in PftPart::ALL.iter().enumerate() {
            assert_eq!(part.index(), i);
        }
        assert!(PftPart::Leaf.is_above_ground());
        assert!(!PftPart::Root.is_above_ground());
    }

    #[test]
    fn test_totals_include_labile_and_dead() {
        let pools = VegetationPools {
            cover: 0.5,
            c: [10.0, 20.0, 5.0],
            strn: [1.0, 0.5, 0.25],
            labn: 0.25,
            deadc: 3.0,
            deadn: 0.1,
        };
        assert_eq!(pools.call(), 35.0);
        assert_eq!(pools.nall(), 2.0);
        assert_eq!(pools.total_carbon(), 38.0);
        assert!((pools.total_nitrogen() - 2.1).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_sums_all_slots() {
        let mut pfts = [VegetationPools::EMPTY; NUM_PFT];
        pfts[0].c = [1.0, 2.0, 3.0];
        pfts[0].cover = 0.4;
        pfts[3].c = [4.0, 0.0, 1.0];
        pfts[3].cover = 0.6;

        let all = aggregate(&pfts);
        assert_eq!(all.c, [5.0, 2.0, 4.0]);
        assert!((all.cover - 1.0).abs() < 1e-12);
    }
}
