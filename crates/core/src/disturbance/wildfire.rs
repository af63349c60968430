//! Wildfire ignition and carbon/nitrogen redistribution
//!
//! A burn moves mass between four places: live and standing-dead vegetation,
//! soil organic pools (including surface moss and woody debris), and the
//! atmosphere. Everything that leaves a pool is accounted for in the
//! returned [`BurnSummary`]; the only mass that leaves the cell is the
//! volatilised share reported in the cell's [`FireData`].
//!
//! Soil pools are burned on the canonical column only. The per-PFT soil views
//! are re-derived at the end of the burn.
//!
//! [`FireData`]: crate::core_types::FireData

use tracing::{debug, info};

use super::ignition::{fri_ignition, FireSchedule, IgnitionSource};
use super::params::FireParameters;
use super::severity::{derive_fire_severity, Severity};
use crate::core_types::{CellState, CnFlux, FireRegime, PftPart, SoilColumn, NUM_PFT};
use crate::error::SeverityError;
use crate::simulation::Stage;

/// Where the mass touched by one burn ended up (g/m²).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BurnSummary {
    pub severity: Option<Severity>,
    /// Organic soil burned (m)
    pub burn_depth: f64,
    /// Organic soil layers and surface moss consumed
    pub burned_soil: CnFlux,
    /// Woody debris consumed
    pub woody_debris: CnFlux,
    /// Live vegetation combusted (above-ground, roots, labile N)
    pub comb_veg: CnFlux,
    /// Pre-fire standing dead combusted
    pub comb_dead: CnFlux,
    /// Live above-ground vegetation killed and left standing
    pub new_standing_dead: CnFlux,
    /// Fire-killed roots deposited into soil
    pub dead_roots: CnFlux,
    /// Soil, moss and debris mass lost to the atmosphere
    pub soil_to_atm: CnFlux,
    /// Vegetation mass lost to the atmosphere
    pub veg_to_atm: CnFlux,
    /// Burned soil mass retained and redeposited
    pub retained_soil: CnFlux,
    /// Burned vegetation mass retained and redeposited
    pub retained_veg: CnFlux,
}

impl BurnSummary {
    /// Total mass that left the cell
    pub fn emitted(&self) -> CnFlux {
        CnFlux::new(
            self.soil_to_atm.c + self.veg_to_atm.c,
            self.soil_to_atm.n + self.veg_to_atm.n,
        )
    }

    /// Total mass consumed by combustion, before the retained share is
    /// split off
    pub fn combusted(&self) -> CnFlux {
        let parts = [
            self.burned_soil,
            self.woody_debris,
            self.comb_veg,
            self.comb_dead,
        ];
        CnFlux::new(
            parts.iter().map(|f| f.c).sum(),
            parts.iter().map(|f| f.n).sum(),
        )
    }
}

/// Fire engine for one cell run.
#[derive(Debug, Clone)]
pub struct WildFire {
    params: FireParameters,
    schedule: FireSchedule,
}

impl WildFire {
    pub fn new(params: FireParameters, schedule: FireSchedule) -> Self {
        Self { params, schedule }
    }

    pub fn params(&self) -> &FireParameters {
        &self.params
    }

    pub fn schedule(&self) -> &FireSchedule {
        &self.schedule
    }

    /// Whether a fire starts in this stage-relative year and zero-based month.
    pub fn should_ignite(&self, fri: u32, year: u32, month: u32, stage: Stage) -> bool {
        let ignite = match stage.ignition_source() {
            IgnitionSource::FriDerived => fri_ignition(fri, year, month),
            IgnitionSource::Explicit => self.schedule.event_at(year, month).is_some(),
        };
        debug!(year, month, stage = stage.id(), ignite, "ignition check");
        ignite
    }

    /// Severity of a fire starting now.
    ///
    /// FRI fires use the regime's configured severity. Scheduled fires use
    /// the event's own severity, or derive one from drainage, season and
    /// size with the regime severity as the non-escalating fallback.
    ///
    /// # Errors
    /// Returns [`SeverityError`] when the regime's raw severity is out of range.
    pub fn ignition_severity(
        &self,
        regime: &FireRegime,
        year: u32,
        month: u32,
        stage: Stage,
    ) -> Result<Severity, SeverityError> {
        let fallback = Severity::try_from(regime.fri_severity)?;
        let severity = match stage.ignition_source() {
            IgnitionSource::FriDerived => fallback,
            IgnitionSource::Explicit => match self.schedule.event_at(year, month) {
                Some(event) => event.severity.unwrap_or_else(|| {
                    derive_fire_severity(regime.drainage, event.season, event.size, fallback)
                }),
                None => Severity::None,
            },
        };
        Ok(severity)
    }

    /// Depth of organic soil a fire of this severity consumes (m).
    ///
    /// The severity's share of total organic thickness, capped by the depth
    /// of contiguous dry organic soil from the surface, and never less than
    /// the moss thickness when anything burns.
    pub fn burn_organic_soil_thickness(&self, soil: &SoilColumn, severity: Severity) -> f64 {
        if !severity.burns() {
            return 0.0;
        }

        let mut depth = self.params.organic_burn_fraction(severity) * soil.organic_thickness();

        let dry_organic: f64 = soil
            .layers
            .iter()
            .take_while(|l| l.kind.is_organic() && l.vwc <= self.params.vsmburn * l.porosity)
            .map(|l| l.thickness)
            .sum();

        depth = depth.min(dry_organic);
        depth.max(soil.moss_thickness())
    }

    /// Burn the cell at the given severity and redistribute its mass.
    ///
    /// A `Severity::None` burn leaves the cell untouched.
    pub fn burn(&self, cell: &mut CellState, severity: Severity) -> BurnSummary {
        if !severity.burns() {
            debug!("severity 0 fire, nothing burns");
            return BurnSummary::default();
        }

        let fri = cell.regime.fri.max(1);
        let burn_depth = self.burn_organic_soil_thickness(&cell.soil, severity);
        let present: [bool; NUM_PFT] = std::array::from_fn(|ip| cell.veg[ip].is_present());

        cell.fire.clear();
        cell.fire.burn_thickness = burn_depth;

        let mut summary = BurnSummary {
            severity: Some(severity),
            burn_depth,
            ..BurnSummary::default()
        };

        // Organic soil, top down
        let burned_root_frac = burn_soil_layers(&mut cell.soil, burn_depth, &present, &mut summary);

        // Remaining roots must again sum to one for every present PFT
        renormalize_root_fractions(&mut cell.soil, &present);

        summary.woody_debris = CnFlux::new(cell.soil.wdebrisc, cell.soil.wdebrisn);
        cell.soil.wdebrisc = 0.0;
        cell.soil.wdebrisn = 0.0;

        let r_c = self.params.r_retain_c;
        let r_n = self.params.r_retain_n;
        let soil_burned_c = summary.burned_soil.c + summary.woody_debris.c;
        let soil_burned_n = summary.burned_soil.n + summary.woody_debris.n;
        summary.soil_to_atm = CnFlux::new(soil_burned_c * (1.0 - r_c), soil_burned_n * (1.0 - r_n));
        summary.retained_soil = CnFlux::new(soil_burned_c * r_c, soil_burned_n * r_n);

        for ip in (0..NUM_PFT).filter(|&ip| present[ip]) {
            self.burn_vegetation(cell, ip, severity, burned_root_frac[ip], &mut summary);
        }

        let veg_burned_c = summary.comb_veg.c + summary.comb_dead.c;
        let veg_burned_n = summary.comb_veg.n + summary.comb_dead.n;
        summary.retained_veg = CnFlux::new(veg_burned_c * r_c, veg_burned_n * r_n);
        summary.veg_to_atm = CnFlux::new(
            veg_burned_c - summary.retained_veg.c,
            veg_burned_n - summary.retained_veg.n,
        );

        // Retained char and ash go back into the first layer that still
        // holds organic matter, or the bottom layer
        let retained = CnFlux::new(
            summary.retained_veg.c + summary.retained_soil.c,
            summary.retained_veg.n + summary.retained_soil.n,
        );
        if let Some(il) = redeposit_layer(&cell.soil) {
            cell.soil.layers[il].somcr += retained.c;
            cell.soil.layers[il].orgn += retained.n;
        } else {
            summary.soil_to_atm.c += retained.c;
            summary.soil_to_atm.n += retained.n;
            summary.retained_soil = CnFlux::ZERO;
            summary.retained_veg = CnFlux::ZERO;
        }

        cell.fire.veg_to_atm = summary.veg_to_atm;
        cell.fire.veg_to_soil_above = summary.retained_veg;
        cell.fire.veg_to_soil_below = summary.dead_roots;
        cell.fire.soil_to_atm = summary.soil_to_atm;
        // Spread this fire's nitrogen loss evenly over one fire cycle
        cell.fire.atm_to_soil_n = (summary.soil_to_atm.n + summary.veg_to_atm.n) / f64::from(fri);

        cell.sync_pft_soil_views();

        info!(
            severity = ?severity,
            burn_depth,
            emitted_c = summary.emitted().c,
            emitted_n = summary.emitted().n,
            "wildfire burned cell"
        );
        summary
    }

    /// Combust, kill and keep live vegetation of one PFT.
    fn burn_vegetation(
        &self,
        cell: &mut CellState,
        ip: usize,
        severity: Severity,
        burned_root_frac: f64,
        summary: &mut BurnSummary,
    ) {
        let (r_burn_ag, r_dead_ag, r_live) = self.params.above_ground_fractions(severity, ip);
        // Roots share the live fraction; burned roots cannot exceed the rest
        // With no soil to hold them, killed roots burn
        let r_burn_bg = if cell.soil.is_empty() {
            1.0 - r_live
        } else {
            burned_root_frac.clamp(0.0, 1.0 - r_live)
        };
        let r_dead_bg = 1.0 - r_burn_bg - r_live;

        let veg = &mut cell.veg[ip];

        // All pre-fire standing dead burns
        summary.comb_dead.c += veg.deadc;
        summary.comb_dead.n += veg.deadn;
        veg.deadc = 0.0;
        veg.deadn = 0.0;

        for part in [PftPart::Leaf, PftPart::Stem] {
            let i = part.index();
            summary.comb_veg.c += veg.c[i] * r_burn_ag;
            summary.comb_veg.n += veg.strn[i] * r_burn_ag;
            veg.deadc += veg.c[i] * r_dead_ag;
            veg.deadn += veg.strn[i] * r_dead_ag;
            veg.c[i] *= r_live;
            veg.strn[i] *= r_live;
        }
        summary.new_standing_dead.c += veg.deadc;
        summary.new_standing_dead.n += veg.deadn;

        let root = PftPart::Root.index();
        summary.comb_veg.c += veg.c[root] * r_burn_bg;
        summary.comb_veg.n += veg.strn[root] * r_burn_bg;
        let dead_root_c = veg.c[root] * r_dead_bg;
        let dead_root_n = veg.strn[root] * r_dead_bg;
        veg.c[root] *= r_live;
        veg.strn[root] *= r_live;

        // Labile N is emitted except for the surviving share
        summary.comb_veg.n += veg.labn * (1.0 - r_live);
        veg.labn *= r_live;

        // Dead roots stay where they grew
        for layer in &mut cell.soil.layers {
            let frac = layer.root_frac[ip];
            if frac > 0.0 {
                layer.somcr += dead_root_c * frac;
                layer.orgn += dead_root_n * frac;
            }
        }
        summary.dead_roots.c += dead_root_c;
        summary.dead_roots.n += dead_root_n;
    }
}

/// Consume organic layers down to `burn_depth` and return the fraction of
/// each PFT's roots that burned with them.
fn burn_soil_layers(
    soil: &mut SoilColumn,
    burn_depth: f64,
    present: &[bool; NUM_PFT],
    summary: &mut BurnSummary,
) -> [f64; NUM_PFT] {
    let mut burned_root_frac = [0.0; NUM_PFT];
    if burn_depth <= 0.0 {
        return burned_root_frac;
    }

    // Surface moss always goes once anything burns
    summary.burned_soil.c += soil.dmossc;
    summary.burned_soil.n += soil.dmossn;
    soil.dmossc = 0.0;
    soil.dmossn = 0.0;

    let mut bottom = 0.0;
    for layer in &mut soil.layers {
        if !layer.kind.is_organic() {
            break;
        }
        bottom += layer.thickness;

        let lost = if bottom <= burn_depth {
            1.0
        } else {
            let left = bottom - burn_depth;
            if left >= layer.thickness {
                break;
            }
            1.0 - left / layer.thickness
        };

        summary.burned_soil.c += layer.organic_carbon() * lost;
        summary.burned_soil.n += layer.nitrogen() * lost;
        layer.scale_pools(1.0 - lost);
        for ip in (0..NUM_PFT).filter(|&ip| present[ip]) {
            burned_root_frac[ip] += layer.root_frac[ip] * lost;
            layer.root_frac[ip] *= 1.0 - lost;
        }

        if lost < 1.0 {
            break;
        }
    }
    burned_root_frac
}

/// Rescale every present PFT's root fractions to sum to one. A PFT whose
/// roots all burned regrows them in the redeposit layer.
fn renormalize_root_fractions(soil: &mut SoilColumn, present: &[bool; NUM_PFT]) {
    for ip in (0..NUM_PFT).filter(|&ip| present[ip]) {
        let sum = soil.root_fraction_sum(ip);
        if sum > 0.0 {
            for layer in &mut soil.layers {
                layer.root_frac[ip] /= sum;
            }
        } else if let Some(il) = redeposit_layer(soil) {
            soil.layers[il].root_frac[ip] = 1.0;
        }
    }
}

/// First layer holding organic carbon, else the last layer.
fn redeposit_layer(soil: &SoilColumn) -> Option<usize> {
    let last = soil.layers.len().checked_sub(1)?;
    soil.layers
        .iter()
        .position(|l| l.organic_carbon() > 0.0)
        .or(Some(last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{SoilLayer, SoilLayerKind, VegetationPools};
    use approx::assert_abs_diff_eq;

    fn engine() -> WildFire {
        WildFire::new(FireParameters::default(), FireSchedule::new())
    }

    #[test]
    fn test_burn_thickness_bounds() {
        let fire = engine();
        let cell = CellState::boreal_black_spruce();
        let organic = cell.soil.organic_thickness();
        let moss = cell.soil.moss_thickness();

        assert_eq!(fire.burn_organic_soil_thickness(&cell.soil, Severity::None), 0.0);
        for severity in Severity::ALL.into_iter().filter(|s| s.burns()) {
            let depth = fire.burn_organic_soil_thickness(&cell.soil, severity);
            assert!(depth <= organic + 1e-12, "{severity:?}: {depth} > {organic}");
            assert!(depth >= moss, "{severity:?}: {depth} < {moss}");
        }
    }

    #[test]
    fn test_wet_organic_soil_caps_burn_depth() {
        let fire = engine();
        let mut cell = CellState::boreal_black_spruce();
        // Saturate everything below the moss
        for layer in cell.soil.layers.iter_mut().skip(1) {
            layer.vwc = layer.porosity;
        }
        let depth = fire.burn_organic_soil_thickness(&cell.soil, Severity::HighHighSurface);
        assert_abs_diff_eq!(depth, cell.soil.moss_thickness(), epsilon = 1e-12);
    }

    #[test]
    fn test_no_organic_soil_degenerates_to_zero() {
        let fire = engine();
        let mut veg = [VegetationPools::EMPTY; NUM_PFT];
        veg[0].cover = 1.0;
        veg[0].c = [10.0, 10.0, 10.0];
        let mut mineral = SoilLayer::empty(SoilLayerKind::Mineral, 0.5, 0.4);
        mineral.root_frac[0] = 1.0;
        mineral.somcr = 100.0;
        let mut cell = CellState::new(
            veg,
            SoilColumn::new(vec![mineral]),
            FireRegime::default(),
        );

        let summary = fire.burn(&mut cell, Severity::Moderate);
        assert_eq!(summary.burn_depth, 0.0);
        assert_eq!(summary.burned_soil, CnFlux::ZERO);
        assert!(cell.root_fractions_normalized(1e-9));
    }

    #[test]
    fn test_severity_none_is_a_no_op() {
        let fire = engine();
        let mut cell = CellState::boreal_black_spruce();
        cell.fire.ysf = 12;
        let before = cell.clone();
        let summary = fire.burn(&mut cell, Severity::None);
        assert_eq!(cell, before);
        assert_eq!(summary, BurnSummary::default());
    }

    #[test]
    fn test_burn_conserves_carbon_and_nitrogen() {
        let fire = engine();
        for severity in Severity::ALL.into_iter().filter(|s| s.burns()) {
            let mut cell = CellState::boreal_black_spruce();
            let c0 = cell.total_carbon();
            let n0 = cell.total_nitrogen();

            let summary = fire.burn(&mut cell, severity);
            let emitted = summary.emitted();

            assert_abs_diff_eq!(c0 - cell.total_carbon(), emitted.c, epsilon = 1e-6);
            assert_abs_diff_eq!(n0 - cell.total_nitrogen(), emitted.n, epsilon = 1e-6);
            assert_abs_diff_eq!(
                summary.combusted().c,
                emitted.c + summary.retained_soil.c + summary.retained_veg.c,
                epsilon = 1e-6
            );
            assert_abs_diff_eq!(cell.fire.emitted_carbon(), emitted.c, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_root_fractions_renormalized_after_burn() {
        let fire = engine();
        for severity in Severity::ALL {
            let mut cell = CellState::boreal_black_spruce();
            fire.burn(&mut cell, severity);
            for ip in cell.present_pfts().collect::<Vec<_>>() {
                assert_abs_diff_eq!(cell.soil.root_fraction_sum(ip), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_all_roots_burned_regrow_in_redeposit_layer() {
        let fire = engine();
        let mut cell = CellState::boreal_black_spruce();
        // Only the moss and first shallow layer hold roots, and both are dry
        for layer in &mut cell.soil.layers {
            layer.root_frac = [0.0; NUM_PFT];
        }
        for ip in 0..3 {
            cell.soil.layers[1].root_frac[ip] = 1.0;
        }
        let summary = fire.burn(&mut cell, Severity::HighHighSurface);
        assert!(summary.burn_depth > 0.06);
        assert!(cell.root_fractions_normalized(1e-9));
        let c_after = cell.total_carbon();
        assert!(c_after.is_finite());
    }

    #[test]
    fn test_fire_data_populated_and_nitrogen_amortized() {
        let fire = engine();
        let mut cell = CellState::boreal_black_spruce();
        cell.regime.fri = 50;
        cell.fire.ysf = 49;

        let summary = fire.burn(&mut cell, Severity::Moderate);
        assert_eq!(cell.fire.ysf, 0);
        assert_eq!(cell.fire.burn_thickness, summary.burn_depth);
        assert_eq!(cell.fire.veg_to_soil_below, summary.dead_roots);
        assert_abs_diff_eq!(
            cell.fire.atm_to_soil_n,
            summary.emitted().n / 50.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_woody_debris_and_standing_dead_fully_combusted() {
        let fire = engine();
        let mut cell = CellState::boreal_black_spruce();
        let debris = cell.soil.wdebrisc;
        let dead: f64 = cell.veg.iter().map(|v| v.deadc).sum();

        let summary = fire.burn(&mut cell, Severity::Low);
        assert_eq!(cell.soil.wdebrisc, 0.0);
        assert_eq!(summary.woody_debris.c, debris);
        assert_abs_diff_eq!(summary.comb_dead.c, dead, epsilon = 1e-9);
        // Standing dead after the fire is only what this fire killed
        let dead_after: f64 = cell.veg.iter().map(|v| v.deadc).sum();
        assert_abs_diff_eq!(dead_after, summary.new_standing_dead.c, epsilon = 1e-9);
    }

    #[test]
    fn test_partial_layer_scaled_by_unburned_fraction() {
        let mut params = FireParameters::default();
        params.foslburn[Severity::Low.index()] = 0.5;
        let fire = WildFire::new(params, FireSchedule::new());

        let mut cell = CellState::boreal_black_spruce();
        // Depth 0.5 * 0.28 = 0.14: moss (0.02), two shallow (0.08) burn,
        // 0.04 of the 0.08 m deep layer burns
        let summary = fire.burn(&mut cell, Severity::Low);
        assert_abs_diff_eq!(summary.burn_depth, 0.14, epsilon = 1e-12);
        assert_eq!(cell.soil.layers[1].rawc, 0.0);
        assert_eq!(cell.soil.layers[2].rawc, 0.0);

        // Only somcr receives dead roots and retained char
        let layer = &cell.soil.layers[3];
        let non_cr = layer.rawc + layer.soma + layer.sompr;
        let pre = CellState::boreal_black_spruce();
        let pre_layer = &pre.soil.layers[3];
        assert_abs_diff_eq!(
            non_cr,
            (pre_layer.rawc + pre_layer.soma + pre_layer.sompr) * 0.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_explicit_schedule_drives_late_stages() {
        use super::super::ignition::FireEvent;
        use super::super::severity::{FireSeason, FireSize};

        let schedule = FireSchedule::from_events([FireEvent {
            year: 2,
            month: 6,
            season: FireSeason::Early,
            size: FireSize::Size2,
            severity: None,
        }]);
        let fire = WildFire::new(FireParameters::default(), schedule);
        let regime = FireRegime::default();

        assert!(fire.should_ignite(regime.fri, 2, 6, Stage::Transient));
        assert!(!fire.should_ignite(regime.fri, 2, 7, Stage::Scenario));
        // FRI stages ignore the schedule
        assert!(!fire.should_ignite(regime.fri, 2, 6, Stage::Equilibrium));
        assert_eq!(
            fire.ignition_severity(&regime, 2, 6, Stage::Transient),
            Ok(Severity::Moderate)
        );
    }

    #[test]
    fn test_fri_ignition_through_engine() {
        let fire = engine();
        assert!(fire.should_ignite(10, 30, 7, Stage::Equilibrium));
        assert!(!fire.should_ignite(10, 30, 2, Stage::Equilibrium));
        assert!(!fire.should_ignite(10, 31, 7, Stage::Equilibrium));
    }

    #[test]
    fn test_bad_regime_severity_is_reported() {
        let fire = engine();
        let regime = FireRegime {
            fri_severity: 9,
            ..FireRegime::default()
        };
        assert_eq!(
            fire.ignition_severity(&regime, 10, 6, Stage::Spinup),
            Err(SeverityError::Severity(9))
        );
    }
}
