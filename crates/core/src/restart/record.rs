//! Flattened cell snapshot handed between stages
//!
//! Soil arrays are padded to [`MAX_SOIL_LAYERS`] and every slot that a
//! record has never written holds [`MISSING`]. Only the first `numsl` layer
//! entries are meaningful; padding is ignored on load.

use serde::{Deserialize, Serialize};

use crate::core_types::{
    CellState, FireData, SnowPack, SoilColumn, SoilLayer, SoilLayerKind, VegetationPools,
    MAX_SOIL_LAYERS, MISSING, MISSING_I, NUM_PFT,
};
use crate::error::{FieldIndex, RestartError};

/// Absolute zero; no soil layer can be at or below it
pub const SOIL_TEMPERATURE_FLOOR: f64 = -273.15;

/// Per-cell restart snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartRecord {
    /// Number of soil layers in use
    pub numsl: i32,
    pub layer_kind: Vec<i32>,
    pub dz: Vec<f64>,
    pub rawc: Vec<f64>,
    pub soma: Vec<f64>,
    pub sompr: Vec<f64>,
    pub somcr: Vec<f64>,
    pub orgn: Vec<f64>,
    pub avln: Vec<f64>,
    pub vwc: Vec<f64>,
    pub porosity: Vec<f64>,
    pub tsoil: Vec<f64>,
    /// `[pft][layer]`
    pub rootfrac: Vec<Vec<f64>>,

    pub dmossc: f64,
    pub dmossn: f64,
    pub wdebrisc: f64,
    pub wdebrisn: f64,

    pub cover: Vec<f64>,
    /// `[pft][leaf, stem, root]`
    pub vegc: Vec<Vec<f64>>,
    /// `[pft][leaf, stem, root]`
    pub strn: Vec<Vec<f64>>,
    pub labn: Vec<f64>,
    pub deadc: Vec<f64>,
    pub deadn: Vec<f64>,

    pub snow_thickness: f64,
    pub snow_swe: f64,
    pub snow_temperature: f64,

    /// Years since fire
    pub ysf: i32,
    /// Amortised fire nitrogen deposition rate
    pub firea2sorgn: f64,
}

impl Default for RestartRecord {
    fn default() -> Self {
        Self::missing()
    }
}

impl RestartRecord {
    /// A record with every field set to the sentinel, as written into a
    /// freshly created store.
    pub fn missing() -> Self {
        let layers = || vec![MISSING; MAX_SOIL_LAYERS];
        let pfts = || vec![MISSING; NUM_PFT];
        let parts = || vec![vec![MISSING; 3]; NUM_PFT];
        Self {
            numsl: MISSING_I,
            layer_kind: vec![MISSING_I; MAX_SOIL_LAYERS],
            dz: layers(),
            rawc: layers(),
            soma: layers(),
            sompr: layers(),
            somcr: layers(),
            orgn: layers(),
            avln: layers(),
            vwc: layers(),
            porosity: layers(),
            tsoil: layers(),
            rootfrac: vec![layers(); NUM_PFT],
            dmossc: MISSING,
            dmossn: MISSING,
            wdebrisc: MISSING,
            wdebrisn: MISSING,
            cover: pfts(),
            vegc: parts(),
            strn: parts(),
            labn: pfts(),
            deadc: pfts(),
            deadn: pfts(),
            snow_thickness: MISSING,
            snow_swe: MISSING,
            snow_temperature: MISSING,
            ysf: MISSING_I,
            firea2sorgn: MISSING,
        }
    }

    /// Whether nothing has been written into this record yet
    pub fn is_missing(&self) -> bool {
        self.numsl == MISSING_I
    }

    /// Snapshot a live cell.
    ///
    /// # Errors
    /// Returns [`RestartError::LayerCount`] when the soil column is empty or
    /// deeper than [`MAX_SOIL_LAYERS`].
    pub fn from_state(state: &CellState) -> Result<Self, RestartError> {
        let nl = state.soil.len();
        if nl == 0 || nl > MAX_SOIL_LAYERS {
            return Err(RestartError::LayerCount(
                i32::try_from(nl).unwrap_or(i32::MAX),
            ));
        }

        let mut rec = Self::missing();
        rec.numsl = nl as i32;
        for (il, layer) in state.soil.layers.iter().enumerate() {
            rec.layer_kind[il] = layer.kind.code();
            rec.dz[il] = layer.thickness;
            rec.rawc[il] = layer.rawc;
            rec.soma[il] = layer.soma;
            rec.sompr[il] = layer.sompr;
            rec.somcr[il] = layer.somcr;
            rec.orgn[il] = layer.orgn;
            rec.avln[il] = layer.avln;
            rec.vwc[il] = layer.vwc;
            rec.porosity[il] = layer.porosity;
            rec.tsoil[il] = layer.temperature;
            for ip in 0..NUM_PFT {
                rec.rootfrac[ip][il] = layer.root_frac[ip];
            }
        }

        rec.dmossc = state.soil.dmossc;
        rec.dmossn = state.soil.dmossn;
        rec.wdebrisc = state.soil.wdebrisc;
        rec.wdebrisn = state.soil.wdebrisn;

        for (ip, veg) in state.veg.iter().enumerate() {
            rec.cover[ip] = veg.cover;
            rec.vegc[ip] = veg.c.to_vec();
            rec.strn[ip] = veg.strn.to_vec();
            rec.labn[ip] = veg.labn;
            rec.deadc[ip] = veg.deadc;
            rec.deadn[ip] = veg.deadn;
        }

        rec.snow_thickness = state.snow.thickness;
        rec.snow_swe = state.snow.swe;
        rec.snow_temperature = state.snow.temperature;

        rec.ysf = i32::try_from(state.fire.ysf).unwrap_or(i32::MAX);
        rec.firea2sorgn = state.fire.atm_to_soil_n;
        Ok(rec)
    }

    /// Check every field a load depends on.
    ///
    /// # Errors
    /// The first sentinel, implausible value, malformed array or bad layer
    /// count found.
    pub fn validate(&self) -> Result<(), RestartError> {
        if self.numsl == MISSING_I {
            return Err(missing("numsl", None));
        }
        let nl = usize::try_from(self.numsl)
            .ok()
            .filter(|n| (1..=MAX_SOIL_LAYERS).contains(n))
            .ok_or(RestartError::LayerCount(self.numsl))?;

        let layer_fields: [(&'static str, &[f64]); 10] = [
            ("dz", &self.dz),
            ("rawc", &self.rawc),
            ("soma", &self.soma),
            ("sompr", &self.sompr),
            ("somcr", &self.somcr),
            ("orgn", &self.orgn),
            ("avln", &self.avln),
            ("vwc", &self.vwc),
            ("porosity", &self.porosity),
            ("tsoil", &self.tsoil),
        ];
        check_len("layer_kind", self.layer_kind.len(), MAX_SOIL_LAYERS)?;
        for (field, values) in layer_fields {
            check_len(field, values.len(), MAX_SOIL_LAYERS)?;
        }
        check_len("rootfrac", self.rootfrac.len(), NUM_PFT)?;
        for row in &self.rootfrac {
            check_len("rootfrac", row.len(), MAX_SOIL_LAYERS)?;
        }
        for (field, values) in [
            ("cover", &self.cover),
            ("labn", &self.labn),
            ("deadc", &self.deadc),
            ("deadn", &self.deadn),
        ] {
            check_len(field, values.len(), NUM_PFT)?;
        }
        for (field, rows) in [("vegc", &self.vegc), ("strn", &self.strn)] {
            check_len(field, rows.len(), NUM_PFT)?;
            for row in rows {
                check_len(field, row.len(), 3)?;
            }
        }

        for il in 0..nl {
            let code = self.layer_kind[il];
            if code == MISSING_I {
                return Err(missing("layer_kind", Some(il)));
            }
            if SoilLayerKind::from_code(code).is_none() {
                return Err(RestartError::LayerKind { index: il, code });
            }

            positive("dz", Some(il), self.dz[il])?;
            for &(field, values) in &layer_fields[1..7] {
                non_negative(field, Some(il), values[il])?;
            }
            unit_interval("vwc", Some(il), self.vwc[il])?;
            unit_interval("porosity", Some(il), self.porosity[il])?;

            let t = required("tsoil", Some(il), self.tsoil[il])?;
            if t <= SOIL_TEMPERATURE_FLOOR {
                return Err(RestartError::OutOfRange {
                    field: "tsoil",
                    index: FieldIndex(Some(il)),
                    value: t,
                    reason: "at or below absolute zero",
                });
            }

            for row in &self.rootfrac {
                unit_interval("rootfrac", Some(il), row[il])?;
            }
        }

        non_negative("dmossc", None, self.dmossc)?;
        non_negative("dmossn", None, self.dmossn)?;
        non_negative("wdebrisc", None, self.wdebrisc)?;
        non_negative("wdebrisn", None, self.wdebrisn)?;

        for ip in 0..NUM_PFT {
            unit_interval("cover", Some(ip), self.cover[ip])?;
            for v in &self.vegc[ip] {
                non_negative("vegc", Some(ip), *v)?;
            }
            for v in &self.strn[ip] {
                non_negative("strn", Some(ip), *v)?;
            }
            non_negative("labn", Some(ip), self.labn[ip])?;
            non_negative("deadc", Some(ip), self.deadc[ip])?;
            non_negative("deadn", Some(ip), self.deadn[ip])?;
        }

        non_negative("snow_thickness", None, self.snow_thickness)?;
        non_negative("snow_swe", None, self.snow_swe)?;
        required("snow_temperature", None, self.snow_temperature)?;

        if self.ysf == MISSING_I {
            return Err(missing("ysf", None));
        }
        if self.ysf < 0 {
            return Err(RestartError::OutOfRange {
                field: "ysf",
                index: FieldIndex(None),
                value: f64::from(self.ysf),
                reason: "negative",
            });
        }
        non_negative("firea2sorgn", None, self.firea2sorgn)?;
        Ok(())
    }

    /// Validate, then overwrite every persisted part of `state`.
    ///
    /// The fire regime is input data, not state, and is left alone. Within-year
    /// fire fluxes start from zero.
    ///
    /// # Errors
    /// Any [`RestartRecord::validate`] failure; `state` is untouched on error.
    pub fn apply_to(&self, state: &mut CellState) -> Result<(), RestartError> {
        self.validate()?;
        let nl = self.numsl.unsigned_abs() as usize;

        let mut layers = Vec::with_capacity(nl);
        for il in 0..nl {
            let kind = SoilLayerKind::from_code(self.layer_kind[il]).ok_or(
                RestartError::LayerKind {
                    index: il,
                    code: self.layer_kind[il],
                },
            )?;
            layers.push(SoilLayer {
                kind,
                thickness: self.dz[il],
                rawc: self.rawc[il],
                soma: self.soma[il],
                sompr: self.sompr[il],
                somcr: self.somcr[il],
                orgn: self.orgn[il],
                avln: self.avln[il],
                vwc: self.vwc[il],
                porosity: self.porosity[il],
                temperature: self.tsoil[il],
                root_frac: std::array::from_fn(|ip| self.rootfrac[ip][il]),
            });
        }

        let mut soil = SoilColumn::new(layers);
        soil.dmossc = self.dmossc;
        soil.dmossn = self.dmossn;
        soil.wdebrisc = self.wdebrisc;
        soil.wdebrisn = self.wdebrisn;

        state.veg = std::array::from_fn(|ip| VegetationPools {
            cover: self.cover[ip],
            c: std::array::from_fn(|i| self.vegc[ip][i]),
            strn: std::array::from_fn(|i| self.strn[ip][i]),
            labn: self.labn[ip],
            deadc: self.deadc[ip],
            deadn: self.deadn[ip],
        });
        state.soil = soil;
        state.snow = SnowPack {
            thickness: self.snow_thickness,
            swe: self.snow_swe,
            temperature: self.snow_temperature,
        };
        state.fire = FireData {
            ysf: self.ysf.unsigned_abs(),
            atm_to_soil_n: self.firea2sorgn,
            ..FireData::default()
        };
        state.sync_pft_soil_views();
        Ok(())
    }
}

fn missing(field: &'static str, index: Option<usize>) -> RestartError {
    RestartError::Missing {
        field,
        index: FieldIndex(index),
    }
}

fn check_len(field: &'static str, actual: usize, expected: usize) -> Result<(), RestartError> {
    if actual == expected {
        Ok(())
    } else {
        Err(RestartError::Length {
            field,
            expected,
            actual,
        })
    }
}

fn required(field: &'static str, index: Option<usize>, value: f64) -> Result<f64, RestartError> {
    if value == MISSING {
        Err(missing(field, index))
    } else if value.is_nan() {
        Err(RestartError::OutOfRange {
            field,
            index: FieldIndex(index),
            value,
            reason: "not a number",
        })
    } else {
        Ok(value)
    }
}

fn non_negative(field: &'static str, index: Option<usize>, value: f64) -> Result<(), RestartError> {
    if required(field, index, value)? < 0.0 {
        return Err(RestartError::OutOfRange {
            field,
            index: FieldIndex(index),
            value,
            reason: "negative",
        });
    }
    Ok(())
}

fn positive(field: &'static str, index: Option<usize>, value: f64) -> Result<(), RestartError> {
    if required(field, index, value)? <= 0.0 {
        return Err(RestartError::OutOfRange {
            field,
            index: FieldIndex(index),
            value,
            reason: "not positive",
        });
    }
    Ok(())
}

fn unit_interval(field: &'static str, index: Option<usize>, value: f64) -> Result<(), RestartError> {
    if !(0.0..=1.0).contains(&required(field, index, value)?) {
        return Err(RestartError::OutOfRange {
            field,
            index: FieldIndex(index),
            value,
            reason: "outside [0, 1]",
        });
    }
    Ok(())
}
