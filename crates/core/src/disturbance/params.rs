//! Burn parameters per severity class and PFT

use serde::{Deserialize, Serialize};

use super::severity::Severity;
use crate::core_types::NUM_PFT;
use crate::error::ConfigError;

/// Fractions controlling how a fire redistributes carbon and nitrogen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireParameters {
    /// Above-ground vegetation combusted, per severity and PFT
    pub fvcomb: [[f64; NUM_PFT]; Severity::COUNT],
    /// Above-ground vegetation killed but left standing, per severity and PFT
    pub fvdead: [[f64; NUM_PFT]; Severity::COUNT],
    /// Fraction of total organic thickness burned, per severity
    pub foslburn: [f64; Severity::COUNT],
    /// Organic layers burn only while vwc <= `vsmburn` × porosity
    pub vsmburn: f64,
    /// Share of burned carbon retained on site (char)
    pub r_retain_c: f64,
    /// Share of burned nitrogen retained on site
    pub r_retain_n: f64,
}

impl Default for FireParameters {
    fn default() -> Self {
        let comb = [0.0, 0.16, 0.24, 0.32, 0.48];
        let dead = [0.0, 0.32, 0.48, 0.56, 0.48];
        Self {
            fvcomb: comb.map(|f| [f; NUM_PFT]),
            fvdead: dead.map(|f| [f; NUM_PFT]),
            foslburn: [0.0, 0.16, 0.24, 0.48, 0.64],
            vsmburn: 0.5,
            r_retain_c: 0.1,
            r_retain_n: 0.3,
        }
    }
}

impl FireParameters {
    /// Above-ground (burned, dead, live) fractions for one PFT.
    pub fn above_ground_fractions(&self, severity: Severity, pft: usize) -> (f64, f64, f64) {
        let burned = self.fvcomb[severity.index()][pft];
        let dead = self.fvdead[severity.index()][pft];
        (burned, dead, 1.0 - burned - dead)
    }

    /// Organic-layer burn fraction for one severity class
    pub fn organic_burn_fraction(&self, severity: Severity) -> f64 {
        match severity {
            Severity::None => 0.0,
            s => self.foslburn[s.index()],
        }
    }

    /// Check every fraction is within [0, 1] and no PFT loses more than all
    /// of its above-ground mass.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} = {v} is outside [0, 1]")))
            }
        };

        for s in Severity::ALL {
            let i = s.index();
            unit(&format!("foslburn[{i}]"), self.foslburn[i])?;
            for ip in 0..NUM_PFT {
                unit(&format!("fvcomb[{i}][{ip}]"), self.fvcomb[i][ip])?;
                unit(&format!("fvdead[{i}][{ip}]"), self.fvdead[i][ip])?;
                let sum = self.fvcomb[i][ip] + self.fvdead[i][ip];
                if sum > 1.0 {
                    return Err(ConfigError::Invalid(format!(
                        "fvcomb + fvdead for severity {i}, pft {ip} is {sum}, above 1"
                    )));
                }
            }
        }
        unit("vsmburn", self.vsmburn)?;
        unit("r_retain_c", self.r_retain_c)?;
        unit("r_retain_n", self.r_retain_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let p = FireParameters::default();
        assert!(p.validate().is_ok());
        let (b, d, l) = p.above_ground_fractions(Severity::None, 0);
        assert_eq!((b, d, l), (0.0, 0.0, 1.0));
    }

    #[test]
    fn test_overfull_fractions_rejected() {
        let mut p = FireParameters::default();
        p.fvcomb[2][4] = 0.7;
        p.fvdead[2][4] = 0.5;
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("severity 2, pft 4"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let p: FireParameters = serde_json::from_str(r#"{"r_retain_c": 0.2}"#).unwrap();
        assert_eq!(p.r_retain_c, 0.2);
        assert_eq!(p.vsmburn, FireParameters::default().vsmburn);
    }
}
