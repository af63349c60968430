//! Fire severity, season and size classes
//!
//! Severity classes follow the ALFRESCO convention:
//! 0 no burning, 1 low, 2 moderate, 3 high with low surface burn,
//! 4 high with high surface burn.
//!
//! Raw integers from input data are converted once at the boundary with
//! `TryFrom<i32>`; everything downstream matches on the enums, so an
//! out-of-range class cannot reach the burn tables.

use serde::{Deserialize, Serialize};

use crate::core_types::Drainage;
use crate::error::SeverityError;

/// Fire severity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(u8)]
pub enum Severity {
    None = 0,
    Low = 1,
    Moderate = 2,
    HighLowSurface = 3,
    HighHighSurface = 4,
}

impl Severity {
    /// Number of severity classes, the row count of every burn table
    pub const COUNT: usize = 5;

    pub const ALL: [Severity; 5] = [
        Severity::None,
        Severity::Low,
        Severity::Moderate,
        Severity::HighLowSurface,
        Severity::HighHighSurface,
    ];

    /// Row of this class in the burn tables
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn burns(self) -> bool {
        !matches!(self, Severity::None)
    }
}

impl TryFrom<i32> for Severity {
    type Error = SeverityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Severity::None),
            1 => Ok(Severity::Low),
            2 => Ok(Severity::Moderate),
            3 => Ok(Severity::HighLowSurface),
            4 => Ok(Severity::HighHighSurface),
            other => Err(SeverityError::Severity(other)),
        }
    }
}

impl From<Severity> for i32 {
    fn from(value: Severity) -> Self {
        value as i32
    }
}

/// Fire season class. Seasons 1, 2 and 4 are the "shoulder" seasons;
/// season 3 is the late, high-intensity season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(u8)]
pub enum FireSeason {
    Pre = 1,
    Early = 2,
    Late = 3,
    Post = 4,
}

impl TryFrom<i32> for FireSeason {
    type Error = SeverityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FireSeason::Pre),
            2 => Ok(FireSeason::Early),
            3 => Ok(FireSeason::Late),
            4 => Ok(FireSeason::Post),
            other => Err(SeverityError::Season(other)),
        }
    }
}

impl From<FireSeason> for i32 {
    fn from(value: FireSeason) -> Self {
        value as i32
    }
}

/// Fire size class, 0 (smallest) through 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(u8)]
pub enum FireSize {
    Size0 = 0,
    Size1 = 1,
    Size2 = 2,
    Size3 = 3,
    Size4 = 4,
}

impl TryFrom<i32> for FireSize {
    type Error = SeverityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FireSize::Size0),
            1 => Ok(FireSize::Size1),
            2 => Ok(FireSize::Size2),
            3 => Ok(FireSize::Size3),
            4 => Ok(FireSize::Size4),
            other => Err(SeverityError::Size(other)),
        }
    }
}

impl From<FireSize> for i32 {
    fn from(value: FireSize) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for Drainage {
    type Error = SeverityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Drainage::Well),
            1 => Ok(Drainage::Poor),
            other => Err(SeverityError::Drainage(other)),
        }
    }
}

/// Derive severity from landscape drainage, fire season and fire size.
///
/// Poorly drained cells never escalate: they get `fallback`. Well drained
/// cells in a shoulder season escalate with size (1 → low, 2 → moderate,
/// 3 or 4 → high with low surface burn); in the late season they always burn
/// at the highest class. Size 0 in a shoulder season does not escalate.
///
/// # Arguments
/// * `drainage` - Landscape drainage class
/// * `season` - Fire season class
/// * `size` - Fire size class
/// * `fallback` - Severity returned when no escalation rule applies
pub fn derive_fire_severity(
    drainage: Drainage,
    season: FireSeason,
    size: FireSize,
    fallback: Severity,
) -> Severity {
    match (drainage, season) {
        (Drainage::Poor, _) => fallback,
        (Drainage::Well, FireSeason::Late) => Severity::HighHighSurface,
        (Drainage::Well, FireSeason::Pre | FireSeason::Early | FireSeason::Post) => match size {
            FireSize::Size0 => fallback,
            FireSize::Size1 => Severity::Low,
            FireSize::Size2 => Severity::Moderate,
            FireSize::Size3 | FireSize::Size4 => Severity::HighLowSurface,
        },
    }
}

/// [`derive_fire_severity`] on raw integer classes.
///
/// # Errors
/// Returns [`SeverityError`] when any class is outside its declared range.
pub fn derive_fire_severity_raw(
    drainage: i32,
    season: i32,
    size: i32,
    fallback: i32,
) -> Result<Severity, SeverityError> {
    Ok(derive_fire_severity(
        Drainage::try_from(drainage)?,
        FireSeason::try_from(season)?,
        FireSize::try_from(size)?,
        Severity::try_from(fallback)?,
    ))
}
