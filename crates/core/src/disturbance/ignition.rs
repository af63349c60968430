//! Ignition timing
//!
//! Early stages burn on a fixed fire-return-interval cycle. Transient and
//! scenario stages burn on explicit (year, month) events supplied with the
//! cell's input data.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::severity::{FireSeason, FireSize, Severity};

/// Zero-based months (June through October) in which an FRI fire may start
pub const FRI_FIRE_MONTHS: std::ops::RangeInclusive<u32> = 5..=9;

/// Where a stage takes its fire timing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnitionSource {
    /// Every FRI years, inside [`FRI_FIRE_MONTHS`]
    FriDerived,
    /// From a [`FireSchedule`]
    Explicit,
}

/// FRI-cycle ignition rule: a positive multiple of `fri` and a fire-season
/// month.
///
/// # Arguments
/// * `fri` - Fire return interval in years (zero never ignites)
/// * `year` - Stage-relative year
/// * `month` - Zero-based month
pub fn fri_ignition(fri: u32, year: u32, month: u32) -> bool {
    fri > 0 && year > 0 && year % fri == 0 && FRI_FIRE_MONTHS.contains(&month)
}

/// One explicitly scheduled fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FireEvent {
    /// Stage-relative year
    pub year: u32,
    /// Zero-based month
    pub month: u32,
    pub season: FireSeason,
    pub size: FireSize,
    /// Severity given directly by the input; derived from drainage, season
    /// and size when absent
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// Explicit fire events for one cell, indexed by year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FireSchedule {
    by_year: FxHashMap<u32, Vec<FireEvent>>,
}

impl FireSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: impl IntoIterator<Item = FireEvent>) -> Self {
        let mut schedule = Self::new();
        for event in events {
            schedule.push(event);
        }
        schedule
    }

    pub fn push(&mut self, event: FireEvent) {
        self.by_year.entry(event.year).or_default().push(event);
    }

    /// First event scheduled for this year and month
    pub fn event_at(&self, year: u32, month: u32) -> Option<&FireEvent> {
        self.by_year
            .get(&year)
            .and_then(|events| events.iter().find(|e| e.month == month))
    }

    pub fn len(&self) -> usize {
        self.by_year.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_year.is_empty()
    }
}

impl Serialize for FireSchedule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut events: Vec<&FireEvent> = self.by_year.values().flatten().collect();
        events.sort_by_key(|e| (e.year, e.month));
        events.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FireSchedule {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let events = Vec::<FireEvent>::deserialize(deserializer)?;
        Ok(Self::from_events(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fri_ignition_rule() {
        assert!(fri_ignition(10, 30, 7));
        assert!(!fri_ignition(10, 30, 2));
        assert!(!fri_ignition(10, 31, 7));
        assert!(!fri_ignition(10, 0, 7));
        assert!(!fri_ignition(0, 30, 7));
        assert!(fri_ignition(10, 10, 5));
        assert!(fri_ignition(10, 10, 9));
        assert!(!fri_ignition(10, 10, 10));
    }

    #[test]
    fn test_schedule_lookup() {
        let schedule = FireSchedule::from_events([
            FireEvent {
                year: 3,
                month: 6,
                season: FireSeason::Early,
                size: FireSize::Size2,
                severity: None,
            },
            FireEvent {
                year: 12,
                month: 7,
                season: FireSeason::Late,
                size: FireSize::Size1,
                severity: Some(Severity::Low),
            },
        ]);
        assert_eq!(schedule.len(), 2);
        assert!(schedule.event_at(3, 6).is_some());
        assert!(schedule.event_at(3, 7).is_none());
        assert_eq!(schedule.event_at(12, 7).and_then(|e| e.severity), Some(Severity::Low));
    }

    #[test]
    fn test_schedule_json_is_event_list() {
        let json = r#"[{"year": 4, "month": 8, "season": 3, "size": 2}]"#;
        let schedule: FireSchedule = serde_json::from_str(json).unwrap();
        let event = schedule.event_at(4, 8).unwrap();
        assert_eq!(event.season, FireSeason::Late);
        assert_eq!(event.severity, None);

        let bad = r#"[{"year": 4, "month": 8, "season": 5, "size": 2}]"#;
        assert!(serde_json::from_str::<FireSchedule>(bad).is_err());
    }
}
