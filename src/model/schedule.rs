//! Schedule: which matches and stations each observer covers.

use serde::{Deserialize, Serialize};

/// One observer assignment: `[station_offset, start_match, end_match]`.
///
/// Serialized as a bare three-element array to match the schedule payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i64; 3]", into = "[i64; 3]")]
pub struct CoverageRange {
    pub station_offset: i64,
    pub start_match: i64,
    pub end_match: i64,
}

impl CoverageRange {
    pub fn new(station_offset: i64, start_match: i64, end_match: i64) -> Self {
        Self {
            station_offset,
            start_match,
            end_match,
        }
    }
}

impl From<[i64; 3]> for CoverageRange {
    fn from([station_offset, start_match, end_match]: [i64; 3]) -> Self {
        Self::new(station_offset, start_match, end_match)
    }
}

impl From<CoverageRange> for [i64; 3] {
    fn from(r: CoverageRange) -> Self {
        [r.station_offset, r.start_match, r.end_match]
    }
}

/// The schedule payload: `{"Ranges": [[offset, start, end], ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRanges {
    #[serde(rename = "Ranges", default)]
    pub ranges: Vec<CoverageRange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_nested_arrays() {
        let schedule = ScheduleRanges {
            ranges: vec![CoverageRange::new(0, 1, 10), CoverageRange::new(5, 11, 20)],
        };
        let json = serde_json::to_string(&schedule).unwrap();
        assert_eq!(json, r#"{"Ranges":[[0,1,10],[5,11,20]]}"#);
    }

    #[test]
    fn missing_ranges_is_empty() {
        let schedule: ScheduleRanges = serde_json::from_str("{}").unwrap();
        assert!(schedule.ranges.is_empty());
    }
}
