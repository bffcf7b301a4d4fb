//! Record parsing: raw payload bytes to validated reports.
//!
//! Parsing is all-or-nothing. A payload either becomes a complete report
//! or a [`ParseFailure`] describing why, with enough identity to find the
//! offending submission in the logs. Nothing here retries.

use std::io;

use crate::model::{ObserverReport, PitReport, ReportKind};

/// Largest endgame status code a client can send.
const MAX_PARK_STATUS: i64 = 6;

/// Why a payload could not become a report.
#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    /// The payload bytes were unavailable.
    #[error("could not read payload {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The payload was not a well-formed report.
    #[error("could not decode {size}-byte payload {name}: {source}")]
    Decode {
        name: String,
        size: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The payload decoded but carried an impossible value.
    #[error("invalid {size}-byte payload {name}: {reason}")]
    Invalid {
        name: String,
        size: usize,
        reason: String,
    },
}

/// A parsed payload of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReport {
    Match(ObserverReport),
    Pit(PitReport),
}

/// Parse a payload as the given kind.
pub fn parse(name: &str, bytes: &[u8], kind: ReportKind) -> Result<ParsedReport, ParseFailure> {
    match kind {
        ReportKind::Match => parse_match(name, bytes).map(ParsedReport::Match),
        ReportKind::Pit => parse_pit(name, bytes).map(ParsedReport::Pit),
    }
}

/// Parse and validate a match report.
pub fn parse_match(name: &str, bytes: &[u8]) -> Result<ObserverReport, ParseFailure> {
    let report: ObserverReport = decode(name, bytes)?;

    let invalid = |reason: String| ParseFailure::Invalid {
        name: name.to_string(),
        size: bytes.len(),
        reason,
    };

    if report.station().is_none() {
        return Err(invalid(format!(
            "driver station number {} is not 1-3",
            report.driver_station.number
        )));
    }
    if !(0..=MAX_PARK_STATUS).contains(&report.endgame.park_status) {
        return Err(invalid(format!(
            "parking status {} is not 0-{MAX_PARK_STATUS}",
            report.endgame.park_status
        )));
    }
    if let Some(cycle) = report.cycles.iter().find(|c| !c.time.is_finite()) {
        return Err(invalid(format!(
            "cycle time {} is not a finite number",
            cycle.time
        )));
    }

    Ok(report)
}

/// Parse a pit report.
pub fn parse_pit(name: &str, bytes: &[u8]) -> Result<PitReport, ParseFailure> {
    decode(name, bytes)
}

fn decode<T: serde::de::DeserializeOwned>(name: &str, bytes: &[u8]) -> Result<T, ParseFailure> {
    serde_json::from_slice(bytes).map_err(|source| ParseFailure::Decode {
        name: name.to_string(),
        size: bytes.len(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::tests::sample_payload;

    #[test]
    fn parses_full_match_payload() {
        let report = parse_match("a.json", &sample_payload(2046, 3, "avery")).unwrap();
        assert_eq!(report.team, 2046);
        assert_eq!(report.match_number().map(|n| n.get()), Some(3));
        assert_eq!(report.cycles.len(), 2);
        assert!(report.pickups.coral_ground);
        assert_eq!(report.endgame.park_status, 4);
    }

    #[test]
    fn optional_sections_default() {
        let payload = br#"{
            "Team": 4414,
            "Match": { "Number": 0 },
            "Scouter": "jo",
            "Driver Station": { "Is Blue": true, "Number": 3 },
            "Prescouting": true
        }"#;
        let report = parse_match("p.json", payload).unwrap();
        assert!(report.cycles.is_empty());
        assert!(report.prescouting);
        assert!(report.match_number().is_none());
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_match("junk.json", b"not json").unwrap_err();
        match err {
            ParseFailure::Decode { size, name, .. } => {
                assert_eq!(size, 8);
                assert_eq!(name, "junk.json");
            }
            other => panic!("expected decode failure, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_driver_station() {
        let payload = br#"{ "Team": 1, "Match": { "Number": 1 }, "Scouter": "x" }"#;
        let err = parse_match("m.json", payload).unwrap_err();
        assert!(matches!(err, ParseFailure::Decode { .. }));
    }

    #[test]
    fn rejects_station_out_of_range() {
        let payload = br#"{
            "Team": 1, "Match": { "Number": 1 }, "Scouter": "x",
            "Driver Station": { "Is Blue": false, "Number": 4 }
        }"#;
        let err = parse_match("m.json", payload).unwrap_err();
        assert!(matches!(err, ParseFailure::Invalid { .. }));
    }

    #[test]
    fn rejects_park_status_out_of_range() {
        let payload = br#"{
            "Team": 1, "Match": { "Number": 1 }, "Scouter": "x",
            "Driver Station": { "Is Blue": false, "Number": 1 },
            "Endgame": { "Parking Status": 9, "Time": 0 }
        }"#;
        let err = parse_match("m.json", payload).unwrap_err();
        assert!(matches!(err, ParseFailure::Invalid { .. }));
    }

    #[test]
    fn parses_pit_payload() {
        let payload = br#"{
            "Team": 1678, "Scouter": "sam", "Drive Train": "swerve",
            "Coral Position": { "L1": true, "L4": true },
            "Can Climb Deep Cage": true
        }"#;
        let ParsedReport::Pit(pit) = parse("pit.json", payload, ReportKind::Pit).unwrap() else {
            panic!("expected pit report");
        };
        assert_eq!(pit.team, 1678);
        assert_eq!(pit.coral.label(), "L1, L4");
        assert!(pit.deep_climb);
    }

    #[test]
    fn pit_without_team_is_malformed() {
        let err = parse_pit("pit.json", br#"{ "Scouter": "sam" }"#).unwrap_err();
        assert!(matches!(err, ParseFailure::Decode { .. }));
    }
}
