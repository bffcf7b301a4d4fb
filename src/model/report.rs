//! Observer report: one scout's account of one robot in one match.
//!
//! Field names follow the JSON the scouting clients submit.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use super::subject::{Alliance, Station, SubjectKey};

/// Cycle tag scouting clients emit for "did nothing this match".
pub const NO_CYCLES_TAG: &str = "None";

/// One observer's account of one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverReport {
    #[serde(rename = "Team")]
    pub team: u64,

    #[serde(rename = "Match")]
    pub match_info: MatchInfo,

    #[serde(rename = "Scouter")]
    pub scouter: String,

    #[serde(rename = "Driver Station")]
    pub driver_station: DriverStation,

    #[serde(rename = "Cycles", default)]
    pub cycles: Vec<Cycle>,

    #[serde(rename = "Pickup Locations", default)]
    pub pickups: PickupLocations,

    #[serde(rename = "Auto", default)]
    pub auto: AutoTally,

    #[serde(rename = "Endgame", default)]
    pub endgame: Endgame,

    #[serde(rename = "Misc", default)]
    pub misc: Misc,

    #[serde(rename = "Penalties", default)]
    pub penalties: Vec<String>,

    /// Replaces any prior finalized data for the same subject.
    #[serde(rename = "Rescouting", default)]
    pub rescouting: bool,

    /// Valid without an assigned match number.
    #[serde(rename = "Prescouting", default)]
    pub prescouting: bool,

    #[serde(rename = "Notes", default)]
    pub notes: String,
}

impl ObserverReport {
    /// The assigned match number, treating 0 as absent.
    pub fn match_number(&self) -> Option<NonZeroU32> {
        self.match_info.number.and_then(NonZeroU32::new)
    }

    /// The station this report covers.
    ///
    /// Parsed reports always carry a valid station number.
    pub fn station(&self) -> Option<Station> {
        let number = u8::try_from(self.driver_station.number).ok()?;
        Station::new(Alliance::from_is_blue(self.driver_station.is_blue), number)
    }

    /// Derive the subject key under the given event.
    pub fn subject(&self, event: &str) -> Option<SubjectKey> {
        Some(SubjectKey::Match {
            event: event.to_string(),
            match_number: self.match_number(),
            station: self.station()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    #[serde(rename = "Number", default)]
    pub number: Option<u32>,

    #[serde(rename = "isReplay", default)]
    pub is_replay: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStation {
    #[serde(rename = "Is Blue")]
    pub is_blue: bool,

    /// 1-3.
    #[serde(rename = "Number")]
    pub number: i64,
}

/// One scoring attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    /// Elapsed match time in seconds when the cycle finished.
    #[serde(rename = "Time")]
    pub time: f64,

    #[serde(rename = "Type")]
    pub category: String,

    #[serde(rename = "Success")]
    pub success: bool,
}

/// Where a robot was seen picking up game pieces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupLocations {
    #[serde(rename = "Coral Ground", default)]
    pub coral_ground: bool,

    #[serde(rename = "Coral Source", default)]
    pub coral_source: bool,

    #[serde(rename = "Algae Ground", default)]
    pub algae_ground: bool,

    #[serde(rename = "Algae Source", default)]
    pub algae_source: bool,
}

impl PickupLocations {
    /// Per-flag logical OR.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            coral_ground: self.coral_ground || other.coral_ground,
            coral_source: self.coral_source || other.coral_source,
            algae_ground: self.algae_ground || other.algae_ground,
            algae_source: self.algae_source || other.algae_source,
        }
    }
}

/// Autonomous period tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoTally {
    #[serde(rename = "Can", default)]
    pub can: bool,

    #[serde(rename = "Scores", default)]
    pub scores: i64,

    #[serde(rename = "Misses", default)]
    pub misses: i64,

    #[serde(rename = "Ejects", default)]
    pub ejects: i64,
}

/// Endgame outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Endgame {
    /// 0-6; see [`park_status_label`].
    #[serde(rename = "Parking Status", default)]
    pub park_status: i64,

    /// Seconds taken to climb.
    #[serde(rename = "Time", default)]
    pub time: f64,
}

/// Status codes above this achieved a park or climb tier.
pub const PARKED_THRESHOLD: i64 = 3;

impl Endgame {
    pub fn achieved(&self) -> bool {
        self.park_status > PARKED_THRESHOLD
    }
}

/// Human-readable endgame status.
pub fn park_status_label(status: i64) -> &'static str {
    match status {
        1 => "Failed Attempted to Park",
        2 => "Failed Attempted Shallow Climb",
        3 => "Failed Attempted Deep Climb",
        4 => "Parked in the Barge",
        5 => "Climbed Shallow Cage",
        6 => "Climbed Deep Cage",
        _ => "Didn't Attempt to Park",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Misc {
    #[serde(rename = "Lost Communication or Disabled", default)]
    pub disconnected: bool,

    #[serde(rename = "User Lost Track", default)]
    pub lost_track: bool,
}
