//! Pit report: one scout's interview of one team in the pits.
//!
//! Pit reports are never reconciled; each one overwrites its team's row.

use serde::{Deserialize, Serialize};

use super::subject::SubjectKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitReport {
    #[serde(rename = "Team")]
    pub team: u64,

    #[serde(rename = "Scouter")]
    pub scouter: String,

    #[serde(rename = "Weight", default)]
    pub weight: String,

    #[serde(rename = "Number of Autos", default)]
    pub auto_count: String,

    #[serde(rename = "Dyanamic Auto?", default)]
    pub dynamic_auto: bool,

    #[serde(rename = "Drive Train", default)]
    pub drivetrain: String,

    #[serde(rename = "Gear Ratio", default)]
    pub gear_ratio: String,

    #[serde(rename = "Coral Position", default)]
    pub coral: ReefLevels,

    #[serde(rename = "Algae Position", default)]
    pub algae: AlgaeLevels,

    #[serde(rename = "Algae Ground Pickup", default)]
    pub algae_ground: bool,

    #[serde(rename = "Algae Source Pickup", default)]
    pub algae_source: bool,

    #[serde(rename = "Cycle Time", default)]
    pub cycle_time: String,

    #[serde(rename = "Driver Years of Experience", default)]
    pub driver_experience: i64,

    #[serde(rename = "Preferred Teleop", default)]
    pub preferred_teleop: i64,

    #[serde(rename = "Preferred Endgame", default)]
    pub preferred_endgame: i64,

    #[serde(rename = "Can Climb Shallow Cage", default)]
    pub shallow_climb: bool,

    #[serde(rename = "Can Climb Deep Cage", default)]
    pub deep_climb: bool,

    #[serde(rename = "What Type of Robot Would Compliment You Best?", default)]
    pub complementary_robot: String,

    #[serde(rename = "Favorite Part of the Robot?", default)]
    pub favorite_part: String,

    #[serde(rename = "Notes", default)]
    pub notes: String,
}

impl PitReport {
    pub fn subject(&self) -> SubjectKey {
        SubjectKey::Pit { team: self.team }
    }
}

/// Reef levels a robot can score coral on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReefLevels {
    #[serde(rename = "L1", default)]
    pub l1: bool,
    #[serde(rename = "L2", default)]
    pub l2: bool,
    #[serde(rename = "L3", default)]
    pub l3: bool,
    #[serde(rename = "L4", default)]
    pub l4: bool,
}

impl ReefLevels {
    /// `"L1, L3"`, or `"NONE"`.
    pub fn label(self) -> String {
        let levels: Vec<&str> = [
            (self.l1, "L1"),
            (self.l2, "L2"),
            (self.l3, "L3"),
            (self.l4, "L4"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();
        if levels.is_empty() {
            "NONE".to_string()
        } else {
            levels.join(", ")
        }
    }
}

/// Reef positions a robot can remove algae from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgaeLevels {
    #[serde(rename = "A1", default)]
    pub low: bool,
    #[serde(rename = "A2", default)]
    pub high: bool,
}

impl AlgaeLevels {
    pub fn label(self) -> &'static str {
        match (self.low, self.high) {
            (true, true) => "BOTH",
            (true, false) => "A1/L2",
            (false, true) => "A2/L3",
            (false, false) => "NONE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reef_label_lists_levels_in_order() {
        let levels = ReefLevels {
            l1: true,
            l2: false,
            l3: true,
            l4: true,
        };
        assert_eq!(levels.label(), "L1, L3, L4");
        assert_eq!(ReefLevels::default().label(), "NONE");
    }

    #[test]
    fn algae_labels() {
        assert_eq!(AlgaeLevels { low: true, high: true }.label(), "BOTH");
        assert_eq!(AlgaeLevels { low: false, high: true }.label(), "A2/L3");
        assert_eq!(AlgaeLevels::default().label(), "NONE");
    }
}
