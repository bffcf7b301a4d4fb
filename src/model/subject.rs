//! Subject: the identity one canonical record describes.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Which alliance a driver station belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    pub fn from_is_blue(is_blue: bool) -> Self {
        if is_blue { Self::Blue } else { Self::Red }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }
}

/// One of the six driver stations on the field.
///
/// Construction goes through [`Station::new`], so `number` is always 1-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Station {
    alliance: Alliance,
    number: u8,
}

impl Station {
    /// Returns `None` unless `number` is 1, 2, or 3.
    pub fn new(alliance: Alliance, number: u8) -> Option<Self> {
        (1..=3)
            .contains(&number)
            .then_some(Self { alliance, number })
    }

    /// Absolute station offset: red 1-3 map to 0-2, blue 1-3 to 3-5.
    pub fn offset(self) -> u8 {
        match self.alliance {
            Alliance::Red => self.number - 1,
            Alliance::Blue => self.number + 2,
        }
    }

    /// Inverse of [`Station::offset`].
    pub fn from_offset(offset: u8) -> Option<Self> {
        match offset {
            0..=2 => Self::new(Alliance::Red, offset + 1),
            3..=5 => Self::new(Alliance::Blue, offset - 2),
            _ => None,
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.alliance.as_str(), self.number)
    }
}

/// What one canonical record describes.
///
/// Match subjects are scoped to an event; `match_number` is `None` for
/// prescouted reports that have no assigned match yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SubjectKey {
    Match {
        event: String,
        match_number: Option<NonZeroU32>,
        station: Station,
    },
    Pit {
        team: u64,
    },
}

impl SubjectKey {
    /// The grouping key used in stored report names.
    ///
    /// Match subjects render as `<event>_<match>_<color><station>`, the
    /// first three underscore-delimited segments of a report file name.
    pub fn grouping_key(&self) -> String {
        match self {
            Self::Match {
                event,
                match_number,
                station,
            } => {
                let number = match_number.map_or(0, NonZeroU32::get);
                format!("{event}_{number}_{station}")
            }
            Self::Pit { team } => format!("pit_{team}"),
        }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.grouping_key())
    }
}

/// Extract the grouping key from a report file name.
///
/// Returns the first three underscore-delimited segments when the name
/// has at least four, matching `<event>_<match>_<station>_<suffix>`.
pub fn grouping_key_of(file_name: &str) -> Option<String> {
    let segments: Vec<&str> = file_name.split('_').collect();
    if segments.len() < 4 {
        return None;
    }
    Some(segments[..3].join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_offsets_cover_all_six() {
        let offsets: Vec<u8> = [
            (Alliance::Red, 1),
            (Alliance::Red, 2),
            (Alliance::Red, 3),
            (Alliance::Blue, 1),
            (Alliance::Blue, 2),
            (Alliance::Blue, 3),
        ]
        .into_iter()
        .map(|(a, n)| Station::new(a, n).unwrap().offset())
        .collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn station_rejects_out_of_range() {
        assert!(Station::new(Alliance::Red, 0).is_none());
        assert!(Station::new(Alliance::Blue, 4).is_none());
        assert!(Station::from_offset(6).is_none());
    }

    #[test]
    fn from_offset_inverts_offset() {
        for offset in 0..6 {
            assert_eq!(Station::from_offset(offset).unwrap().offset(), offset);
        }
    }

    #[test]
    fn grouping_key_matches_file_prefix() {
        let key = SubjectKey::Match {
            event: "2025wasno".into(),
            match_number: NonZeroU32::new(12),
            station: Station::new(Alliance::Blue, 2).unwrap(),
        };
        assert_eq!(key.grouping_key(), "2025wasno_12_blue2");
        assert_eq!(
            grouping_key_of("2025wasno_12_blue2_a1b2c3.json").as_deref(),
            Some("2025wasno_12_blue2")
        );
    }

    #[test]
    fn grouping_key_of_short_name_is_none() {
        assert!(grouping_key_of("2025wasno_12_blue2").is_none());
    }
}
