//! Canonical record: the reconciled view of one subject.
//!
//! Never stored. Recomputed from the active observer reports whenever
//! the set changes.

use serde::{Deserialize, Serialize};

use super::report::{AutoTally, Cycle, PickupLocations};
use super::subject::SubjectKey;

/// A statistic that may have no meaningful value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Stat {
    Value(f64),
    NotApplicable,
}

impl Stat {
    /// Wraps a finite value; NaN and infinities become `NotApplicable`.
    pub fn finite(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::NotApplicable
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::NotApplicable => None,
        }
    }
}

/// Merged cycle statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    /// Mean per-observer cycle count, truncated.
    pub count: u32,

    /// Mean seconds per cycle across observers that counted any; 0 when none did.
    pub mean_time: f64,

    /// Every observer's cycles, in submission order.
    pub all: Vec<Cycle>,
}

/// Merged endgame outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndgameSummary {
    /// Any observer recorded a park or climb tier.
    pub parked: bool,

    /// Highest status code any observer recorded.
    pub best_status: i64,

    /// Median climb time among observers that recorded a climb tier.
    pub climb_time: Stat,
}

/// One subject's reconciled record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub subject: SubjectKey,
    pub team: u64,
    pub observers: Vec<String>,
    pub cycles: CycleSummary,
    pub pickups: PickupLocations,
    pub auto: AutoTally,
    pub endgame: EndgameSummary,
    pub lost_track: bool,
    pub disconnected: bool,
    pub penalties: Vec<String>,
    pub notes: Vec<String>,
    pub had_mismatches: bool,
}
