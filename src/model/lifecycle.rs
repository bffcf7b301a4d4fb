//! Lifecycle: where a submitted report stands.

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// The area a stored report occupies. Every report is in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Area {
    /// Submitted, not yet processed.
    Pending,
    /// Could not be read or decoded. Terminal.
    Malformed,
    /// Match report accepted as an observer of its subject.
    Finalized,
    /// Parsed but could not be written; see [`Failure`].
    Failed,
    /// Dropped by an operator.
    Discarded,
    /// Moved out of the active event.
    Archived,
    /// Pit report written to its team row.
    PitFinalized,
}

impl Area {
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Malformed,
        Self::Finalized,
        Self::Failed,
        Self::Discarded,
        Self::Archived,
        Self::PitFinalized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Malformed => "malformed",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
            Self::Discarded => "discarded",
            Self::Archived => "archived",
            Self::PitFinalized => "pitFinalized",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown area: {s}"))
    }
}

/// Which parser a payload goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    Match,
    Pit,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Pit => "pit",
        }
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match" => Ok(Self::Match),
            "pit" => Ok(Self::Pit),
            other => Err(format!("unknown report kind: {other}")),
        }
    }
}

/// Why a report landed in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Prerequisite data is missing; requeue once it exists.
    NotWritableYet,
    /// The output collaborator or a lifecycle rule refused it; needs an operator.
    Rejected,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotWritableYet => "notWritableYet",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notWritableYet" => Ok(Self::NotWritableYet),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown failure kind: {other}")),
        }
    }
}

/// Failure classification plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
}

/// Lifecycle metadata for one stored report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    /// Submission name, unique in the store.
    pub name: String,
    pub kind: ReportKind,
    pub area: Area,
    /// SHA-256 of the payload, hex encoded.
    pub digest: String,
    /// Event the report was accepted under; set on finalization.
    pub event: Option<String>,
    /// Subject grouping key; set on finalization.
    pub subject: Option<String>,
    /// Observer identity; set on finalization.
    pub observer: Option<String>,
    pub rescouting: bool,
    /// Replaced by a later rescouting report; excluded from reconciliation.
    pub superseded: bool,
    pub failure: Option<Failure>,
    pub submitted_at: Timestamp,
    pub updated_at: Timestamp,
}
