//! Core data model for muster.
//!
//! These types describe what flows through intake: observer and pit
//! reports as submitted, the subjects they describe, the canonical record
//! reconciled from them, lifecycle metadata, and observer schedules.

mod canonical;
mod lifecycle;
mod pit;
mod report;
mod schedule;
mod subject;

pub use canonical::{CanonicalRecord, CycleSummary, EndgameSummary, Stat};
pub use lifecycle::{Area, Failure, FailureKind, ReportKind, StoredReport};
pub use pit::{AlgaeLevels, PitReport, ReefLevels};
pub use report::{
    AutoTally, Cycle, DriverStation, Endgame, MatchInfo, Misc, NO_CYCLES_TAG, ObserverReport,
    PARKED_THRESHOLD, PickupLocations, park_status_label,
};
pub use schedule::{CoverageRange, ScheduleRanges};
pub use subject::{Alliance, Station, SubjectKey, grouping_key_of};
