//! Reconciliation: fold several observers' reports of one subject into
//! one canonical record.
//!
//! The merge never fails on degenerate input. Empty samples, observers
//! that recorded nothing, and divisions by zero all resolve to defined
//! fallback values instead of NaN.

use crate::model::{
    AutoTally, CanonicalRecord, Cycle, CycleSummary, EndgameSummary, NO_CYCLES_TAG,
    ObserverReport, PickupLocations, Stat, SubjectKey,
};

/// Reconciliation needs at least one report.
#[derive(Debug, thiserror::Error)]
#[error("no observer reports to reconcile for {0}")]
pub struct NothingToReconcile(pub SubjectKey);

/// A cycle list counts when it has entries and does not open with the
/// "did nothing" placeholder.
pub fn cycles_are_valid(cycles: &[Cycle]) -> bool {
    cycles.first().is_some_and(|c| c.category != NO_CYCLES_TAG)
}

/// Number of cycles an observer recorded.
pub fn cycle_count(cycles: &[Cycle]) -> u32 {
    if cycles_are_valid(cycles) {
        u32::try_from(cycles.len()).unwrap_or(u32::MAX)
    } else {
        0
    }
}

/// Seconds per cycle: time of the last cycle over the cycle count.
pub fn mean_cycle_time(cycles: &[Cycle]) -> Stat {
    match cycles.last() {
        Some(last) if cycles_are_valid(cycles) => {
            Stat::finite(last.time / f64::from(cycle_count(cycles)))
        }
        _ => Stat::NotApplicable,
    }
}

/// Merge every report of one subject.
///
/// Reports must be in submission order; the first one decides the team
/// number and the order of merged cycles and notes.
pub fn reconcile(
    subject: SubjectKey,
    reports: &[ObserverReport],
) -> Result<CanonicalRecord, NothingToReconcile> {
    let Some(first) = reports.first() else {
        return Err(NothingToReconcile(subject));
    };

    let mut annotations = Vec::new();

    let team_mismatch = reports.iter().any(|r| r.team != first.team);
    if team_mismatch {
        let teams: Vec<String> = reports
            .iter()
            .map(|r| format!("{}={}", r.scouter, r.team))
            .collect();
        annotations.push(format!("TEAM MISMATCH: {}", teams.join(", ")));
    }

    let (cycles, cycles_mismatch) = merge_cycles(reports, &mut annotations);

    let notes = reports
        .iter()
        .map(|r| r.notes.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .chain(annotations)
        .collect();

    let mut penalties: Vec<String> = Vec::new();
    for penalty in reports.iter().flat_map(|r| &r.penalties) {
        if !penalties.contains(penalty) {
            penalties.push(penalty.clone());
        }
    }

    Ok(CanonicalRecord {
        subject,
        team: first.team,
        observers: reports.iter().map(|r| r.scouter.clone()).collect(),
        cycles,
        pickups: merge_pickups(reports),
        auto: merge_auto(reports),
        endgame: merge_endgame(reports),
        lost_track: reports.iter().any(|r| r.misc.lost_track),
        disconnected: reports.iter().any(|r| r.misc.disconnected),
        penalties,
        notes,
        had_mismatches: team_mismatch || cycles_mismatch,
    })
}

/// Merge cycle data, returning the summary and whether observers disagreed.
fn merge_cycles(reports: &[ObserverReport], annotations: &mut Vec<String>) -> (CycleSummary, bool) {
    let counts: Vec<u32> = reports.iter().map(|r| cycle_count(&r.cycles)).collect();

    let counts_differ = counts.iter().any(|c| *c != counts[0]);
    if counts_differ {
        let detail: Vec<String> = reports
            .iter()
            .zip(&counts)
            .map(|(r, c)| format!("{}={c}", r.scouter))
            .collect();
        annotations.push(format!("CYCLE COUNT MISMATCH: {}", detail.join(", ")));
    }

    let sequences_differ = reports.iter().any(|r| r.cycles != reports[0].cycles);
    if sequences_differ && !counts_differ {
        annotations.push("CYCLE DATA MISMATCH".to_string());
    }

    // Observers that counted nothing are left out rather than averaged in as zero.
    let per_observer: Vec<f64> = reports
        .iter()
        .filter_map(|r| mean_cycle_time(&r.cycles).value())
        .collect();
    let mean_time = if per_observer.is_empty() {
        0.0
    } else {
        let mean = per_observer.iter().sum::<f64>() / per_observer.len() as f64;
        if mean.is_finite() { mean } else { 0.0 }
    };

    let total: u64 = counts.iter().copied().map(u64::from).sum();
    let count = u32::try_from(total / reports.len() as u64).unwrap_or(u32::MAX);

    let summary = CycleSummary {
        count,
        mean_time,
        all: reports.iter().flat_map(|r| r.cycles.clone()).collect(),
    };
    (summary, counts_differ || sequences_differ)
}

fn merge_pickups(reports: &[ObserverReport]) -> PickupLocations {
    reports
        .iter()
        .fold(PickupLocations::default(), |acc, r| acc.union(r.pickups))
}

/// `can` is OR'd; counts are the truncated mean over every observer.
fn merge_auto(reports: &[ObserverReport]) -> AutoTally {
    let n = reports.len() as i64;
    let mean = |pick: fn(&AutoTally) -> i64| reports.iter().map(|r| pick(&r.auto)).sum::<i64>() / n;

    AutoTally {
        can: reports.iter().any(|r| r.auto.can),
        scores: mean(|a| a.scores),
        misses: mean(|a| a.misses),
        ejects: mean(|a| a.ejects),
    }
}

fn merge_endgame(reports: &[ObserverReport]) -> EndgameSummary {
    let mut climb_times: Vec<f64> = reports
        .iter()
        .filter(|r| r.endgame.achieved())
        .map(|r| r.endgame.time)
        .collect();

    EndgameSummary {
        parked: !climb_times.is_empty(),
        best_status: reports
            .iter()
            .map(|r| r.endgame.park_status)
            .max()
            .unwrap_or(0),
        climb_time: median(&mut climb_times),
    }
}

fn median(values: &mut [f64]) -> Stat {
    if values.is_empty() {
        return Stat::NotApplicable;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let value = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    Stat::finite(value)
}
