//! Row rendering: records to ordered cells.

use std::num::NonZeroU32;

use crate::address::match_block;
use crate::model::{
    AutoTally, CanonicalRecord, Cycle, NO_CYCLES_TAG, PickupLocations, PitReport, Stat,
    park_status_label,
};

use super::{Cell, RowWrite};

/// Cycle categories, in column order.
pub const CATEGORIES: [&str; 8] = [
    "Trough/Coral Level 1",
    "Coral Level 2",
    "Coral Level 3",
    "Coral Level 4",
    "Processor",
    "Net",
    "Knock",
    "Shuttle",
];

/// Render the row for a reconciled match record.
///
/// Columns: team, mean cycle time, cycle count, tendency and accuracy for
/// each of [`CATEGORIES`], pickup label, auto flag, auto scores, auto
/// accuracy, auto ejects, climb time, endgame status, notes.
pub fn match_cells(record: &CanonicalRecord) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(3 + CATEGORIES.len() * 2 + 9);

    cells.push(Cell::Int(i64::try_from(record.team).unwrap_or(i64::MAX)));
    cells.push(if record.cycles.count == 0 {
        Cell::NotApplicable
    } else {
        Cell::Float(record.cycles.mean_time)
    });
    cells.push(Cell::Int(i64::from(record.cycles.count)));

    let scored: Vec<&Cycle> = record
        .cycles
        .all
        .iter()
        .filter(|c| c.category != NO_CYCLES_TAG)
        .collect();
    for category in CATEGORIES {
        let (tendency, accuracy) = category_stats(&scored, category);
        cells.push(Cell::Float(tendency));
        cells.push(accuracy.into());
    }

    cells.push(pickup_label(record.pickups).into());
    cells.push(record.auto.can.into());
    cells.push(record.auto.scores.into());
    cells.push(auto_accuracy(&record.auto).into());
    cells.push(record.auto.ejects.into());
    cells.push(record.endgame.climb_time.into());
    cells.push(park_status_label(record.endgame.best_status).into());
    cells.push(compiled_notes(record).into());
    cells
}

/// Share of cycles in one category as a percentage rounded to two places,
/// and the success rate within it.
fn category_stats(cycles: &[&Cycle], category: &str) -> (f64, Stat) {
    if cycles.is_empty() {
        return (0.0, Stat::NotApplicable);
    }
    let attempted = cycles.iter().filter(|c| c.category == category).count();
    let made = cycles
        .iter()
        .filter(|c| c.category == category && c.success)
        .count();

    let tendency = (attempted as f64 / cycles.len() as f64 * 10_000.0).round() / 100.0;
    let accuracy = if attempted == 0 {
        Stat::NotApplicable
    } else {
        Stat::finite(made as f64 / attempted as f64 * 100.0)
    };
    (tendency, accuracy)
}

/// Auto success rate over scores plus misses.
pub fn auto_accuracy(auto: &AutoTally) -> Stat {
    let attempts = auto.scores + auto.misses;
    if attempts <= 0 {
        return Stat::NotApplicable;
    }
    Stat::finite(auto.scores as f64 / attempts as f64 * 100.0)
}

/// Summary of pickup flags as written to the sheet.
pub fn pickup_label(p: PickupLocations) -> String {
    if p.algae_ground && p.algae_source && p.coral_ground && p.coral_source {
        return "ALL TRUE".to_string();
    }
    if !(p.algae_ground || p.algae_source || p.coral_ground || p.coral_source) {
        return "NO PICKUP".to_string();
    }

    let mut label = String::new();
    if p.algae_ground && p.algae_source {
        label.push_str("BOTH ALGAE;");
    }
    if p.coral_ground && p.coral_source {
        label.push_str("BOTH CORAL;");
    }
    if p.algae_ground {
        label.push_str("ALGAE GROUND;");
    }
    if p.coral_source {
        label.push_str("CORAL SOURCE;");
    }
    if p.coral_ground {
        label.push_str("CORAL GROUND;");
    }
    label
}

/// Condition flags, penalties, then every note, in one cell.
fn compiled_notes(record: &CanonicalRecord) -> String {
    let mut out = String::new();
    if record.lost_track {
        out.push_str("LOST TRACK; ");
    }
    if record.disconnected {
        out.push_str("DISCONNECTED; ");
    }
    if !record.penalties.is_empty() {
        out.push_str("PENALTIES= ");
        out.push_str(&record.penalties.join(","));
        out.push_str("; ");
    }
    out.push_str(&record.notes.join("; "));
    out
}

/// Render the row for a pit report.
pub fn pit_cells(pit: &PitReport) -> Vec<Cell> {
    vec![
        Cell::Int(i64::try_from(pit.team).unwrap_or(i64::MAX)),
        pit.scouter.clone().into(),
        pit.drivetrain.clone().into(),
        pit.gear_ratio.clone().into(),
        pit.coral.label().into(),
        pit.algae.label().into(),
        pit.algae_ground.into(),
        pit.algae_source.into(),
        pit.cycle_time.clone().into(),
        pit.driver_experience.into(),
        pit.preferred_teleop.into(),
        pit.preferred_endgame.into(),
        pit.shallow_climb.into(),
        pit.deep_climb.into(),
        pit.complementary_robot.clone().into(),
        pit.favorite_part.clone().into(),
        pit.notes.clone().into(),
    ]
}

/// Match-number column writes for every row of every match in the range.
///
/// Each match's block gets its number in column A on all six rows.
/// Returns `None` if any match in the range has no addressable block.
pub fn prefill_writes(target: &str, first: NonZeroU32, last: NonZeroU32) -> Option<Vec<RowWrite>> {
    let mut writes = Vec::new();
    for number in (first.get()..=last.get()).filter_map(NonZeroU32::new) {
        let (start, end) = match_block(number)?;
        writes.extend((start..=end).map(|row| RowWrite {
            target: target.to_string(),
            column: 'A',
            row,
            cells: vec![Cell::Int(i64::from(number.get()))],
        }));
    }
    Some(writes)
}
