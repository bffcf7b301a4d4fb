//! Output formatting for CLI display.

use serde_json::Value;

use crate::intake::Outcome;
use crate::model::{CoverageRange, ScheduleRanges, StoredReport};

/// One line per report: name, area, subject, observer, failure.
pub(super) fn format_report(report: &StoredReport) -> String {
    let mut line = format!("{:<40} {:<14}", report.name, report.area.as_str());
    if let Some(subject) = &report.subject {
        line.push_str(&format!(" {subject}"));
    }
    if let Some(observer) = &report.observer {
        line.push_str(&format!(" by {observer}"));
    }
    if report.rescouting {
        line.push_str(" (rescout)");
    }
    if report.superseded {
        line.push_str(" [superseded]");
    }
    if let Some(failure) = &report.failure {
        line.push_str(&format!(" {}: {}", failure.kind.as_str(), failure.detail));
    }
    line.trim_end().to_string()
}

pub(super) fn format_outcome(outcome: &Outcome) -> String {
    match &outcome.written {
        Some(range) => format!("{} (wrote {range})", outcome.area.as_str()),
        None => outcome.area.as_str().to_string(),
    }
}

/// One sheet row: `RawData!B14  2046 | 30.0 | ...`.
pub(super) fn format_row(target: &str, column: char, row: u32, cells: &Value) -> String {
    let values = match cells.as_array() {
        Some(cells) => cells
            .iter()
            .map(|c| match c {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" | "),
        None => cells.to_string(),
    };
    format!("{target}!{column}{row}  {values}")
}

/// Ranges in their stored wire shape.
pub(super) fn format_ranges(ranges: &[CoverageRange]) -> Result<String, String> {
    serde_json::to_string(&ScheduleRanges {
        ranges: ranges.to_vec(),
    })
    .map_err(|e| format!("failed to serialize ranges: {e}"))
}
