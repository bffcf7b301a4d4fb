//! Schedule commands: show, add, reset, check.

use std::io::{self, Read};
use std::str::FromStr;

use clap::Subcommand;

use crate::model::{CoverageRange, ScheduleRanges, Station};
use crate::storage::Storage;

use super::format::format_ranges;

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// Print an observer's ranges as `{"Ranges": [...]}`.
    Show { observer: String },

    /// Append ranges to an observer's schedule.
    ///
    /// Each range is `station,start,end` where station is the 0-5 offset
    /// (red 1-3, then blue 1-3). Ranges are kept as given, overlaps included.
    Add {
        observer: String,

        #[arg(long = "range", required_unless_present = "json")]
        ranges: Vec<RangeArg>,

        /// Ranges as a schedule payload, `{"Ranges": [[station, start, end], ...]}`.
        /// Use `-` to read it from stdin.
        #[arg(long, conflicts_with = "ranges")]
        json: Option<String>,
    },

    /// Clear an observer's schedule.
    Reset { observer: String },

    /// Exit non-zero unless the observer has at least one range.
    Check { observer: String },
}

/// A `station,start,end` triple from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeArg(CoverageRange);

impl FromStr for RangeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [station, start, end] = parts.as_slice() else {
            return Err(format!("expected station,start,end, got '{s}'"));
        };
        let number = |field: &str, v: &str| {
            v.parse::<i64>()
                .map_err(|e| format!("{field} '{v}' is not a number: {e}"))
        };

        let range = CoverageRange::new(
            number("station", station)?,
            number("start", start)?,
            number("end", end)?,
        );
        check_station(&range)?;
        Ok(Self(range))
    }
}

fn check_station(range: &CoverageRange) -> Result<(), String> {
    let offset = range.station_offset;
    if u8::try_from(offset).ok().and_then(Station::from_offset).is_none() {
        return Err(format!("station offset {offset} is not 0-5"));
    }
    Ok(())
}

/// Ranges from a schedule payload, every station offset checked.
fn parse_payload(json: &str) -> Result<Vec<CoverageRange>, String> {
    let payload: ScheduleRanges =
        serde_json::from_str(json).map_err(|e| format!("invalid schedule payload: {e}"))?;
    for range in &payload.ranges {
        check_station(range)?;
    }
    Ok(payload.ranges)
}

fn read_payload(json: &str) -> Result<Vec<CoverageRange>, String> {
    if json != "-" {
        return parse_payload(json);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    parse_payload(&buf)
}

pub(super) fn cmd_schedule(storage: &Storage, command: ScheduleCommand) -> Result<(), String> {
    match command {
        ScheduleCommand::Show { observer } => {
            let ranges = storage
                .schedule(&observer)
                .map_err(|e| format!("failed to load schedule for {observer}: {e}"))?;
            println!("{}", format_ranges(&ranges)?);
            Ok(())
        }
        ScheduleCommand::Add {
            observer,
            ranges,
            json,
        } => {
            let ranges: Vec<CoverageRange> = match json {
                Some(json) => read_payload(&json)?,
                None => ranges.into_iter().map(|r| r.0).collect(),
            };
            let all = storage
                .append_schedule(&observer, &ranges)
                .map_err(|e| format!("failed to update schedule for {observer}: {e}"))?;
            println!("{}", format_ranges(&all)?);
            Ok(())
        }
        ScheduleCommand::Reset { observer } => storage
            .reset_schedule(&observer)
            .map_err(|e| format!("failed to reset schedule for {observer}: {e}")),
        ScheduleCommand::Check { observer } => {
            let has = storage
                .has_schedule(&observer)
                .map_err(|e| format!("failed to load schedule for {observer}: {e}"))?;
            if has {
                Ok(())
            } else {
                Err(format!("{observer} has no schedule"))
            }
        }
    }
}
