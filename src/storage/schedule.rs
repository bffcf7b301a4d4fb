//! Schedule storage: per-observer coverage ranges.
//!
//! One row per observer holding `{"Ranges": [[station, start, end], ...]}`.
//! Appends read, concatenate, and write back inside one immediate
//! transaction, so concurrent appends for the same observer never lose
//! an update.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::model::{CoverageRange, ScheduleRanges};

use super::{Result, Storage};

impl Storage {
    /// An observer's ranges in assignment order; empty if never assigned.
    pub fn schedule(&self, observer: &str) -> Result<Vec<CoverageRange>> {
        Ok(load(&self.conn(), observer)?.unwrap_or_default())
    }

    /// Appends ranges after an observer's existing list and returns the
    /// full result. No merging or deduplication.
    pub fn append_schedule(
        &self,
        observer: &str,
        ranges: &[CoverageRange],
    ) -> Result<Vec<CoverageRange>> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut all = load(&tx, observer)?.unwrap_or_default();
        all.extend_from_slice(ranges);
        store(&tx, observer, &all)?;

        tx.commit()?;
        Ok(all)
    }

    /// Clears an observer's ranges.
    pub fn reset_schedule(&self, observer: &str) -> Result<()> {
        store(&self.conn(), observer, &[])
    }

    /// Whether an observer has at least one range assigned.
    pub fn has_schedule(&self, observer: &str) -> Result<bool> {
        Ok(load(&self.conn(), observer)?.is_some_and(|r| !r.is_empty()))
    }
}

fn load(conn: &Connection, observer: &str) -> Result<Option<Vec<CoverageRange>>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT schedule FROM individuals WHERE username = ?1",
            params![observer],
            |row| row.get(0),
        )
        .optional()?;
    match json {
        Some(json) => {
            let parsed: ScheduleRanges = serde_json::from_str(&json)?;
            Ok(Some(parsed.ranges))
        }
        None => Ok(None),
    }
}

fn store(conn: &Connection, observer: &str, ranges: &[CoverageRange]) -> Result<()> {
    let json = serde_json::to_string(&ScheduleRanges {
        ranges: ranges.to_vec(),
    })?;
    conn.execute(
        "INSERT INTO individuals (username, schedule) VALUES (?1, ?2)
         ON CONFLICT (username) DO UPDATE SET schedule = excluded.schedule",
        params![observer, json],
    )?;
    Ok(())
}
