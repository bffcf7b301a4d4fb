//! Intake: drive each submitted report from `Pending` to its final area.
//!
//! ```text
//! Pending ──parse fails──────────────────────────▶ Malformed
//!    │  ──no match number, not prescouting───────▶ Failed (not writable yet)
//!    │  ──duplicate in single-observer mode──────▶ Failed (rejected)
//!    │  ──row write refused──────────────────────▶ Failed (rejected)
//!    │  ──accepted (row written when complete)───▶ Finalized ──event change──▶ Archived
//!    │  ──pit report written to its team row─────▶ PitFinalized
//!    └──operator───────────────────────────────────▶ Discarded
//! Failed ──requeue──▶ Pending
//! ```
//!
//! Work on one subject is serialized through a per-subject lock, and the
//! row is written before the report's area changes. A crash between the
//! two leaves the report `Pending`; processing it again rewrites the same
//! row with the same data.

use std::num::NonZeroU32;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::address::{match_row, pit_row};
use crate::context::EventContext;
use crate::locks::{KeyGuard, KeyedLocks, LockTimeout};
use crate::model::{
    Area, Failure, FailureKind, ObserverReport, PitReport, Station, StoredReport, SubjectKey,
    grouping_key_of,
};
use crate::parse::{ParseFailure, ParsedReport, parse, parse_match};
use crate::reconcile::reconcile;
use crate::sheet::{RowWrite, SheetWriter, WriteError, match_cells, pit_cells, prefill_writes};
use crate::storage::{Finalization, Storage, StorageError};

/// Most matches one prefill request may cover.
pub const MAX_PREFILL_MATCHES: u32 = 50;

/// Errors that stop intake without moving the report.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The deadline passed; the report is still `Pending`.
    #[error("timed out processing {name}: {reason}")]
    Timeout { name: String, reason: String },

    #[error("invalid match range {first}-{last}: {reason}")]
    InvalidRange {
        first: u32,
        last: u32,
        reason: &'static str,
    },

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = core::result::Result<T, IntakeError>;

/// Where a processed report ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub area: Area,
    /// The range written, when this report caused a write.
    pub written: Option<String>,
}

impl Outcome {
    fn moved(area: Area) -> Self {
        Self {
            area,
            written: None,
        }
    }

    fn wrote(area: Area, write: &RowWrite) -> Self {
        Self {
            area,
            written: Some(write.range()),
        }
    }
}

/// The intake state machine over one store and one output sheet.
pub struct Intake<'a> {
    storage: &'a Storage,
    writer: &'a dyn SheetWriter,
    locks: KeyedLocks,
}

impl<'a> Intake<'a> {
    pub fn new(storage: &'a Storage, writer: &'a dyn SheetWriter) -> Self {
        Self {
            storage,
            writer,
            locks: KeyedLocks::new(),
        }
    }

    /// Process one `Pending` report under the given event context.
    pub fn process(&self, name: &str, ctx: &EventContext, deadline: Instant) -> Result<Outcome> {
        let stored = self.storage.get(name)?;
        if stored.area != Area::Pending {
            return Err(StorageError::Conflict {
                name: name.to_string(),
                expected: Area::Pending,
                actual: stored.area,
            }
            .into());
        }

        let parsed = match self.storage.read_payload(name) {
            Ok(bytes) => parse(name, &bytes, stored.kind),
            Err(StorageError::Io(source)) => Err(ParseFailure::Read {
                name: name.to_string(),
                source,
            }),
            Err(e) => return Err(e.into()),
        };

        match parsed {
            Err(failure) => {
                warn!(report = name, "malformed: {failure}");
                self.storage
                    .transition(name, Area::Pending, Area::Malformed)?;
                Ok(Outcome::moved(Area::Malformed))
            }
            Ok(ParsedReport::Match(report)) => self.process_match(&stored, &report, ctx, deadline),
            Ok(ParsedReport::Pit(pit)) => self.process_pit(&stored, &pit, ctx, deadline),
        }
    }

    fn process_match(
        &self,
        stored: &StoredReport,
        report: &ObserverReport,
        ctx: &EventContext,
        deadline: Instant,
    ) -> Result<Outcome> {
        let name = stored.name.as_str();
        let (Some(subject), Some(station)) = (report.subject(ctx.event()), report.station()) else {
            warn!(report = name, "malformed: no driver station");
            self.storage
                .transition(name, Area::Pending, Area::Malformed)?;
            return Ok(Outcome::moved(Area::Malformed));
        };
        let key = subject.grouping_key();

        let Some(match_number) = report.match_number() else {
            if !report.prescouting {
                return self.fail(
                    name,
                    FailureKind::NotWritableYet,
                    "no match number and not prescouting".into(),
                );
            }
            // Prescouted without a match: accepted, but there is no row yet.
            // Finalizes under the subject lock like every other path.
            let _guard = self.lock(name, &key, deadline)?;
            self.finalize(name, &key, report, ctx)?;
            return Ok(Outcome::moved(Area::Finalized));
        };
        let Some(row) = match_row(match_number, station) else {
            return self.fail(
                name,
                FailureKind::Rejected,
                format!("match {match_number} is past the last sheet row"),
            );
        };

        if let Some(named) = grouping_key_of(name)
            && named != key
        {
            warn!(report = name, named = %named, subject = %key, "file name disagrees with payload; grouping by payload");
        }

        let _guard = self.lock(name, &key, deadline)?;

        let standing = self.storage.active_finalized(&key)?;
        let basis: Vec<StoredReport> = match (report.rescouting, ctx.multi_scouting()) {
            (false, _) => standing,
            // Rescouts of one subject group together only while several
            // observers are expected; otherwise the latest stands alone.
            (true, true) => standing.into_iter().filter(|r| r.rescouting).collect(),
            (true, false) => Vec::new(),
        };

        if !report.rescouting && !ctx.multi_scouting() && !basis.is_empty() {
            return self.fail(
                name,
                FailureKind::Rejected,
                format!("{key} is already finalized; resubmit with rescouting to replace it"),
            );
        }

        let observed = basis.len() + 1;
        if ctx.multi_scouting() && !report.rescouting && observed < ctx.expected_observers() {
            self.finalize(name, &key, report, ctx)?;
            info!(
                report = name,
                subject = %key,
                observed,
                expected = ctx.expected_observers(),
                "finalized; waiting for more observers"
            );
            return Ok(Outcome::moved(Area::Finalized));
        }

        let mut reports = Vec::with_capacity(observed);
        for other in &basis {
            let bytes = self.storage.read_payload(&other.name)?;
            let parsed = parse_match(&other.name, &bytes)
                .map_err(|e| StorageError::Corrupt(format!("finalized report unreadable: {e}")))?;
            reports.push(parsed);
        }
        reports.push(report.clone());

        let record =
            reconcile(subject, &reports).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        if record.had_mismatches {
            warn!(subject = %key, observers = ?record.observers, "observers disagree");
        }

        let write = RowWrite::data(
            ctx.targets().matches.clone(),
            row,
            match_cells(&record),
        );
        if let Some(outcome) = self.write(name, &write, deadline)? {
            return Ok(outcome);
        }

        let superseded = self.finalize(name, &key, report, ctx)?;
        info!(
            report = name,
            subject = %key,
            row = write.row,
            observers = record.observers.len(),
            superseded = superseded.len(),
            "finalized and written"
        );
        Ok(Outcome::wrote(Area::Finalized, &write))
    }

    fn process_pit(
        &self,
        stored: &StoredReport,
        pit: &PitReport,
        ctx: &EventContext,
        deadline: Instant,
    ) -> Result<Outcome> {
        let name = stored.name.as_str();
        let Some(row) = pit_row(pit.team, ctx.roster()) else {
            return self.fail(
                name,
                FailureKind::NotWritableYet,
                format!("team {} is not on the {} roster", pit.team, ctx.event()),
            );
        };

        let key = pit.subject().grouping_key();
        let _guard = self.lock(name, &key, deadline)?;

        let write = RowWrite::data(ctx.targets().pits.clone(), row, pit_cells(pit));
        if let Some(outcome) = self.write(name, &write, deadline)? {
            return Ok(outcome);
        }

        self.storage.finalize_pit(name, &key, &pit.scouter)?;
        info!(report = name, team = pit.team, row, "pit report written");
        Ok(Outcome::wrote(Area::PitFinalized, &write))
    }

    /// Hand a row to the writer.
    ///
    /// Returns `Some` when the write was refused and the report has been
    /// failed; timeouts leave the report pending and surface as errors.
    fn write(&self, name: &str, write: &RowWrite, deadline: Instant) -> Result<Option<Outcome>> {
        match self.writer.write_row(write, deadline) {
            Ok(()) => Ok(None),
            Err(WriteError::Timeout { range }) => {
                warn!(report = name, range = %range, "write timed out; left pending");
                Err(IntakeError::Timeout {
                    name: name.to_string(),
                    reason: format!("write to {range} did not finish"),
                })
            }
            Err(e) => {
                let outcome = self.fail(name, FailureKind::Rejected, e.to_string())?;
                Ok(Some(outcome))
            }
        }
    }

    fn lock(&self, name: &str, key: &str, deadline: Instant) -> Result<KeyGuard<'_>> {
        let guard = self.locks.acquire(key, deadline).map_err(|LockTimeout(held)| {
            warn!(report = name, subject = %held, "lock wait timed out; left pending");
            IntakeError::Timeout {
                name: name.to_string(),
                reason: format!("{held} stayed locked"),
            }
        })?;
        debug!(report = name, subject = guard.key(), "subject locked");
        Ok(guard)
    }

    fn finalize(
        &self,
        name: &str,
        key: &str,
        report: &ObserverReport,
        ctx: &EventContext,
    ) -> Result<Vec<String>> {
        let superseded = self.storage.finalize(
            name,
            Finalization {
                event: ctx.event(),
                subject: key,
                observer: &report.scouter,
                rescouting: report.rescouting,
                replaces_rescouts: report.rescouting && !ctx.multi_scouting(),
            },
        )?;
        for old in &superseded {
            info!(report = %old, by = name, subject = key, "superseded by rescouting");
        }
        Ok(superseded)
    }

    fn fail(&self, name: &str, kind: FailureKind, detail: String) -> Result<Outcome> {
        warn!(report = name, kind = kind.as_str(), "failed: {detail}");
        self.storage.fail(name, &Failure { kind, detail })?;
        Ok(Outcome::moved(Area::Failed))
    }

    /// Process every `Pending` report with up to `jobs` workers.
    ///
    /// Each report gets its own deadline of `timeout` from when it starts.
    pub fn process_pending(
        &self,
        ctx: &EventContext,
        timeout: Duration,
        jobs: usize,
    ) -> Result<Vec<(String, Result<Outcome>)>> {
        let pending: Vec<String> = self
            .storage
            .list(Some(Area::Pending))?
            .into_iter()
            .map(|r| r.name)
            .collect();
        let jobs = jobs.clamp(1, pending.len().max(1));
        let chunk = pending.len().div_ceil(jobs).max(1);

        let mut results = thread::scope(|s| {
            let workers: Vec<_> = pending
                .chunks(chunk)
                .map(|names| {
                    s.spawn(move || {
                        names
                            .iter()
                            .map(|name| {
                                let deadline = Instant::now() + timeout;
                                (name.clone(), self.process(name, ctx, deadline))
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect::<Vec<_>>()
        });

        let order = |name: &str| pending.iter().position(|p| p == name);
        results.sort_by_key(|(name, _)| order(name));
        Ok(results)
    }

    /// Operator drop of a `Pending` report. No reconciliation, no write.
    pub fn discard(&self, name: &str) -> Result<()> {
        self.storage
            .transition(name, Area::Pending, Area::Discarded)?;
        info!(report = name, "discarded");
        Ok(())
    }

    /// Return a `Failed` report to `Pending` for another attempt.
    pub fn requeue(&self, name: &str) -> Result<()> {
        self.storage.transition(name, Area::Failed, Area::Pending)?;
        info!(report = name, "requeued");
        Ok(())
    }

    /// Archive everything finalized under other events and return the
    /// context for the new one.
    ///
    /// Must not run while reports are being processed.
    pub fn switch_event(
        &self,
        ctx: &EventContext,
        event: &str,
        roster: Vec<u64>,
    ) -> Result<(EventContext, Vec<StoredReport>)> {
        let archived = self.storage.archive_sweep(event)?;
        for report in &archived {
            debug!(report = %report.name, from = ?report.event, "archived");
        }
        info!(from = ctx.event(), to = event, archived = archived.len(), "event switched");
        Ok((ctx.with_event(event, roster), archived))
    }

    /// Observers whose reports currently stand for one match station.
    pub fn observers(
        &self,
        ctx: &EventContext,
        match_number: NonZeroU32,
        station: Station,
    ) -> Result<Vec<String>> {
        let subject = SubjectKey::Match {
            event: ctx.event().to_string(),
            match_number: Some(match_number),
            station,
        };
        Ok(self.storage.observers_for(&subject.grouping_key())?)
    }

    /// Write match numbers into the first column of every row in a range
    /// of matches. Returns the number of rows written.
    pub fn prefill(&self, ctx: &EventContext, first: u32, last: u32, deadline: Instant) -> Result<usize> {
        let invalid = |reason| IntakeError::InvalidRange {
            first,
            last,
            reason,
        };
        let start = NonZeroU32::new(first).ok_or_else(|| invalid("matches start at 1"))?;
        let end = NonZeroU32::new(last).ok_or_else(|| invalid("matches start at 1"))?;
        if end < start {
            return Err(invalid("last match is before first"));
        }
        if last - first >= MAX_PREFILL_MATCHES {
            return Err(invalid("range spans too many matches"));
        }

        let writes = prefill_writes(&ctx.targets().matches, start, end)
            .ok_or_else(|| invalid("range runs past the last sheet row"))?;
        for write in &writes {
            self.writer.write_row(write, deadline)?;
        }
        info!(first, last, rows = writes.len(), "match numbers prefilled");
        Ok(writes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Value;

    use crate::context::Targets;
    use crate::model::tests::sample_payload;
    use crate::model::{Alliance, ReportKind};
    use crate::sheet::Cell;
    use crate::sheet::tests::MemorySheet;
    use crate::storage::tests::test_storage;

    const EVENT: &str = "2025wasno";

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    fn single() -> EventContext {
        EventContext::new(EVENT, vec![254, 1678, 2046], false, 1, Targets::default())
    }

    fn multi(expected: usize) -> EventContext {
        EventContext::new(EVENT, vec![254, 1678, 2046], true, expected, Targets::default())
    }

    /// A match payload with edits applied to its JSON.
    fn payload_with(team: u64, match_number: u32, scouter: &str, edit: impl FnOnce(&mut Value)) -> Vec<u8> {
        let mut value: Value = serde_json::from_slice(&sample_payload(team, match_number, scouter)).unwrap();
        edit(&mut value);
        serde_json::to_vec(&value).unwrap()
    }

    fn submit(storage: &Storage, name: &str, bytes: &[u8]) {
        storage.submit(name, ReportKind::Match, bytes).unwrap();
    }

    fn pit_payload(team: u64) -> Vec<u8> {
        serde_json::json!({
            "Team": team,
            "Scouter": "sam",
            "Drive Train": "swerve",
            "Coral Position": { "L2": true, "L3": true },
            "Notes": "tidy wiring"
        })
        .to_string()
        .into_bytes()
    }

    // Match 3, red 1.
    const ROW: u32 = 14;

    #[test]
    fn single_report_is_written_and_finalized() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        submit(&storage, "a.json", &sample_payload(2046, 3, "avery"));

        let outcome = intake.process("a.json", &single(), soon()).unwrap();

        assert_eq!(outcome.area, Area::Finalized);
        assert_eq!(outcome.written.as_deref(), Some("RawData!B14"));
        let write = sheet.last_at("RawData", ROW).unwrap();
        assert_eq!(write.cells[0], Cell::Int(2046));
        assert_eq!(write.cells[2], Cell::Int(2));

        let stored = storage.get("a.json").unwrap();
        assert_eq!(stored.area, Area::Finalized);
        assert_eq!(stored.subject.as_deref(), Some("2025wasno_3_red1"));
        assert_eq!(stored.observer.as_deref(), Some("avery"));
    }

    #[test]
    fn unparseable_payload_is_malformed() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        submit(&storage, "junk.json", b"{ not json");

        let outcome = intake.process("junk.json", &single(), soon()).unwrap();

        assert_eq!(outcome.area, Area::Malformed);
        assert!(sheet.rows().is_empty());
    }

    #[test]
    fn missing_match_number_fails_until_requeued() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        submit(&storage, "a.json", &sample_payload(2046, 0, "avery"));

        let outcome = intake.process("a.json", &single(), soon()).unwrap();
        assert_eq!(outcome.area, Area::Failed);
        let failure = storage.get("a.json").unwrap().failure.unwrap();
        assert_eq!(failure.kind, FailureKind::NotWritableYet);

        intake.requeue("a.json").unwrap();
        assert_eq!(storage.get("a.json").unwrap().area, Area::Pending);
    }

    #[test]
    fn prescouted_report_needs_no_match_number() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        let bytes = payload_with(2046, 0, "avery", |v| v["Prescouting"] = true.into());
        submit(&storage, "a.json", &bytes);

        let outcome = intake.process("a.json", &single(), soon()).unwrap();

        assert_eq!(outcome, Outcome::moved(Area::Finalized));
        assert!(sheet.rows().is_empty());
    }

    #[test]
    fn single_mode_duplicate_is_rejected() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        submit(&storage, "a.json", &sample_payload(2046, 3, "avery"));
        submit(&storage, "b.json", &sample_payload(2046, 3, "jo"));

        intake.process("a.json", &single(), soon()).unwrap();
        let outcome = intake.process("b.json", &single(), soon()).unwrap();

        assert_eq!(outcome.area, Area::Failed);
        let failure = storage.get("b.json").unwrap().failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Rejected);
        assert_eq!(sheet.rows().len(), 1);
    }

    #[test]
    fn rescouting_replaces_prior_observers() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        let ctx = multi(2);

        submit(&storage, "a.json", &sample_payload(2046, 3, "avery"));
        submit(&storage, "b.json", &sample_payload(2046, 3, "jo"));
        intake.process("a.json", &ctx, soon()).unwrap();
        intake.process("b.json", &ctx, soon()).unwrap();
        assert_eq!(sheet.last_at("RawData", ROW).unwrap().cells[2], Cell::Int(2));

        let rescout = payload_with(2046, 3, "sam", |v| {
            v["Rescouting"] = true.into();
            v["Cycles"] = serde_json::json!([
                { "Time": 50.0, "Type": "Net", "Success": true }
            ]);
        });
        submit(&storage, "c.json", &rescout);
        let outcome = intake.process("c.json", &ctx, soon()).unwrap();

        assert_eq!(outcome.area, Area::Finalized);
        let write = sheet.last_at("RawData", ROW).unwrap();
        assert_eq!(write.cells[1], Cell::Float(50.0));
        assert_eq!(write.cells[2], Cell::Int(1));

        let observers = intake
            .observers(&ctx, NonZeroU32::new(3).unwrap(), Station::new(Alliance::Red, 1).unwrap())
            .unwrap();
        assert_eq!(observers, vec!["sam"]);
        assert!(storage.get("a.json").unwrap().superseded);
        assert!(storage.get("b.json").unwrap().superseded);
    }

    #[test]
    fn single_mode_rescout_replaces_earlier_rescout() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        let ctx = single();
        let rescout = |scouter, cycles: Value| {
            payload_with(2046, 3, scouter, |v| {
                v["Rescouting"] = true.into();
                v["Cycles"] = cycles;
            })
        };

        submit(&storage, "a.json", &sample_payload(2046, 3, "avery"));
        intake.process("a.json", &ctx, soon()).unwrap();

        submit(
            &storage,
            "c.json",
            &rescout("sam", serde_json::json!([{ "Time": 50.0, "Type": "Net", "Success": true }])),
        );
        intake.process("c.json", &ctx, soon()).unwrap();

        submit(
            &storage,
            "d.json",
            &rescout(
                "kim",
                serde_json::json!([
                    { "Time": 10.0, "Type": "Net", "Success": true },
                    { "Time": 20.0, "Type": "Net", "Success": true },
                    { "Time": 90.0, "Type": "Processor", "Success": true }
                ]),
            ),
        );
        let outcome = intake.process("d.json", &ctx, soon()).unwrap();

        assert_eq!(outcome.area, Area::Finalized);
        let write = sheet.last_at("RawData", ROW).unwrap();
        assert_eq!(write.cells[1], Cell::Float(30.0));
        assert_eq!(write.cells[2], Cell::Int(3));
        let Cell::Text(notes) = write.cells.last().unwrap() else {
            panic!("notes should be text");
        };
        assert!(!notes.contains("sam"));
        assert!(!notes.contains("MISMATCH"));

        let observers = intake
            .observers(&ctx, NonZeroU32::new(3).unwrap(), Station::new(Alliance::Red, 1).unwrap())
            .unwrap();
        assert_eq!(observers, vec!["kim"]);
        assert!(storage.get("a.json").unwrap().superseded);
        assert!(storage.get("c.json").unwrap().superseded);
    }

    #[test]
    fn multi_mode_rescouts_group_together() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        let ctx = multi(2);

        for (name, scouter) in [("a.json", "sam"), ("b.json", "kim")] {
            let bytes = payload_with(2046, 3, scouter, |v| v["Rescouting"] = true.into());
            submit(&storage, name, &bytes);
            intake.process(name, &ctx, soon()).unwrap();
        }

        let observers = intake
            .observers(&ctx, NonZeroU32::new(3).unwrap(), Station::new(Alliance::Red, 1).unwrap())
            .unwrap();
        assert_eq!(observers, vec!["sam", "kim"]);
    }

    #[test]
    fn match_past_last_row_fails_instead_of_panicking() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        submit(&storage, "a.json", &sample_payload(2046, 1_000_000_000, "avery"));

        let outcome = intake.process("a.json", &single(), soon()).unwrap();

        assert_eq!(outcome.area, Area::Failed);
        let failure = storage.get("a.json").unwrap().failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Rejected);
        assert!(sheet.rows().is_empty());
    }

    #[test]
    fn prescouted_report_waits_for_its_subject_lock() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        let bytes = payload_with(2046, 0, "avery", |v| v["Prescouting"] = true.into());
        submit(&storage, "a.json", &bytes);

        let _held = intake.locks.acquire("2025wasno_0_red1", soon()).unwrap();
        let err = intake
            .process("a.json", &single(), Instant::now() + Duration::from_millis(20))
            .unwrap_err();

        assert!(matches!(err, IntakeError::Timeout { .. }));
        assert_eq!(storage.get("a.json").unwrap().area, Area::Pending);
    }

    #[test]
    fn late_observer_rewrites_completed_subject() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        let ctx = multi(3);

        for (name, scouter) in [("a.json", "avery"), ("b.json", "jo"), ("c.json", "sam")] {
            submit(&storage, name, &sample_payload(2046, 3, scouter));
            intake.process(name, &ctx, soon()).unwrap();
        }
        assert_eq!(sheet.rows().len(), 1);

        submit(&storage, "d.json", &sample_payload(2046, 3, "dee"));
        let outcome = intake.process("d.json", &ctx, soon()).unwrap();

        assert_eq!(outcome.written.as_deref(), Some("RawData!B14"));
        assert_eq!(sheet.rows().len(), 2);
        let write = sheet.last_at("RawData", ROW).unwrap();
        assert_eq!(write.cells[2], Cell::Int(2));
        let Cell::Text(notes) = write.cells.last().unwrap() else {
            panic!("notes should be text");
        };
        assert!(notes.starts_with(
            "notes from avery; notes from jo; notes from sam; notes from dee"
        ));
        assert_eq!(storage.observers_for("2025wasno_3_red1").unwrap().len(), 4);
    }

    #[test]
    fn multi_mode_waits_for_expected_observers() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        let ctx = multi(3);

        for (name, scouter) in [("a.json", "avery"), ("b.json", "jo")] {
            submit(&storage, name, &sample_payload(2046, 3, scouter));
            let outcome = intake.process(name, &ctx, soon()).unwrap();
            assert_eq!(outcome, Outcome::moved(Area::Finalized));
        }
        assert!(sheet.rows().is_empty());

        let lost = payload_with(2046, 3, "sam", |v| {
            v["Misc"]["User Lost Track"] = true.into();
        });
        submit(&storage, "c.json", &lost);
        let outcome = intake.process("c.json", &ctx, soon()).unwrap();

        assert_eq!(outcome.written.as_deref(), Some("RawData!B14"));
        let write = sheet.last_at("RawData", ROW).unwrap();
        let Cell::Text(notes) = write.cells.last().unwrap() else {
            panic!("notes should be text");
        };
        assert!(notes.starts_with("LOST TRACK; notes from avery; notes from jo"));
    }

    #[test]
    fn refused_write_fails_without_finalizing() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::rejecting();
        let intake = Intake::new(&storage, &sheet);
        submit(&storage, "a.json", &sample_payload(2046, 3, "avery"));

        let outcome = intake.process("a.json", &single(), soon()).unwrap();

        assert_eq!(outcome.area, Area::Failed);
        let stored = storage.get("a.json").unwrap();
        assert_eq!(stored.failure.unwrap().kind, FailureKind::Rejected);
        assert!(storage.observers_for("2025wasno_3_red1").unwrap().is_empty());
    }

    #[test]
    fn held_subject_times_out_and_stays_pending() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        submit(&storage, "a.json", &sample_payload(2046, 3, "avery"));

        let _held = intake.locks.acquire("2025wasno_3_red1", soon()).unwrap();
        let err = intake
            .process("a.json", &single(), Instant::now() + Duration::from_millis(20))
            .unwrap_err();

        assert!(matches!(err, IntakeError::Timeout { .. }));
        assert_eq!(storage.get("a.json").unwrap().area, Area::Pending);
        assert!(sheet.rows().is_empty());
    }

    #[test]
    fn processing_twice_is_refused() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        submit(&storage, "a.json", &sample_payload(2046, 3, "avery"));

        intake.process("a.json", &single(), soon()).unwrap();
        let err = intake.process("a.json", &single(), soon()).unwrap_err();

        assert!(matches!(
            err,
            IntakeError::Storage(StorageError::Conflict { .. })
        ));
    }

    #[test]
    fn pit_report_lands_on_roster_row() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        storage
            .submit("pit.json", ReportKind::Pit, &pit_payload(1678))
            .unwrap();

        let outcome = intake.process("pit.json", &single(), soon()).unwrap();

        assert_eq!(outcome.area, Area::PitFinalized);
        assert_eq!(outcome.written.as_deref(), Some("PitScouting!B2"));
        let write = sheet.last_at("PitScouting", 2).unwrap();
        assert_eq!(write.cells[0], Cell::Int(1678));
        assert_eq!(write.cells[4], Cell::from("L2, L3"));
    }

    #[test]
    fn pit_report_off_roster_is_not_writable_yet() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        storage
            .submit("pit.json", ReportKind::Pit, &pit_payload(9999))
            .unwrap();

        let outcome = intake.process("pit.json", &single(), soon()).unwrap();

        assert_eq!(outcome.area, Area::Failed);
        let failure = storage.get("pit.json").unwrap().failure.unwrap();
        assert_eq!(failure.kind, FailureKind::NotWritableYet);
    }

    #[test]
    fn discard_only_from_pending() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        submit(&storage, "a.json", &sample_payload(2046, 3, "avery"));
        submit(&storage, "b.json", &sample_payload(254, 4, "jo"));

        intake.discard("a.json").unwrap();
        assert_eq!(storage.get("a.json").unwrap().area, Area::Discarded);
        assert!(sheet.rows().is_empty());

        intake.process("b.json", &single(), soon()).unwrap();
        assert!(intake.discard("b.json").is_err());
    }

    #[test]
    fn switching_event_archives_old_reports() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        let a = EventContext::new("A", vec![], false, 1, Targets::default());
        let b = a.with_event("B", vec![]);

        submit(&storage, "a1.json", &sample_payload(1, 1, "x"));
        submit(&storage, "a2.json", &sample_payload(2, 2, "x"));
        submit(&storage, "b1.json", &sample_payload(3, 1, "x"));
        intake.process("a1.json", &a, soon()).unwrap();
        intake.process("a2.json", &a, soon()).unwrap();
        intake.process("b1.json", &b, soon()).unwrap();

        let (ctx, archived) = intake.switch_event(&a, "B", vec![3]).unwrap();

        assert_eq!(ctx.event(), "B");
        assert_eq!(ctx.roster(), &[3]);
        let names: Vec<&str> = archived.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a1.json", "a2.json"]);
        assert_eq!(storage.get("b1.json").unwrap().area, Area::Finalized);
        assert_eq!(
            storage.read_payload("a1.json").unwrap(),
            sample_payload(1, 1, "x")
        );
    }

    #[test]
    fn prefill_validates_range() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);

        assert_eq!(intake.prefill(&single(), 1, 2, soon()).unwrap(), 12);
        assert_eq!(sheet.rows()[0].range(), "RawData!A2");

        for (first, last) in [(0, 3), (5, 4), (1, 51), (u32::MAX - 2, u32::MAX)] {
            let err = intake.prefill(&single(), first, last, soon()).unwrap_err();
            assert!(matches!(err, IntakeError::InvalidRange { .. }));
        }
    }

    #[test]
    fn concurrent_processing_serializes_each_subject() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        let ctx = multi(3);

        // Three observers for each of four matches, interleaved.
        for scouter in ["avery", "jo", "sam"] {
            for match_number in 1..=4 {
                let name = format!("{EVENT}_{match_number}_red1_{scouter}.json");
                submit(&storage, &name, &sample_payload(2046, match_number, scouter));
            }
        }

        let results = intake
            .process_pending(&ctx, Duration::from_secs(5), 4)
            .unwrap();

        assert_eq!(results.len(), 12);
        assert!(results.iter().all(|(_, r)| r.as_ref().is_ok_and(|o| o.area == Area::Finalized)));
        for match_number in 1..=4 {
            let key = format!("{EVENT}_{match_number}_red1");
            assert_eq!(storage.observers_for(&key).unwrap().len(), 3);
        }
        // Exactly one write per subject: the one that completed it.
        assert_eq!(sheet.rows().len(), 4);
    }

    #[test]
    fn pending_results_keep_submission_order() {
        let (_dir, storage) = test_storage();
        let sheet = MemorySheet::default();
        let intake = Intake::new(&storage, &sheet);
        for (i, name) in (0..).zip(["c.json", "a.json", "b.json"]) {
            submit(&storage, name, &sample_payload(2046, i + 1, "avery"));
        }

        let results = intake
            .process_pending(&single(), Duration::from_secs(5), 3)
            .unwrap();
        let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["c.json", "a.json", "b.json"]);
    }
}
