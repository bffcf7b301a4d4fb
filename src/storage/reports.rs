//! Report storage: submission, lookup, and lifecycle transitions.

use std::fs;
use std::io;

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use sha2::{Digest, Sha256};

use crate::model::{Area, Failure, FailureKind, ReportKind, StoredReport};

use super::{Result, Storage, StorageError, validate_name, write_durably};

const COLUMNS: &str = "name, kind, area, digest, event, subject, observer, rescouting, \
                       superseded, failure_kind, failure_detail, submitted_at, updated_at";

/// Identity recorded on a match report as it becomes `Finalized`.
#[derive(Debug, Clone, Copy)]
pub struct Finalization<'a> {
    pub event: &'a str,
    pub subject: &'a str,
    pub observer: &'a str,
    pub rescouting: bool,
    /// A rescouting report also supersedes earlier rescouting reports.
    pub replaces_rescouts: bool,
}

impl Storage {
    /// Stores a payload under `name` in `Pending`.
    ///
    /// Submitting identical bytes under an existing name returns the stored
    /// report unchanged; different bytes are refused.
    pub fn submit(&self, name: &str, kind: ReportKind, bytes: &[u8]) -> Result<StoredReport> {
        validate_name(name)?;
        let digest = hex::encode(Sha256::digest(bytes));

        let conn = self.conn();
        if let Some(existing) = find(&conn, name)? {
            if existing.digest == digest && existing.kind == kind {
                return Ok(existing);
            }
            return Err(StorageError::NameTaken(name.to_string()));
        }

        write_durably(&self.payload_path(name), bytes)?;

        let now = Timestamp::now().to_string();
        conn.execute(
            "INSERT INTO reports (name, kind, area, digest, submitted_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![name, kind.as_str(), Area::Pending.as_str(), digest, now],
        )?;
        require(&conn, name)
    }

    /// Loads one report's lifecycle metadata.
    pub fn get(&self, name: &str) -> Result<StoredReport> {
        require(&self.conn(), name)
    }

    /// Reads a report's payload bytes, wherever it currently lives.
    pub fn read_payload(&self, name: &str) -> Result<Vec<u8>> {
        let report = self.get(name)?;
        if report.area == Area::Archived {
            let event = report.event.as_deref().unwrap_or_default();
            let compressed = fs::read(self.archive_path(event, name))?;
            return Ok(zstd::decode_all(compressed.as_slice())?);
        }
        Ok(fs::read(self.payload_path(name))?)
    }

    /// Lists reports in submission order, optionally restricted to one area.
    pub fn list(&self, area: Option<Area>) -> Result<Vec<StoredReport>> {
        let conn = self.conn();
        match area {
            Some(area) => query(
                &conn,
                &format!("SELECT {COLUMNS} FROM reports WHERE area = ?1 ORDER BY seq"),
                params![area.as_str()],
            ),
            None => query(
                &conn,
                &format!("SELECT {COLUMNS} FROM reports ORDER BY seq"),
                params![],
            ),
        }
    }

    /// Finalized, non-superseded reports of one subject, in submission order.
    pub fn active_finalized(&self, subject: &str) -> Result<Vec<StoredReport>> {
        query(
            &self.conn(),
            &format!(
                "SELECT {COLUMNS} FROM reports
                 WHERE subject = ?1 AND area = ?2 AND superseded = 0
                 ORDER BY seq"
            ),
            params![subject, Area::Finalized.as_str()],
        )
    }

    /// Observers whose reports currently stand for one subject.
    pub fn observers_for(&self, subject: &str) -> Result<Vec<String>> {
        Ok(self
            .active_finalized(subject)?
            .into_iter()
            .filter_map(|r| r.observer)
            .collect())
    }

    /// Moves a report between areas, failing if it is not in `from`.
    ///
    /// Any recorded failure is cleared.
    pub fn transition(&self, name: &str, from: Area, to: Area) -> Result<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE reports
             SET area = ?3, failure_kind = NULL, failure_detail = NULL, updated_at = ?4
             WHERE name = ?1 AND area = ?2",
            params![name, from.as_str(), to.as_str(), Timestamp::now().to_string()],
        )?;
        check_swapped(&conn, name, from, changed)
    }

    /// Moves a `Pending` report to `Failed`, recording why.
    pub fn fail(&self, name: &str, failure: &Failure) -> Result<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE reports
             SET area = ?2, failure_kind = ?3, failure_detail = ?4, updated_at = ?5
             WHERE name = ?1 AND area = ?6",
            params![
                name,
                Area::Failed.as_str(),
                failure.kind.as_str(),
                &failure.detail,
                Timestamp::now().to_string(),
                Area::Pending.as_str(),
            ],
        )?;
        check_swapped(&conn, name, Area::Pending, changed)
    }

    /// Moves a `Pending` match report to `Finalized`.
    ///
    /// A rescouting report supersedes every standing non-rescouting report
    /// of its subject in the same transaction, and standing rescouting
    /// reports too when `replaces_rescouts` is set. Returns the names
    /// superseded.
    pub fn finalize(&self, name: &str, fin: Finalization<'_>) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Timestamp::now().to_string();

        let changed = tx.execute(
            "UPDATE reports
             SET area = ?2, event = ?3, subject = ?4, observer = ?5, rescouting = ?6,
                 superseded = 0, failure_kind = NULL, failure_detail = NULL, updated_at = ?7
             WHERE name = ?1 AND area = ?8",
            params![
                name,
                Area::Finalized.as_str(),
                fin.event,
                fin.subject,
                fin.observer,
                fin.rescouting,
                now,
                Area::Pending.as_str(),
            ],
        )?;
        check_swapped(&tx, name, Area::Pending, changed)?;

        let mut superseded = Vec::new();
        if fin.rescouting {
            let mut stmt = tx.prepare(
                "UPDATE reports SET superseded = 1, updated_at = ?3
                 WHERE subject = ?1 AND area = ?2 AND superseded = 0 AND name <> ?4
                   AND (rescouting = 0 OR ?5)
                 RETURNING name",
            )?;
            let rows = stmt.query_map(
                params![
                    fin.subject,
                    Area::Finalized.as_str(),
                    now,
                    name,
                    fin.replaces_rescouts
                ],
                |row| row.get::<_, String>(0),
            )?;
            for row in rows {
                superseded.push(row?);
            }
        }

        tx.commit()?;
        Ok(superseded)
    }

    /// Moves a `Pending` pit report to `PitFinalized`.
    pub fn finalize_pit(&self, name: &str, subject: &str, observer: &str) -> Result<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE reports
             SET area = ?2, subject = ?3, observer = ?4,
                 failure_kind = NULL, failure_detail = NULL, updated_at = ?5
             WHERE name = ?1 AND area = ?6",
            params![
                name,
                Area::PitFinalized.as_str(),
                subject,
                observer,
                Timestamp::now().to_string(),
                Area::Pending.as_str(),
            ],
        )?;
        check_swapped(&conn, name, Area::Pending, changed)
    }

    /// Archives every `Finalized` report not under `active_event`.
    ///
    /// Each payload is copied compressed to `archive/<event>/`, synced, and
    /// only then flipped to `Archived` and removed from `reports/`.
    /// Returns the archived reports.
    pub fn archive_sweep(&self, active_event: &str) -> Result<Vec<StoredReport>> {
        let stale: Vec<StoredReport> = self
            .list(Some(Area::Finalized))?
            .into_iter()
            .filter(|r| r.event.as_deref() != Some(active_event))
            .collect();

        let mut archived = Vec::with_capacity(stale.len());
        for mut report in stale {
            let event = report.event.clone().unwrap_or_default();
            let source = self.payload_path(&report.name);

            let bytes = fs::read(&source)?;
            let compressed = zstd::encode_all(bytes.as_slice(), 0)?;
            write_durably(&self.archive_path(&event, &report.name), &compressed)?;

            self.transition(&report.name, Area::Finalized, Area::Archived)?;
            match fs::remove_file(&source) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }

            report.area = Area::Archived;
            archived.push(report);
        }
        Ok(archived)
    }
}

fn find(conn: &Connection, name: &str) -> Result<Option<StoredReport>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM reports WHERE name = ?1"),
            params![name],
            RawReport::from_row,
        )
        .optional()?;
    raw.map(RawReport::into_report).transpose()
}

fn require(conn: &Connection, name: &str) -> Result<StoredReport> {
    find(conn, name)?.ok_or_else(|| StorageError::NotFound(name.to_string()))
}

fn query(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<StoredReport>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, RawReport::from_row)?;
    let mut reports = Vec::new();
    for row in rows {
        reports.push(row?.into_report()?);
    }
    Ok(reports)
}

/// Turns a zero-row compare-and-swap into the right error.
fn check_swapped(conn: &Connection, name: &str, expected: Area, changed: usize) -> Result<()> {
    if changed > 0 {
        return Ok(());
    }
    let actual = require(conn, name)?.area;
    Err(StorageError::Conflict {
        name: name.to_string(),
        expected,
        actual,
    })
}

/// Column values as stored, before parsing.
struct RawReport {
    name: String,
    kind: String,
    area: String,
    digest: String,
    event: Option<String>,
    subject: Option<String>,
    observer: Option<String>,
    rescouting: bool,
    superseded: bool,
    failure_kind: Option<String>,
    failure_detail: Option<String>,
    submitted_at: String,
    updated_at: String,
}

impl RawReport {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            kind: row.get(1)?,
            area: row.get(2)?,
            digest: row.get(3)?,
            event: row.get(4)?,
            subject: row.get(5)?,
            observer: row.get(6)?,
            rescouting: row.get(7)?,
            superseded: row.get(8)?,
            failure_kind: row.get(9)?,
            failure_detail: row.get(10)?,
            submitted_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_report(self) -> Result<StoredReport> {
        let corrupt = |what: &str, e: String| {
            StorageError::Corrupt(format!("report {}: invalid {what}: {e}", self.name))
        };

        let kind = self.kind.parse::<ReportKind>().map_err(|e| corrupt("kind", e))?;
        let area = self.area.parse::<Area>().map_err(|e| corrupt("area", e))?;
        let failure = match self.failure_kind.as_deref() {
            Some(k) => Some(Failure {
                kind: k.parse::<FailureKind>().map_err(|e| corrupt("failure", e))?,
                detail: self.failure_detail.clone().unwrap_or_default(),
            }),
            None => None,
        };
        let submitted_at = self
            .submitted_at
            .parse::<Timestamp>()
            .map_err(|e| corrupt("submitted_at", e.to_string()))?;
        let updated_at = self
            .updated_at
            .parse::<Timestamp>()
            .map_err(|e| corrupt("updated_at", e.to_string()))?;

        Ok(StoredReport {
            name: self.name,
            kind,
            area,
            digest: self.digest,
            event: self.event,
            subject: self.subject,
            observer: self.observer,
            rescouting: self.rescouting,
            superseded: self.superseded,
            failure,
            submitted_at,
            updated_at,
        })
    }
}
