//! Local persistence for submitted reports and observer schedules.
//!
//! Report lifecycle state and schedules live in one `SQLite` database;
//! payload bytes live beside it as plain files:
//!
//! ```text
//! <root>/
//!   muster.sqlite                 # reports + individuals tables
//!   reports/<name>                # payload as submitted
//!   archive/<event>/<name>.zst    # payloads moved out of an old event
//! ```
//!
//! Every lifecycle change is a compare-and-swap on the report's area, so
//! a report is always in exactly one area even across crashes.

mod reports;
mod schedule;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::Connection;

use crate::model::Area;

pub use reports::Finalization;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("report not found: {0}")]
    NotFound(String),

    #[error("report name already holds a different payload: {0}")]
    NameTaken(String),

    #[error("invalid report name: {0:?}")]
    InvalidName(String),

    #[error("report {name} is {actual}, expected {expected}")]
    Conflict {
        name: String,
        expected: Area,
        actual: Area,
    },

    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// Schema version written to `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reports (
        seq            INTEGER PRIMARY KEY AUTOINCREMENT,
        name           TEXT NOT NULL UNIQUE,
        kind           TEXT NOT NULL,
        area           TEXT NOT NULL,
        digest         TEXT NOT NULL,
        event          TEXT,
        subject        TEXT,
        observer       TEXT,
        rescouting     INTEGER NOT NULL DEFAULT 0,
        superseded     INTEGER NOT NULL DEFAULT 0,
        failure_kind   TEXT,
        failure_detail TEXT,
        submitted_at   TEXT NOT NULL,
        updated_at     TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS reports_area ON reports (area);
    CREATE INDEX IF NOT EXISTS reports_subject ON reports (subject, area);

    CREATE TABLE IF NOT EXISTS individuals (
        username TEXT PRIMARY KEY,
        schedule TEXT NOT NULL
    );
";

/// Local storage for reports and schedules.
pub struct Storage {
    root: PathBuf,
    conn: Mutex<Connection>,
}

impl Storage {
    /// Opens (or creates) the store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("reports"))?;

        let conn = Connection::open(root.join("muster.sqlite"))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        migrate(&conn)?;

        Ok(Self {
            root,
            conn: Mutex::new(conn),
        })
    }

    /// Returns the default storage root: `~/.muster/store/`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".muster").join("store"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn payload_path(&self, name: &str) -> PathBuf {
        self.root.join("reports").join(name)
    }

    fn archive_path(&self, event: &str, name: &str) -> PathBuf {
        self.root.join("archive").join(event).join(format!("{name}.zst"))
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(StorageError::Corrupt(format!(
            "store schema version {version} is newer than supported {SCHEMA_VERSION}"
        )));
    }
    if version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

/// Report names are single path components: no separators, no dot-only names.
fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Write bytes to `path` via a temporary sibling, syncing before the rename.
fn write_durably(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));

    {
        let mut file = fs::File::create(&tmp)?;
        io::Write::write_all(&mut file, bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
