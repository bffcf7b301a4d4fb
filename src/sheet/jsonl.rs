//! File-backed sheet: one append-only JSONL log per target tab.
//!
//! ```text
//! <dir>/<target>.jsonl   # {"target":..,"column":..,"row":..,"cells":[..]} per line
//! ```
//!
//! Later lines for the same row supersede earlier ones; [`JsonlSheet::snapshot`]
//! folds the log into the current contents.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use serde_json::Value;

use super::{RowWrite, SheetWriter, WriteError};

pub struct JsonlSheet {
    dir: PathBuf,
    append: Mutex<()>,
}

impl JsonlSheet {
    /// Creates the output directory if it doesn't exist.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            append: Mutex::new(()),
        })
    }

    /// Current cells per (column, row) for one target.
    pub fn snapshot(&self, target: &str) -> Result<BTreeMap<(char, u32), Value>, WriteError> {
        let mut rows = BTreeMap::new();
        let file = match fs::File::open(self.path(target)) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(rows),
            Err(e) => return Err(e.into()),
        };
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let entry: Value = serde_json::from_str(&line)?;
            let column = entry["column"]
                .as_str()
                .and_then(|c| c.chars().next())
                .unwrap_or('B');
            let row = entry["row"]
                .as_u64()
                .and_then(|r| u32::try_from(r).ok())
                .unwrap_or(0);
            rows.insert((column, row), entry["cells"].clone());
        }
        Ok(rows)
    }

    fn path(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{target}.jsonl"))
    }
}

impl SheetWriter for JsonlSheet {
    fn write_row(&self, write: &RowWrite, deadline: Instant) -> Result<(), WriteError> {
        let mut line = serde_json::to_string(write)?;
        line.push('\n');

        // A poisoned lock still guards a usable file.
        let _guard = self
            .append
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if Instant::now() >= deadline {
            return Err(WriteError::Timeout {
                range: write.range(),
            });
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(&write.target))?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tempfile::TempDir;

    use crate::sheet::Cell;

    fn test_sheet() -> (TempDir, JsonlSheet) {
        let dir = TempDir::new().unwrap();
        let sheet = JsonlSheet::new(dir.path().join("sheet")).unwrap();
        (dir, sheet)
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn later_write_overwrites_row() {
        let (_dir, sheet) = test_sheet();
        sheet
            .write_row(&RowWrite::data("RawData", 8, vec![Cell::Int(1)]), soon())
            .unwrap();
        sheet
            .write_row(&RowWrite::data("RawData", 8, vec![Cell::Int(2)]), soon())
            .unwrap();
        sheet
            .write_row(&RowWrite::data("RawData", 9, vec![Cell::NotApplicable]), soon())
            .unwrap();

        let rows = sheet.snapshot("RawData").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[&('B', 8)], serde_json::json!([2]));
        assert_eq!(rows[&('B', 9)], serde_json::json!(["N/A"]));
    }

    #[test]
    fn targets_are_separate_files() {
        let (_dir, sheet) = test_sheet();
        sheet
            .write_row(&RowWrite::data("PitScouting", 1, vec![]), soon())
            .unwrap();

        assert!(sheet.snapshot("RawData").unwrap().is_empty());
        assert_eq!(sheet.snapshot("PitScouting").unwrap().len(), 1);
    }

    #[test]
    fn expired_deadline_times_out() {
        let (_dir, sheet) = test_sheet();
        let err = sheet
            .write_row(&RowWrite::data("RawData", 2, vec![]), Instant::now())
            .unwrap_err();

        assert!(matches!(err, WriteError::Timeout { .. }));
        assert!(sheet.snapshot("RawData").unwrap().is_empty());
    }
}
