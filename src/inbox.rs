//! Inbox ingestion: submit every report file found under a directory.
//!
//! Walks the tree with the same filtering a source checkout gets:
//! `.gitignore` and `.ignore` files are honored and dotfiles are skipped,
//! so half-written `.name.tmp` files never get picked up.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::model::{ReportKind, StoredReport};
use crate::storage::Storage;

/// What one ingestion pass did.
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// Reports now stored, including ones already present with identical bytes.
    pub stored: Vec<StoredReport>,
    /// Files that could not be submitted, with the reason.
    pub rejected: Vec<(PathBuf, String)>,
}

/// Report files under `root`, sorted by path.
///
/// `skip` names directories to skip at any depth.
pub fn scan(root: &Path, skip: &[String]) -> Vec<PathBuf> {
    let skip_owned: Vec<String> = skip.to_vec();
    let mut builder = WalkBuilder::new(root);
    builder
        .require_git(false)
        .filter_entry(move |entry| {
            if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                let name = entry.file_name().to_string_lossy();
                if skip_owned.iter().any(|s| s == name.as_ref()) {
                    return false;
                }
            }
            true
        })
        .sort_by_file_name(Ord::cmp);

    builder
        .build()
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect()
}

/// Submit every report file under `root` as `kind`, named by file name.
pub fn ingest(storage: &Storage, root: &Path, skip: &[String], kind: ReportKind) -> IngestSummary {
    let mut summary = IngestSummary::default();

    for path in scan(root, skip) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let result = fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                storage
                    .submit(&name, kind, &bytes)
                    .map_err(|e| e.to_string())
            });
        match result {
            Ok(report) => {
                tracing::debug!(report = %report.name, path = %path.display(), "ingested");
                summary.stored.push(report);
            }
            Err(reason) => {
                tracing::warn!(path = %path.display(), "could not ingest: {reason}");
                summary.rejected.push((path, reason));
            }
        }
    }

    summary
}
