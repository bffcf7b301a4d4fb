//! Event context: what intake needs to know about the active event.
//!
//! A context is immutable. Switching events builds a new one; requests
//! already holding the old context finish against it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;

/// Sheet tab names records are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub matches: String,
    pub pits: String,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            matches: "RawData".into(),
            pits: "PitScouting".into(),
        }
    }
}

/// Per-request view of the active event.
#[derive(Debug, Clone)]
pub struct EventContext {
    event: String,
    roster: Arc<[u64]>,
    multi_scouting: bool,
    expected_observers: usize,
    targets: Targets,
}

impl EventContext {
    pub fn new(
        event: impl Into<String>,
        roster: Vec<u64>,
        multi_scouting: bool,
        expected_observers: usize,
        targets: Targets,
    ) -> Self {
        Self {
            event: event.into(),
            roster: roster.into(),
            multi_scouting,
            expected_observers: expected_observers.max(1),
            targets,
        }
    }

    /// Build the context for the configured event, loading its roster
    /// from `<root>/teams/<event>` when present.
    pub fn from_config(config: &Config) -> io::Result<Self> {
        let roster = load_roster(&config.root(), &config.event_key)?;
        Ok(Self::new(
            config.event_key.clone(),
            roster,
            config.multi_scouting,
            config.expected_observers,
            Targets {
                matches: config.match_target.clone(),
                pits: config.pit_target.clone(),
            },
        ))
    }

    /// The same deployment pointed at a different event.
    #[must_use]
    pub fn with_event(&self, event: impl Into<String>, roster: Vec<u64>) -> Self {
        Self {
            event: event.into(),
            roster: roster.into(),
            ..self.clone()
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Teams attending, in the order pit rows are laid out.
    pub fn roster(&self) -> &[u64] {
        &self.roster
    }

    pub fn multi_scouting(&self) -> bool {
        self.multi_scouting
    }

    /// Finalized reports a subject needs before it is reconciled and written.
    pub fn expected_observers(&self) -> usize {
        self.expected_observers
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }
}

/// Path of the roster file for an event.
pub fn roster_path(root: &Path, event: &str) -> PathBuf {
    root.join("teams").join(event)
}

/// Read an event's team roster.
///
/// The file holds a header line followed by one team number per line.
/// A missing file is an empty roster. Lines that are not numbers are
/// skipped with a warning.
pub fn load_roster(root: &Path, event: &str) -> io::Result<Vec<u64>> {
    let path = roster_path(root, event);
    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut roster = Vec::new();
    for line in contents.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<u64>() {
            Ok(team) => roster.push(team),
            Err(e) => tracing::warn!(path = %path.display(), line, "skipping roster entry: {e}"),
        }
    }
    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn roster_skips_header_and_blanks() {
        let dir = TempDir::new().unwrap();
        let path = roster_path(dir.path(), "2025wasno");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "teams\n254\n\n1678\nnope\n2046\n").unwrap();

        let roster = load_roster(dir.path(), "2025wasno").unwrap();
        assert_eq!(roster, vec![254, 1678, 2046]);
    }

    #[test]
    fn missing_roster_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_roster(dir.path(), "2025none").unwrap().is_empty());
    }

    #[test]
    fn with_event_leaves_receiver_untouched() {
        let ctx = EventContext::new("2025a", vec![1, 2], true, 3, Targets::default());
        let next = ctx.with_event("2025b", vec![9]);

        assert_eq!(ctx.event(), "2025a");
        assert_eq!(ctx.roster(), &[1, 2]);
        assert_eq!(next.event(), "2025b");
        assert_eq!(next.roster(), &[9]);
        assert!(next.multi_scouting());
        assert_eq!(next.expected_observers(), 3);
    }
}
