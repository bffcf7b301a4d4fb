//! Output rows and the collaborator that writes them.
//!
//! Intake hands every finished record to a [`SheetWriter`] as one
//! [`RowWrite`]: a target tab, a row number, and the ordered cells of that
//! row. The writer reports success or failure and never retries.

mod cells;
mod jsonl;

use std::fmt;
use std::io;
use std::time::Instant;

use serde::{Serialize, Serializer};

use crate::model::Stat;

pub use cells::{match_cells, pit_cells, prefill_writes};
pub use jsonl::JsonlSheet;

/// Text written for a statistic with no meaningful value.
pub const NOT_APPLICABLE: &str = "N/A";

/// One cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    NotApplicable,
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
        }
    }
}

impl From<Stat> for Cell {
    fn from(stat: Stat) -> Self {
        match stat {
            Stat::Value(v) => Self::Float(v),
            Stat::NotApplicable => Self::NotApplicable,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

/// A row of cells bound for one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowWrite {
    /// Target tab, e.g. `RawData`.
    pub target: String,
    /// Column the first cell lands in.
    pub column: char,
    pub row: u32,
    pub cells: Vec<Cell>,
}

impl RowWrite {
    /// A row starting in column B, where record data begins.
    pub fn data(target: impl Into<String>, row: u32, cells: Vec<Cell>) -> Self {
        Self {
            target: target.into(),
            column: 'B',
            row,
            cells,
        }
    }

    /// A1-style address of the first cell, e.g. `RawData!B8`.
    pub fn range(&self) -> String {
        format!("{}!{}{}", self.target, self.column, self.row)
    }
}

impl fmt::Display for RowWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} cells)", self.range(), self.cells.len())
    }
}

/// Why a row write did not land.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The collaborator refused the write.
    #[error("write to {range} rejected: {reason}")]
    Rejected { range: String, reason: String },

    /// The caller's deadline passed before the write finished.
    #[error("write to {range} did not finish before the deadline")]
    Timeout { range: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The external output collaborator.
///
/// Implementations must be safe to call from many intake workers at once.
/// A write for a row replaces whatever that row held before.
pub trait SheetWriter: Send + Sync {
    fn write_row(&self, write: &RowWrite, deadline: Instant) -> Result<(), WriteError>;
}
