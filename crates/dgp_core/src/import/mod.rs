//! Raw measurement import.
//!
//! # Responsibility
//! - Parse delimited gravity and trajectory files into time-indexed tables.
//! - Run parsing and store writes on background workers.
//! - Hand every job result back through one ordered completion channel.
//!
//! # Invariants
//! - Job failures are delivered as `ImportError` values, never as panics
//!   crossing the worker boundary.
//! - Workers never touch the project tree; attaching results is the
//!   caller's job on the control thread.

use crate::model::DataKind;
use crate::store::{StorageError, TableError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod job;
mod parser;
mod pipeline;

pub use job::{JobHandle, JobId, JobState};
pub use parser::{
    gps_to_unix_seconds, leap_seconds_at, parse_file, parse_text, Delimiter, ImportConfig,
    ParsedTable, GRAVITY_COLUMNS, TRAJECTORY_COLUMNS,
};
pub use pipeline::{ImportOutcome, ImportPipeline, ImportedFile};

/// Result type used by import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Errors produced while importing one raw file.
#[derive(Debug)]
pub enum ImportError {
    /// Source file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Import options are unusable.
    InvalidConfig(String),
    /// Required columns for the data kind are absent.
    MissingColumns { kind: DataKind, missing: Vec<String> },
    /// A row does not have one field per configured column.
    SchemaMismatch {
        line: usize,
        expected: usize,
        actual: usize,
    },
    /// No row produced a usable timestamp.
    Empty,
    /// Built time index or columns violate table invariants.
    InvalidTable(TableError),
    /// Parsed table could not be written to the store.
    Storage(StorageError),
    /// Job was cancelled before it completed.
    Cancelled,
    /// Worker thread panicked while running the job.
    Panicked(String),
    /// No worker is left to run the job.
    PipelineClosed,
}

impl ImportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read `{}`: {source}", path.display())
            }
            Self::InvalidConfig(detail) => write!(f, "invalid import options: {detail}"),
            Self::MissingColumns { kind, missing } => {
                write!(f, "{kind} import is missing columns: {}", missing.join(", "))
            }
            Self::SchemaMismatch {
                line,
                expected,
                actual,
            } => write!(
                f,
                "line {line} has {actual} fields, expected {expected}"
            ),
            Self::Empty => write!(f, "file contains no rows with a valid timestamp"),
            Self::InvalidTable(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Cancelled => write!(f, "import cancelled"),
            Self::Panicked(message) => write!(f, "import worker panicked: {message}"),
            Self::PipelineClosed => write!(f, "import pipeline has no running workers"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidTable(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::InvalidConfig(_)
            | Self::MissingColumns { .. }
            | Self::SchemaMismatch { .. }
            | Self::Empty
            | Self::Cancelled
            | Self::Panicked(_)
            | Self::PipelineClosed => None,
        }
    }
}

impl From<TableError> for ImportError {
    fn from(value: TableError) -> Self {
        Self::InvalidTable(value)
    }
}

impl From<StorageError> for ImportError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}
