//! Binary time-series store.
//!
//! # Responsibility
//! - Hold large per-DataFile measurement tables outside the project document.
//! - Keep one metadata attribute map next to every table.
//!
//! # Invariants
//! - At most one writer is active per store file; readers never observe a
//!   partially written table.
//! - A missing key is a typed absence (`Ok(None)`), not an error.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod key;
mod series_store;
mod table;

pub use key::StoreKey;
pub use series_store::{SeriesStore, SqliteSeriesStore, StoreAttrs};
pub use table::{Column, ColumnValues, TableError, TimeSeriesTable};

/// Result type used by store operations.
pub type StoreResult<T> = Result<T, StorageError>;

/// Errors from binary store operations.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Persisted bytes cannot be converted back into a table.
    Corrupt { key: String, detail: String },
    /// A store lock was poisoned by a panicking thread.
    LockPoisoned,
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Corrupt { key, detail } => write!(f, "corrupt store entry `{key}`: {detail}"),
            Self::LockPoisoned => write!(f, "store lock poisoned"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Corrupt { .. } => None,
            Self::LockPoisoned => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
