//! Columnar time-series table.
//!
//! # Invariants
//! - The time index is strictly increasing.
//! - Every column has exactly one value per index entry.
//! - Column names are unique within a table.

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Float(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: ColumnValues,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    IndexNotIncreasing { position: usize },
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    DuplicateColumn(String),
    BlankColumnName,
}

impl Display for TableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexNotIncreasing { position } => {
                write!(f, "time index is not strictly increasing at row {position}")
            }
            Self::LengthMismatch {
                column,
                expected,
                actual,
            } => write!(
                f,
                "column `{column}` has {actual} values, expected {expected}"
            ),
            Self::DuplicateColumn(name) => write!(f, "duplicate column `{name}`"),
            Self::BlankColumnName => write!(f, "column name must not be blank"),
        }
    }
}

impl Error for TableError {}

/// Time-indexed table of named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    index: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
}

impl TimeSeriesTable {
    pub fn new(index: Vec<DateTime<Utc>>) -> Result<Self, TableError> {
        if let Some(position) = index.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(TableError::IndexNotIncreasing {
                position: position + 1,
            });
        }
        Ok(Self {
            index,
            columns: Vec::new(),
        })
    }

    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: ColumnValues,
    ) -> Result<(), TableError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TableError::BlankColumnName);
        }
        if self.column(&name).is_some() {
            return Err(TableError::DuplicateColumn(name));
        }
        if values.len() != self.index.len() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.index.len(),
                actual: values.len(),
            });
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: ColumnValues,
    ) -> Result<Self, TableError> {
        self.push_column(name, values)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn float_column(&self, name: &str) -> Option<&[f64]> {
        match self.column(name)?.values() {
            ColumnValues::Float(values) => Some(values),
            ColumnValues::Text(_) => None,
        }
    }

    pub fn text_column(&self, name: &str) -> Option<&[String]> {
        match self.column(name)?.values() {
            ColumnValues::Text(values) => Some(values),
            ColumnValues::Float(_) => None,
        }
    }

    /// First and last index entries.
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((*self.index.first()?, *self.index.last()?))
    }
}
