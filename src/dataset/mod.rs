//! Columnar dataset input
//!
//! An in-memory, column-oriented table of typed cells. The bulk loader only
//! reads from it: every column is addressed by name, every cell by row index,
//! and every cell may be absent.
//!
//! ## Example
//!
//! ```rust
//! use app_analytics_ingest::dataset::{ColumnData, DataFrame};
//!
//! let mut frame = DataFrame::new();
//! frame
//!     .push_column("appTitle", ColumnData::Text(vec![Some("Acme".into()), None]))
//!     .unwrap();
//! frame
//!     .push_column("count", ColumnData::Integer(vec![Some(3), Some(1)]))
//!     .unwrap();
//!
//! let counts = frame.column::<i64>("count");
//! assert_eq!(counts.get(0).copied(), Ok(3));
//! assert_eq!(frame.row_count(), 2);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub mod json;
pub mod synthetic;

pub use json::FrameSchema;

/// Error type for dataset construction and loading
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// A column's length differs from the frame's row count
    #[error("Column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    /// A column with the same name already exists
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Input could not be parsed as JSON; `line` is 1-based
    #[error("JSON parse error at line {line}: {error}")]
    JsonParse { line: usize, error: String },

    /// Input record was not a JSON object
    #[error("Record {0} is not a JSON object")]
    NotAnObject(usize),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Physical kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Timestamp,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Integer => write!(f, "integer"),
            ColumnKind::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// Cell storage for one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Integer(Vec<Option<i64>>),
    Timestamp(Vec<Option<DateTime<Utc>>>),
}

impl ColumnData {
    /// Number of cells in the column
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Integer(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    /// Check if the column has no cells
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical kind of the column
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Integer(_) => ColumnKind::Integer,
            ColumnData::Timestamp(_) => ColumnKind::Timestamp,
        }
    }

    /// Create an all-null column of the given kind
    pub fn nulls(kind: ColumnKind, len: usize) -> Self {
        match kind {
            ColumnKind::Text => ColumnData::Text(vec![None; len]),
            ColumnKind::Integer => ColumnData::Integer(vec![None; len]),
            ColumnKind::Timestamp => ColumnData::Timestamp(vec![None; len]),
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Why a cell could not be read as the requested type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
pub enum CellError {
    #[error("column is missing")]
    MissingColumn,
    #[error("value is null")]
    Null,
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: ColumnKind,
        found: ColumnKind,
    },
    #[error("row is out of bounds")]
    OutOfBounds,
    #[error("value is outside the storable range")]
    OutOfRange,
}

/// Rust types that can be read out of a column
pub trait CellValue: Sized {
    const KIND: ColumnKind;

    fn cells(data: &ColumnData) -> Option<&[Option<Self>]>;
}

impl CellValue for String {
    const KIND: ColumnKind = ColumnKind::Text;

    fn cells(data: &ColumnData) -> Option<&[Option<Self>]> {
        match data {
            ColumnData::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl CellValue for i64 {
    const KIND: ColumnKind = ColumnKind::Integer;

    fn cells(data: &ColumnData) -> Option<&[Option<Self>]> {
        match data {
            ColumnData::Integer(v) => Some(v),
            _ => None,
        }
    }
}

impl CellValue for DateTime<Utc> {
    const KIND: ColumnKind = ColumnKind::Timestamp;

    fn cells(data: &ColumnData) -> Option<&[Option<Self>]> {
        match data {
            ColumnData::Timestamp(v) => Some(v),
            _ => None,
        }
    }
}

/// Typed, borrowed view over one column
///
/// Resolving the column once and then indexing rows keeps the per-row cost
/// to a bounds check and an `Option` match.
#[derive(Debug)]
pub enum ColumnView<'a, T> {
    Present(&'a [Option<T>]),
    Missing,
    Mismatched(ColumnKind),
}

impl<T> Clone for ColumnView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ColumnView<'_, T> {}

impl<'a, T: CellValue> ColumnView<'a, T> {
    /// Read the cell at `row`
    pub fn get(&self, row: usize) -> Result<&'a T, CellError> {
        match *self {
            ColumnView::Present(cells) => match cells.get(row) {
                Some(Some(value)) => Ok(value),
                Some(None) => Err(CellError::Null),
                None => Err(CellError::OutOfBounds),
            },
            ColumnView::Missing => Err(CellError::MissingColumn),
            ColumnView::Mismatched(found) => Err(CellError::TypeMismatch {
                expected: T::KIND,
                found,
            }),
        }
    }

    /// Read the cell at `row`, treating any failure as absent
    pub fn value(&self, row: usize) -> Option<&'a T> {
        self.get(row).ok()
    }

    /// Check if the view is backed by a column of the right type
    pub fn is_present(&self) -> bool {
        matches!(self, ColumnView::Present(_))
    }
}

/// Column-oriented table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    row_count: usize,
}

impl DataFrame {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column
    ///
    /// The first column fixes the row count; later columns must match it.
    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> DatasetResult<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(DatasetError::DuplicateColumn(name));
        }
        if !self.columns.is_empty() && data.len() != self.row_count {
            return Err(DatasetError::LengthMismatch {
                column: name,
                expected: self.row_count,
                found: data.len(),
            });
        }

        self.row_count = data.len();
        self.index.insert(name.clone(), self.columns.len());
        self.columns.push(Column { name, data });
        Ok(())
    }

    /// Builder-style variant of [`DataFrame::push_column`]
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> DatasetResult<Self> {
        self.push_column(name, data)?;
        Ok(self)
    }

    /// Total number of rows
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Check if the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Column names in insertion order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Look up a column by name
    pub fn raw_column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    /// Typed view over a column
    pub fn column<T: CellValue>(&self, name: &str) -> ColumnView<'_, T> {
        match self.raw_column(name) {
            Some(column) => match T::cells(&column.data) {
                Some(cells) => ColumnView::Present(cells),
                None => ColumnView::Mismatched(column.data.kind()),
            },
            None => ColumnView::Missing,
        }
    }

    /// Distinct non-null values of a text column, in first-seen order
    pub fn distinct_text(&self, name: &str) -> Vec<&str> {
        let ColumnView::Present(cells) = self.column::<String>(name) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        cells
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|value| seen.insert(*value))
            .collect()
    }
}
