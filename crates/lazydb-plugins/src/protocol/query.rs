//! Boundary-safe query results.
//!
//! A [`QueryResult`] is the only payload that carries backend data across
//! the process boundary. Cell values are restricted to the [`CellValue`]
//! scalars; temporal, UUID, and binary values must be encoded to text by the
//! plugin before they are stored.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row: column name to cell value.
pub type Row = BTreeMap<String, CellValue>;

/// A dynamically typed scalar cell.
///
/// Serialised untagged, so a cell appears on the wire as the plain JSON
/// scalar.
///
/// # Example
///
/// ```
/// use lazydb_plugins::CellValue;
///
/// assert_eq!(serde_json::to_string(&CellValue::from(7_i64)).unwrap(), "7");
/// assert_eq!(serde_json::to_string(&CellValue::Null).unwrap(), "null");
/// assert_eq!(CellValue::from(f64::NAN), CellValue::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// SQL `NULL`.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integral number.
    Integer(i64),
    /// Finite floating-point number.
    Float(f64),
    /// Text, including pre-encoded temporal, UUID, and binary values.
    Text(String),
}

impl CellValue {
    /// Returns `true` for [`CellValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text content, if this is a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Self::Float(value)
        } else {
            Self::Null
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl<T: Into<Self>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Violations of the one-key-per-column row invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// A positional row had the wrong number of values.
    #[error("row {row} has {actual} values for {expected} columns")]
    WidthMismatch {
        /// Zero-based row index.
        row: usize,
        /// Number of columns.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
    /// A row lacks a key for one of the columns.
    #[error("row {row} is missing column '{column}'")]
    MissingColumn {
        /// Zero-based row index.
        row: usize,
        /// Column without a value.
        column: String,
    },
    /// A row has a key that is not a column.
    #[error("row {row} has unknown column '{column}'")]
    UnknownColumn {
        /// Zero-based row index.
        row: usize,
        /// Key not present in the column list.
        column: String,
    },
}

/// Columns and rows produced by one `Run` call.
///
/// Column order is the result-set order. Every row holds exactly one entry
/// per distinct column name, `Null` included. When the backend returns the
/// same column name twice, the later value wins, matching what a keyed row
/// can represent.
///
/// # Example
///
/// ```
/// use lazydb_plugins::{CellValue, QueryResult};
///
/// let mut result = QueryResult::new(vec!["id".into(), "note".into()]);
/// result.push_row(vec![CellValue::from(1_i64), CellValue::Null]).unwrap();
///
/// assert_eq!(result.row_count(), 1);
/// assert!(result.rows()[0]["note"].is_null());
/// assert!(result.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl QueryResult {
    /// Creates an empty result with the given column order.
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Creates a one-column, one-row result.
    #[must_use]
    pub fn single(column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        let column = column.into();
        let mut row = Row::new();
        row.insert(column.clone(), value.into());
        Self {
            columns: vec![column],
            rows: vec![row],
        }
    }

    /// Builds a result from keyed rows, filling absent cells with `Null`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::UnknownColumn`] when a row carries a key that
    /// is not one of `columns`.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, ShapeError> {
        let known: BTreeSet<&str> = columns.iter().map(String::as_str).collect();
        let mut filled = Vec::with_capacity(rows.len());
        for (index, mut row) in rows.into_iter().enumerate() {
            if let Some(stray) = row.keys().find(|key| !known.contains(key.as_str())) {
                return Err(ShapeError::UnknownColumn {
                    row: index,
                    column: stray.clone(),
                });
            }
            for column in &known {
                row.entry((*column).to_owned()).or_default();
            }
            filled.push(row);
        }
        Ok(Self {
            columns,
            rows: filled,
        })
    }

    /// Appends a row given positionally in column order.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::WidthMismatch`] when `values` does not have one
    /// entry per column.
    pub fn push_row(&mut self, values: Vec<CellValue>) -> Result<(), ShapeError> {
        if values.len() != self.columns.len() {
            return Err(ShapeError::WidthMismatch {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        let row = self.columns.iter().cloned().zip(values).collect();
        self.rows.push(row);
        Ok(())
    }

    /// Checks that every row holds exactly the column key set.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ShapeError> {
        let known: BTreeSet<&str> = self.columns.iter().map(String::as_str).collect();
        for (index, row) in self.rows.iter().enumerate() {
            if let Some(stray) = row.keys().find(|key| !known.contains(key.as_str())) {
                return Err(ShapeError::UnknownColumn {
                    row: index,
                    column: stray.clone(),
                });
            }
            if let Some(missing) = known.iter().find(|column| !row.contains_key(**column)) {
                return Err(ShapeError::MissingColumn {
                    row: index,
                    column: (*missing).to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Returns the column names in result-set order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows in result-set order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub const fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the number of rows.
    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the result has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
