//! Forward-only result cursors.
//!
//! A [`RowCursor`] reports its column metadata up front and then yields
//! rows one at a time as decoded [`CellValue`]s. Driver adapters live next
//! to their drivers (`arrowlake-db` for DuckDB, [`crate::postgres`] for
//! `tokio-postgres`); [`RowsCursor`] serves pre-fetched rows.

use std::vec;

use thiserror::Error;

use crate::cell::CellValue;
use crate::schema::ColumnMeta;

/// Failures surfaced by a cursor while reading.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CursorError {
    /// The next row could not be fetched. The cursor is unusable afterwards.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A cell of the current row could not be decoded. The row has been
    /// consumed and the cursor can continue with the next one.
    #[error("cannot decode column {column}: {message}")]
    Decode {
        /// Zero-based column position.
        column: usize,
        /// Driver message.
        message: String,
    },
}

impl CursorError {
    /// Returns `true` if the cursor can keep reading after this error.
    #[must_use]
    pub fn is_row_local(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Forward-only, single-pass row source.
pub trait RowCursor {
    /// Column metadata, in positional order.
    fn columns(&self) -> &[ColumnMeta];

    /// Decodes the next row into `cells`.
    ///
    /// `cells` is cleared first. Returns `Ok(false)` once the cursor is
    /// exhausted. On success `cells` holds exactly one value per column.
    fn read_row(&mut self, cells: &mut Vec<CellValue>) -> Result<bool, CursorError>;
}

/// Cursor over rows that are already in memory.
#[derive(Debug)]
pub struct RowsCursor {
    columns: Vec<ColumnMeta>,
    rows: vec::IntoIter<Result<Vec<CellValue>, CursorError>>,
}

impl RowsCursor {
    /// Creates a cursor over decoded rows.
    #[must_use]
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<CellValue>>) -> Self {
        Self::from_results(columns, rows.into_iter().map(Ok).collect())
    }

    /// Creates a cursor whose rows may carry a read failure in place.
    #[must_use]
    pub fn from_results(
        columns: Vec<ColumnMeta>,
        rows: Vec<Result<Vec<CellValue>, CursorError>>,
    ) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }

    /// Rows not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowCursor for RowsCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn read_row(&mut self, cells: &mut Vec<CellValue>) -> Result<bool, CursorError> {
        cells.clear();
        let Some(row) = self.rows.next() else {
            return Ok(false);
        };
        let row = row?;
        if row.len() != self.columns.len() {
            return Err(CursorError::Decode {
                column: row.len().min(self.columns.len()),
                message: format!(
                    "row has {} cells, expected {}",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        cells.extend(row);
        Ok(true)
    }
}
