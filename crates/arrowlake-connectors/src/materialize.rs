//! Row materialization: drives a [`RowCursor`] into one Arrow `RecordBatch`.
//!
//! # Algorithm
//!
//! 1. Check that the cursor reports one column per schema field.
//! 2. Allocate a [`ColumnBuilderSet`] sized by [`MaterializeOptions::capacity`].
//! 3. For each row, narrow every cell to its field's logical type. The whole
//!    row is narrowed before any builder is touched, so a rejected row never
//!    leaves a partial append behind.
//! 4. Append the narrowed cells in field order.
//! 5. On exhaustion, finish every builder and assemble the batch.
//!
//! Rejected rows (decode failures and unsupported values) either abort the
//! pass or are skipped, depending on [`RowErrorPolicy`]. Cursor fetch
//! failures and builder faults always abort.

use std::sync::atomic::{AtomicU64, Ordering};

use arrow_array::{RecordBatch, RecordBatchOptions};
use arrow_schema::ArrowError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::{BuilderError, ColumnBuilderSet};
use crate::cell::CellValue;
use crate::cursor::{CursorError, RowCursor};
use crate::schema::{LogicalSchema, LogicalType, SchemaError};

/// Default number of rows builders are pre-sized for.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Result alias for materialization.
pub type MaterializeResult<T> = Result<T, MaterializeError>;

/// Errors raised while materializing a cursor.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// Schema inference failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The cursor and the schema disagree on the number of columns.
    #[error("cursor reports {cursor} columns but schema has {schema} fields")]
    ColumnCountMismatch {
        /// Columns reported by the cursor.
        cursor: usize,
        /// Fields in the schema.
        schema: usize,
    },

    /// The cursor could not fetch the next row.
    #[error("cursor failed at row {row}: {source}")]
    Cursor {
        /// Zero-based row ordinal.
        row: usize,
        /// Underlying cursor error.
        #[source]
        source: CursorError,
    },

    /// A cell of a row could not be decoded.
    #[error("row {row}: cannot decode column {column}: {message}")]
    RowDecode {
        /// Zero-based row ordinal.
        row: usize,
        /// Zero-based column position.
        column: usize,
        /// Driver message.
        message: String,
    },

    /// A value cannot be represented in its field's logical type.
    #[error("row {row}: field '{field}' expects {expected}, got {actual}")]
    UnsupportedValue {
        /// Zero-based row ordinal.
        row: usize,
        /// Field name.
        field: String,
        /// Logical type of the field.
        expected: LogicalType,
        /// Kind of the rejected value.
        actual: &'static str,
    },

    /// A builder rejected an append.
    #[error("row {row}: {source}")]
    Builder {
        /// Zero-based row ordinal.
        row: usize,
        /// Underlying builder error.
        #[source]
        source: BuilderError,
    },

    /// Batch assembly failed.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl MaterializeError {
    /// Returns `true` for errors that [`RowErrorPolicy::SkipRow`] may skip.
    #[must_use]
    pub fn is_row_rejection(&self) -> bool {
        matches!(self, Self::RowDecode { .. } | Self::UnsupportedValue { .. })
    }
}

/// What to do with a row that cannot be decoded or narrowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorPolicy {
    /// Abort the pass with the row's error.
    #[default]
    Fail,
    /// Log and count the row, then continue with the next one.
    SkipRow,
}

/// Options for a materialization pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializeOptions {
    /// Rows each builder is pre-sized for.
    pub capacity: usize,
    /// Handling of rejected rows.
    pub on_error: RowErrorPolicy,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            on_error: RowErrorPolicy::Fail,
        }
    }
}

/// Materializes cursors into record batches.
pub struct RowMaterializer {
    options: MaterializeOptions,
    /// Rows skipped under [`RowErrorPolicy::SkipRow`] across all passes.
    skipped_rows: AtomicU64,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for RowMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowMaterializer")
            .field("options", &self.options)
            .field("skipped_rows", &self.skipped_rows())
            .finish()
    }
}

impl Default for RowMaterializer {
    fn default() -> Self {
        Self::with_options(MaterializeOptions::default())
    }
}

impl RowMaterializer {
    /// Creates a materializer with the given options.
    #[must_use]
    pub fn with_options(options: MaterializeOptions) -> Self {
        Self {
            options,
            skipped_rows: AtomicU64::new(0),
        }
    }

    /// Options in effect.
    #[must_use]
    pub fn options(&self) -> &MaterializeOptions {
        &self.options
    }

    /// Cumulative count of skipped rows.
    #[must_use]
    pub fn skipped_rows(&self) -> u64 {
        self.skipped_rows.load(Ordering::Relaxed)
    }

    /// Infers the schema from the cursor's metadata, then materializes it.
    pub fn materialize_inferred(
        &self,
        cursor: &mut dyn RowCursor,
    ) -> MaterializeResult<RecordBatch> {
        let schema = LogicalSchema::infer(cursor.columns())?;
        self.materialize(cursor, &schema)
    }

    /// Consumes `cursor` into a batch shaped by `schema`.
    ///
    /// Field `i` of `schema` receives column `i` of the cursor.
    pub fn materialize(
        &self,
        cursor: &mut dyn RowCursor,
        schema: &LogicalSchema,
    ) -> MaterializeResult<RecordBatch> {
        let cursor_columns = cursor.columns().len();
        if cursor_columns != schema.len() {
            return Err(MaterializeError::ColumnCountMismatch {
                cursor: cursor_columns,
                schema: schema.len(),
            });
        }

        let mut builders = ColumnBuilderSet::new(schema, self.options.capacity);
        let mut cells = Vec::with_capacity(schema.len());
        let mut row = 0usize;
        let mut appended = 0usize;
        let mut skipped = 0usize;

        loop {
            let rejection = match cursor.read_row(&mut cells) {
                Ok(false) => break,
                Ok(true) => narrow_row(schema, &mut cells, row).err(),
                Err(CursorError::Decode { column, message }) => {
                    Some(MaterializeError::RowDecode {
                        row,
                        column,
                        message,
                    })
                }
                Err(source @ CursorError::Fetch(_)) => {
                    return Err(MaterializeError::Cursor { row, source });
                }
            };

            if let Some(err) = rejection {
                self.reject(err)?;
                skipped += 1;
            } else {
                for (idx, cell) in cells.drain(..).enumerate() {
                    builders
                        .append(idx, cell)
                        .map_err(|source| MaterializeError::Builder { row, source })?;
                }
                appended += 1;
            }
            row += 1;
        }

        let batch = RecordBatch::try_new_with_options(
            schema.to_arrow(),
            builders.finish(),
            &RecordBatchOptions::new().with_row_count(Some(appended)),
        )?;

        tracing::debug!(
            rows = appended,
            skipped,
            columns = schema.len(),
            "materialized record batch"
        );
        Ok(batch)
    }

    fn reject(&self, err: MaterializeError) -> MaterializeResult<()> {
        match self.options.on_error {
            RowErrorPolicy::Fail => Err(err),
            RowErrorPolicy::SkipRow => {
                tracing::warn!(error = %err, "skipping row");
                self.skipped_rows.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }
}

/// Narrows every cell of a row in place.
fn narrow_row(
    schema: &LogicalSchema,
    cells: &mut [CellValue],
    row: usize,
) -> MaterializeResult<()> {
    if cells.len() != schema.len() {
        return Err(MaterializeError::RowDecode {
            row,
            column: cells.len().min(schema.len()),
            message: format!("row has {} cells, expected {}", cells.len(), schema.len()),
        });
    }
    for (cell, field) in cells.iter_mut().zip(schema.fields()) {
        let value = std::mem::replace(cell, CellValue::Null);
        match value.narrow_to(field.logical_type()) {
            Ok(narrowed) => *cell = narrowed,
            Err(rejected) => {
                return Err(MaterializeError::UnsupportedValue {
                    row,
                    field: field.name().to_string(),
                    expected: field.logical_type(),
                    actual: rejected.kind_name(),
                })
            }
        }
    }
    Ok(())
}

/// Materializes `cursor` with default options.
pub fn materialize(
    cursor: &mut dyn RowCursor,
    schema: &LogicalSchema,
) -> MaterializeResult<RecordBatch> {
    RowMaterializer::default().materialize(cursor, schema)
}
