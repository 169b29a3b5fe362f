//! # `ArrowLake` Connectors
//!
//! Driver-agnostic materialization of relational result sets into Arrow.
//!
//! A [`RowCursor`] reports column metadata and yields decoded rows. The
//! [`schema`] module infers a [`LogicalSchema`] from that metadata, and the
//! [`RowMaterializer`] pushes every row through a [`ColumnBuilderSet`] to
//! produce one `RecordBatch`.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

/// Column builders, one per logical type
pub mod builder;

/// Decoded cell values
pub mod cell;

/// Result cursor abstraction
pub mod cursor;

/// Cursor to record batch materialization
pub mod materialize;

/// Schema inference and the type mapper
pub mod schema;

/// `PostgreSQL` result cursor
#[cfg(feature = "postgres")]
pub mod postgres;

pub use builder::{BuilderError, ColumnBuilder, ColumnBuilderSet};
pub use cell::CellValue;
pub use cursor::{CursorError, RowCursor, RowsCursor};
pub use materialize::{
    materialize, MaterializeError, MaterializeOptions, MaterializeResult, RowErrorPolicy,
    RowMaterializer,
};
pub use schema::{
    map_source_type, ColumnMeta, LogicalField, LogicalSchema, LogicalType, SchemaError,
};
