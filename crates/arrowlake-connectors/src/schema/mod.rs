//! Logical schema inference for relational result sets.
//!
//! - **Type mapper** ([`mapper`]): source catalog type names to the closed
//!   [`LogicalType`] set
//! - **Schema types** ([`types`]): [`LogicalField`], [`LogicalSchema`] and
//!   the [`ColumnMeta`] a cursor reports
//! - **Errors** ([`error`]): [`SchemaError`]
//!
//! # Flow
//!
//! ```text
//! RowCursor::columns() -> [ColumnMeta]
//!   └── LogicalSchema::infer()
//!         └── map_source_type() per column  -> LogicalField
//!   └── LogicalSchema::to_arrow()           -> arrow SchemaRef
//! ```

pub mod error;
pub mod mapper;
pub mod types;

// ── Re-exports for convenience ─────────────────────────────────────

pub use error::{SchemaError, SchemaResult};
pub use mapper::map_source_type;
pub use types::{ColumnMeta, LogicalField, LogicalSchema, LogicalType};
