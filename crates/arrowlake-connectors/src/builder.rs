//! Column builders for one materialization pass.
//!
//! One [`ColumnBuilder`] implementation exists per [`LogicalType`]. The
//! implementation is picked once when a [`ColumnBuilderSet`] is allocated
//! from a schema, so appends never re-dispatch on the field type. Each
//! builder wraps an Arrow builder whose buffers grow geometrically, which
//! keeps appends amortized O(1).

use std::sync::Arc;

use arrow_array::builder::{
    ArrayBuilder, BooleanBuilder, Float32Builder, Float64Builder, Int32Builder, Int64Builder,
    StringBuilder, TimestampMicrosecondBuilder,
};
use arrow_array::ArrayRef;
use thiserror::Error;

use crate::cell::CellValue;
use crate::schema::{LogicalField, LogicalSchema, LogicalType};

/// Average string length used to pre-size string value buffers.
const STRING_BYTES_PER_ROW: usize = 16;

/// Result alias for builder operations.
pub type BuilderResult<T> = Result<T, BuilderError>;

/// Contract violations raised while appending to a builder.
///
/// These indicate a bug in the caller and are never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuilderError {
    /// The value's type does not match the field's logical type.
    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Logical type of the field.
        expected: LogicalType,
        /// Kind of the rejected value.
        actual: &'static str,
    },

    /// A null was appended to a non-nullable field.
    #[error("null constraint violation for field '{field}'")]
    NullConstraint {
        /// Field name.
        field: String,
    },

    /// The field index is outside the schema.
    #[error("field index {index} out of range for {len} builders")]
    UnknownField {
        /// Requested index.
        index: usize,
        /// Number of builders in the set.
        len: usize,
    },
}

/// Append-only accumulator for one column.
pub trait ColumnBuilder: Send {
    /// Name of the field this builder fills.
    fn field_name(&self) -> &str;

    /// Logical type accepted by [`append_value`](Self::append_value).
    fn logical_type(&self) -> LogicalType;

    /// Number of values (including nulls) appended so far.
    fn len(&self) -> usize;

    /// Returns `true` if nothing has been appended yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a value. [`CellValue::Null`] is forwarded to
    /// [`append_null`](Self::append_null).
    fn append_value(&mut self, value: CellValue) -> BuilderResult<()>;

    /// Appends a null.
    fn append_null(&mut self) -> BuilderResult<()>;

    /// Consumes the builder and returns the finished array.
    fn finish(self: Box<Self>) -> ArrayRef;
}

macro_rules! typed_column_builder {
    (
        $(#[$doc:meta])*
        $name:ident, $inner:ty, $variant:ident, $logical:ident, |$cap:ident| $with_capacity:expr
    ) => {
        $(#[$doc])*
        pub struct $name {
            field: String,
            nullable: bool,
            inner: $inner,
        }

        impl $name {
            /// Creates a builder sized for `capacity` rows.
            #[must_use]
            pub fn with_capacity(field: &LogicalField, $cap: usize) -> Self {
                Self {
                    field: field.name().to_string(),
                    nullable: field.is_nullable(),
                    inner: $with_capacity,
                }
            }
        }

        impl ColumnBuilder for $name {
            fn field_name(&self) -> &str {
                &self.field
            }

            fn logical_type(&self) -> LogicalType {
                LogicalType::$logical
            }

            fn len(&self) -> usize {
                ArrayBuilder::len(&self.inner)
            }

            fn append_value(&mut self, value: CellValue) -> BuilderResult<()> {
                match value {
                    CellValue::$variant(v) => {
                        self.inner.append_value(v);
                        Ok(())
                    }
                    CellValue::Null => self.append_null(),
                    other => Err(BuilderError::TypeMismatch {
                        field: self.field.clone(),
                        expected: LogicalType::$logical,
                        actual: other.kind_name(),
                    }),
                }
            }

            fn append_null(&mut self) -> BuilderResult<()> {
                if !self.nullable {
                    return Err(BuilderError::NullConstraint {
                        field: self.field.clone(),
                    });
                }
                self.inner.append_null();
                Ok(())
            }

            fn finish(self: Box<Self>) -> ArrayRef {
                let mut inner = self.inner;
                Arc::new(inner.finish())
            }
        }
    };
}

typed_column_builder!(
    /// Builder for [`LogicalType::Int32`] fields.
    Int32Column, Int32Builder, Int32, Int32, |cap| Int32Builder::with_capacity(cap)
);
typed_column_builder!(
    /// Builder for [`LogicalType::Int64`] fields.
    Int64Column, Int64Builder, Int64, Int64, |cap| Int64Builder::with_capacity(cap)
);
typed_column_builder!(
    /// Builder for [`LogicalType::Float32`] fields.
    Float32Column, Float32Builder, Float32, Float32, |cap| Float32Builder::with_capacity(cap)
);
typed_column_builder!(
    /// Builder for [`LogicalType::Float64`] fields.
    Float64Column, Float64Builder, Float64, Float64, |cap| Float64Builder::with_capacity(cap)
);
typed_column_builder!(
    /// Builder for [`LogicalType::Utf8`] fields.
    Utf8Column, StringBuilder, Utf8, Utf8,
    |cap| StringBuilder::with_capacity(cap, cap * STRING_BYTES_PER_ROW)
);
typed_column_builder!(
    /// Builder for [`LogicalType::Boolean`] fields.
    BooleanColumn, BooleanBuilder, Boolean, Boolean, |cap| BooleanBuilder::with_capacity(cap)
);
typed_column_builder!(
    /// Builder for [`LogicalType::Timestamp`] fields.
    TimestampColumn, TimestampMicrosecondBuilder, Timestamp, Timestamp,
    |cap| TimestampMicrosecondBuilder::with_capacity(cap)
);

/// Allocates the builder implementation matching `field`'s logical type.
#[must_use]
pub fn new_column_builder(field: &LogicalField, capacity: usize) -> Box<dyn ColumnBuilder> {
    match field.logical_type() {
        LogicalType::Int32 => Box::new(Int32Column::with_capacity(field, capacity)),
        LogicalType::Int64 => Box::new(Int64Column::with_capacity(field, capacity)),
        LogicalType::Float32 => Box::new(Float32Column::with_capacity(field, capacity)),
        LogicalType::Float64 => Box::new(Float64Column::with_capacity(field, capacity)),
        LogicalType::Utf8 => Box::new(Utf8Column::with_capacity(field, capacity)),
        LogicalType::Boolean => Box::new(BooleanColumn::with_capacity(field, capacity)),
        LogicalType::Timestamp => Box::new(TimestampColumn::with_capacity(field, capacity)),
    }
}

/// One builder per schema field, in field order.
pub struct ColumnBuilderSet {
    builders: Vec<Box<dyn ColumnBuilder>>,
}

impl std::fmt::Debug for ColumnBuilderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.builders
                    .iter()
                    .map(|b| (b.field_name(), b.logical_type(), b.len())),
            )
            .finish()
    }
}

impl ColumnBuilderSet {
    /// Allocates one builder per field of `schema`.
    #[must_use]
    pub fn new(schema: &LogicalSchema, capacity: usize) -> Self {
        Self {
            builders: schema
                .fields()
                .iter()
                .map(|field| new_column_builder(field, capacity))
                .collect(),
        }
    }

    /// Number of builders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    /// Returns `true` if the set has no builders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Builder for the field at `index`.
    #[must_use]
    pub fn builder(&self, index: usize) -> Option<&dyn ColumnBuilder> {
        self.builders.get(index).map(AsRef::as_ref)
    }

    /// Appends `value` (or a null) to the field at `index`.
    pub fn append(&mut self, index: usize, value: CellValue) -> BuilderResult<()> {
        let len = self.builders.len();
        let builder = self
            .builders
            .get_mut(index)
            .ok_or(BuilderError::UnknownField { index, len })?;
        builder.append_value(value)
    }

    /// Appends a null to the field at `index`.
    pub fn append_null(&mut self, index: usize) -> BuilderResult<()> {
        let len = self.builders.len();
        let builder = self
            .builders
            .get_mut(index)
            .ok_or(BuilderError::UnknownField { index, len })?;
        builder.append_null()
    }

    /// Finishes every builder in field order.
    #[must_use]
    pub fn finish(self) -> Vec<ArrayRef> {
        self.builders.into_iter().map(ColumnBuilder::finish).collect()
    }
}
