//! Logical schema types shared by the builders and the materializer.
//!
//! - [`LogicalType`]: the closed set of column kinds the core understands
//! - [`LogicalField`]: name, logical type and nullability of one column
//! - [`LogicalSchema`]: ordered, name-unique list of fields
//! - [`ColumnMeta`]: column name and type name as reported by a cursor

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};

use super::error::{SchemaError, SchemaResult};
use super::mapper::map_source_type;

/// Column data kinds supported by the materialization core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit IEEE float.
    Float32,
    /// 64-bit IEEE float.
    Float64,
    /// UTF-8 string.
    Utf8,
    /// Boolean.
    Boolean,
    /// Microseconds since the Unix epoch, no time zone.
    Timestamp,
}

impl LogicalType {
    /// Returns the Arrow type that columns of this logical type are built as.
    #[must_use]
    pub fn to_arrow(self) -> DataType {
        match self {
            Self::Int32 => DataType::Int32,
            Self::Int64 => DataType::Int64,
            Self::Float32 => DataType::Float32,
            Self::Float64 => DataType::Float64,
            Self::Utf8 => DataType::Utf8,
            Self::Boolean => DataType::Boolean,
            Self::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    /// Lowercase name used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Utf8 => "string",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One column of a [`LogicalSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalField {
    name: String,
    logical_type: LogicalType,
    nullable: bool,
}

impl LogicalField {
    /// Creates a field.
    pub fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field logical type.
    #[must_use]
    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    /// Whether nulls may be appended for this field.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Converts to an Arrow field.
    #[must_use]
    pub fn to_arrow(&self) -> Field {
        Field::new(&self.name, self.logical_type.to_arrow(), self.nullable)
    }
}

/// Ordered list of fields whose positions match a cursor's columns.
///
/// Names are unique; construction rejects duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalSchema {
    fields: Vec<LogicalField>,
}

impl LogicalSchema {
    /// Creates a schema, rejecting duplicate field names.
    pub fn try_new(fields: Vec<LogicalField>) -> SchemaResult<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Infers a schema from cursor column metadata via the type mapper.
    ///
    /// Stops at the first column whose type name is not supported.
    pub fn infer(columns: &[ColumnMeta]) -> SchemaResult<Self> {
        let fields = columns
            .iter()
            .map(|col| -> SchemaResult<LogicalField> {
                let (logical_type, nullable) =
                    map_source_type(&col.type_name).map_err(|e| e.for_column(&col.name))?;
                Ok(LogicalField::new(col.name.clone(), logical_type, nullable))
            })
            .collect::<SchemaResult<Vec<_>>>()?;
        Self::try_new(fields)
    }

    /// Fields in positional order.
    #[must_use]
    pub fn fields(&self) -> &[LogicalField] {
        &self.fields
    }

    /// Field at `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&LogicalField> {
        self.fields.get(index)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the schema has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Converts to an Arrow schema.
    #[must_use]
    pub fn to_arrow(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.fields
                .iter()
                .map(LogicalField::to_arrow)
                .collect::<Vec<_>>(),
        ))
    }
}

/// Column metadata as reported by a result cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name.
    pub name: String,
    /// Type name in the source system's spelling (e.g. `"INTEGER"`, `"int4"`).
    pub type_name: String,
}

impl ColumnMeta {
    /// Creates column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}
