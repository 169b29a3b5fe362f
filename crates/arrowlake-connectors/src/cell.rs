//! Decoded cell values.
//!
//! Cursor adapters decode every cell into a [`CellValue`] so that the
//! materializer dispatches on a closed tag set instead of inspecting
//! driver-specific types.

use crate::schema::LogicalType;

/// One decoded cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// SQL NULL.
    Null,
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
    /// Boolean.
    Boolean(bool),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
}

impl CellValue {
    /// Returns `true` for [`CellValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the variant, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Utf8(_) => "string",
            Self::Boolean(_) => "boolean",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Logical type carried by the value, `None` for null.
    #[must_use]
    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            Self::Null => None,
            Self::Int32(_) => Some(LogicalType::Int32),
            Self::Int64(_) => Some(LogicalType::Int64),
            Self::Float32(_) => Some(LogicalType::Float32),
            Self::Float64(_) => Some(LogicalType::Float64),
            Self::Utf8(_) => Some(LogicalType::Utf8),
            Self::Boolean(_) => Some(LogicalType::Boolean),
            Self::Timestamp(_) => Some(LogicalType::Timestamp),
        }
    }

    /// Narrows the value to `target`.
    ///
    /// Null narrows to every type. Besides exact matches only the lossless
    /// widenings int32 → int64 and float32 → float64 are accepted.
    ///
    /// # Errors
    ///
    /// Returns the value unchanged when it cannot represent `target`.
    pub fn narrow_to(self, target: LogicalType) -> Result<Self, Self> {
        match (self, target) {
            (Self::Null, _) => Ok(Self::Null),
            (Self::Int32(v), LogicalType::Int64) => Ok(Self::Int64(i64::from(v))),
            (Self::Float32(v), LogicalType::Float64) => Ok(Self::Float64(f64::from(v))),
            (value, target) if value.logical_type() == Some(target) => Ok(value),
            (value, _) => Err(value),
        }
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f32> for CellValue {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::Utf8(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_string())
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
