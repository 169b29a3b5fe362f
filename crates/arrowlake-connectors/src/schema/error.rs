//! Schema error types.
//!
//! Provides [`SchemaError`] for type mapping and schema inference, plus a
//! convenience [`SchemaResult`] alias.

use thiserror::Error;

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while inferring a logical schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The source reported a type name the type mapper does not understand.
    #[error("unsupported type '{type_name}'{}", column_suffix(.column))]
    UnsupportedType {
        /// Column that carried the type, when known.
        column: Option<String>,
        /// Type name as reported by the source catalog.
        type_name: String,
    },

    /// Two fields in one schema share a name.
    #[error("duplicate field name '{0}'")]
    DuplicateField(String),

    /// An Arrow error propagated from schema operations.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
}

impl SchemaError {
    /// Creates an [`SchemaError::UnsupportedType`] without column context.
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            column: None,
            type_name: type_name.into(),
        }
    }

    /// Attaches the column name to an [`SchemaError::UnsupportedType`].
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn for_column(self, name: &str) -> Self {
        match self {
            Self::UnsupportedType { type_name, .. } => Self::UnsupportedType {
                column: Some(name.to_string()),
                type_name,
            },
            other => other,
        }
    }
}

fn column_suffix(column: &Option<String>) -> String {
    column
        .as_ref()
        .map(|c| format!(" for column '{c}'"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_display_without_column() {
        let err = SchemaError::unsupported("HUGEINT");
        assert_eq!(err.to_string(), "unsupported type 'HUGEINT'");
    }

    #[test]
    fn test_unsupported_display_with_column() {
        let err = SchemaError::unsupported("INTERVAL").for_column("elapsed");
        assert_eq!(
            err.to_string(),
            "unsupported type 'INTERVAL' for column 'elapsed'"
        );
    }

    #[test]
    fn test_for_column_leaves_other_variants() {
        let err = SchemaError::DuplicateField("id".into()).for_column("x");
        assert!(matches!(err, SchemaError::DuplicateField(ref n) if n == "id"));
    }

    #[test]
    fn test_schema_error_from_arrow() {
        let arrow_err = arrow_schema::ArrowError::SchemaError("bad schema".into());
        let se: SchemaError = arrow_err.into();
        assert!(matches!(se, SchemaError::Arrow(_)));
        assert!(se.to_string().contains("bad schema"));
    }
}
