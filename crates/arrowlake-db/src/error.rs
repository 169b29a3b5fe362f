//! Error types for the `ArrowLake` federation facade.

use std::time::Duration;

use arrowlake_connectors::{MaterializeError, SchemaError};

/// Errors from engine, registrar and join operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Configuration validation error
    Config(String),

    /// A file-backed source could not be registered
    AttachFile {
        /// Logical source name.
        source_name: String,
        /// File locator.
        path: String,
        /// Reason reported by the file check or the engine.
        reason: String,
    },

    /// A remote database could not be attached
    AttachRemote {
        /// Logical source name.
        source_name: String,
        /// Reason reported by the engine.
        reason: String,
    },

    /// An engine extension could not be installed or loaded
    ExtensionLoad {
        /// Extension name.
        extension: String,
        /// Reason reported by the engine.
        reason: String,
    },

    /// Query execution failed
    Query {
        /// Statement text.
        sql: String,
        /// Engine error.
        #[source]
        source: duckdb::Error,
    },

    /// Result metadata could not be mapped to a logical schema
    Schema(#[from] SchemaError),

    /// Rows could not be materialized
    Materialize(#[from] MaterializeError),

    /// Engine open, configuration or close error
    Engine(#[from] duckdb::Error),

    /// The operation did not finish in time
    Timeout(Duration),

    /// The background task running the operation was cancelled
    Cancelled(String),
}

impl DbError {
    pub(crate) fn query(sql: impl Into<String>, source: duckdb::Error) -> Self {
        Self::Query {
            sql: sql.into(),
            source,
        }
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Config error: {msg}"),
            Self::AttachFile {
                source_name,
                path,
                reason,
            } => write!(
                f,
                "Cannot attach file source '{source_name}' from '{path}': {reason}"
            ),
            Self::AttachRemote {
                source_name,
                reason,
            } => write!(f, "Cannot attach remote source '{source_name}': {reason}"),
            Self::ExtensionLoad { extension, reason } => {
                write!(f, "Cannot load extension '{extension}': {reason}")
            }
            Self::Query { sql, source } => write!(f, "Query error: {source} (sql: {sql})"),
            Self::Schema(e) => write!(f, "Schema error: {e}"),
            Self::Materialize(e) => write!(f, "Materialize error: {e}"),
            Self::Engine(e) => write!(f, "Engine error: {e}"),
            Self::Timeout(limit) => write!(f, "Operation timed out after {limit:?}"),
            Self::Cancelled(reason) => write!(f, "Operation cancelled: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_source() {
        let err = DbError::AttachFile {
            source_name: "orders".into(),
            path: "/data/orders.parquet".into(),
            reason: "file not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot attach file source 'orders' from '/data/orders.parquet': file not found"
        );
    }

    #[test]
    fn test_display_timeout() {
        let err = DbError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Operation timed out after 250ms");
    }

    #[test]
    fn test_schema_error_converts() {
        let err: DbError = SchemaError::unsupported("BLOB").into();
        assert!(matches!(err, DbError::Schema(_)));
        assert!(err.to_string().starts_with("Schema error: "));
    }
}
