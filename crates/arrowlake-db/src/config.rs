//! Configuration for the federation engine.
//!
//! All types derive `serde::Deserialize`; loading YAML or JSON files is left
//! to the embedding application.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use arrowlake_connectors::MaterializeOptions;
use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// Configuration for an embedded engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database file (`None` = in-memory).
    pub database_path: Option<PathBuf>,
    /// Worker threads (`None` = engine default).
    pub threads: Option<usize>,
    /// Memory limit in engine syntax, e.g. `"2GB"` (`None` = engine default).
    pub memory_limit: Option<String>,
    /// Issue `INSTALL` before `LOAD` for extensions. Disable for offline
    /// hosts with pre-installed extensions.
    pub autoinstall_extensions: bool,
    /// Directory extensions are installed into and loaded from.
    pub extension_directory: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            threads: None,
            memory_limit: None,
            autoinstall_extensions: true,
            extension_directory: None,
        }
    }
}

/// How a Parquet source is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParquetLoadMode {
    /// A view over `read_parquet`; the file is scanned by each query.
    #[default]
    Lazy,
    /// A table copied from the file at attach time.
    Eager,
}

/// Kind-specific part of a [`SourceSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    /// Parquet file, glob or URL readable by `read_parquet`.
    Parquet {
        /// File locator.
        #[serde(alias = "file_path")]
        path: String,
        /// Registration mode.
        #[serde(default)]
        load: ParquetLoadMode,
    },
    /// `PostgreSQL` database attached through the engine's extension.
    Postgres {
        /// libpq connection string or URI.
        connection_string: String,
        /// Table (optionally `schema.table`) the source name refers to.
        #[serde(default)]
        table: Option<String>,
    },
    /// `SQLite` database file attached through the engine's extension.
    Sqlite {
        /// Database file path.
        #[serde(alias = "file_path")]
        path: String,
        /// Table the source name refers to.
        #[serde(default)]
        table: Option<String>,
    },
}

/// One external source to attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Logical name used in queries. Must be a plain SQL identifier.
    #[serde(alias = "table_name")]
    pub name: String,
    /// Source kind and locator.
    #[serde(flatten)]
    pub kind: SourceKind,
}

impl SourceSpec {
    /// Lazily registered Parquet source.
    pub fn parquet(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Parquet {
                path: path.into(),
                load: ParquetLoadMode::Lazy,
            },
        }
    }

    /// `PostgreSQL` source.
    pub fn postgres(name: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Postgres {
                connection_string: connection_string.into(),
                table: None,
            },
        }
    }

    /// `SQLite` source.
    pub fn sqlite(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Sqlite {
                path: path.into(),
                table: None,
            },
        }
    }

    /// Sets the Parquet load mode. No effect on other kinds.
    #[must_use]
    pub fn with_load_mode(mut self, mode: ParquetLoadMode) -> Self {
        if let SourceKind::Parquet { load, .. } = &mut self.kind {
            *load = mode;
        }
        self
    }

    /// Sets the table of a database source. No effect on Parquet sources.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>) -> Self {
        match &mut self.kind {
            SourceKind::Postgres { table, .. } | SourceKind::Sqlite { table, .. } => {
                *table = Some(name.into());
            }
            SourceKind::Parquet { .. } => {}
        }
        self
    }

    /// File path or connection string.
    #[must_use]
    pub fn locator(&self) -> &str {
        match &self.kind {
            SourceKind::Parquet { path, .. } | SourceKind::Sqlite { path, .. } => path,
            SourceKind::Postgres {
                connection_string, ..
            } => connection_string,
        }
    }

    /// Lowercase kind name.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SourceKind::Parquet { .. } => "parquet",
            SourceKind::Postgres { .. } => "postgres",
            SourceKind::Sqlite { .. } => "sqlite",
        }
    }

    fn table(&self) -> Option<&str> {
        match &self.kind {
            SourceKind::Postgres { table, .. } | SourceKind::Sqlite { table, .. } => {
                table.as_deref()
            }
            SourceKind::Parquet { .. } => None,
        }
    }

    /// Checks the name, locator and table of this source.
    pub fn validate(&self) -> Result<(), DbError> {
        if !is_identifier(&self.name) {
            return Err(DbError::Config(format!(
                "source name '{}' is not a plain identifier",
                self.name
            )));
        }
        if is_reserved_keyword(&self.name) {
            return Err(DbError::Config(format!(
                "source name '{}' is a reserved SQL keyword",
                self.name
            )));
        }
        if self.locator().trim().is_empty() {
            return Err(DbError::Config(format!(
                "source '{}' has an empty locator",
                self.name
            )));
        }
        if let Some(table) = self.table() {
            if !table
                .split('.')
                .all(|part| is_identifier(part) && !is_reserved_keyword(part))
            {
                return Err(DbError::Config(format!(
                    "source '{}' has invalid table '{table}'",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// `source.column` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Logical source name.
    pub source: String,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    /// Creates a column reference.
    pub fn new(source: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.column)
    }
}

/// Equality between two columns of different sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCondition {
    /// Left-hand column.
    pub left: ColumnRef,
    /// Right-hand column.
    pub right: ColumnRef,
}

impl JoinCondition {
    /// Creates `left = right`.
    #[must_use]
    pub fn new(left: ColumnRef, right: ColumnRef) -> Self {
        Self { left, right }
    }
}

/// Join flavor used by synthesized queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    /// `INNER JOIN`
    #[default]
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `FULL OUTER JOIN`
    Full,
}

impl JoinType {
    /// SQL keyword sequence.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL OUTER JOIN",
        }
    }
}

/// The cross-source query to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinSpec {
    /// Equality conditions between sources.
    pub conditions: Vec<JoinCondition>,
    /// Join flavor for synthesized queries.
    pub join_type: JoinType,
    /// Output columns (`*` when empty).
    pub select_columns: Vec<String>,
    /// Raw query template with `{select_columns}` and `{source.column}`
    /// placeholders. When absent the query is synthesized.
    pub sql: Option<String>,
}

/// Everything needed for one federated join run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Sources, attached in declaration order.
    pub sources: Vec<SourceSpec>,
    /// Join to execute.
    pub query: JoinSpec,
    /// Materialization options for the result.
    #[serde(default)]
    pub materialize: MaterializeOptions,
}

impl FederationConfig {
    /// Creates a configuration with default materialization options.
    #[must_use]
    pub fn new(sources: Vec<SourceSpec>, query: JoinSpec) -> Self {
        Self {
            sources,
            query,
            materialize: MaterializeOptions::default(),
        }
    }

    /// Checks source names, locators and join references.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.sources.is_empty() {
            return Err(DbError::Config("at least one source is required".into()));
        }

        let mut names = HashSet::with_capacity(self.sources.len());
        for source in &self.sources {
            source.validate()?;
            if !names.insert(source.name.to_ascii_lowercase()) {
                return Err(DbError::Config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }

        for condition in &self.query.conditions {
            for col in [&condition.left, &condition.right] {
                if !names.contains(&col.source.to_ascii_lowercase()) {
                    return Err(DbError::Config(format!(
                        "join condition references undeclared source '{}'",
                        col.source
                    )));
                }
                if !is_identifier(&col.column) {
                    return Err(DbError::Config(format!(
                        "join column '{col}' is not a plain identifier"
                    )));
                }
            }
            if condition.left.source.eq_ignore_ascii_case(&condition.right.source) {
                return Err(DbError::Config(format!(
                    "join condition '{} = {}' compares a source with itself",
                    condition.left, condition.right
                )));
            }
        }

        if let Some(sql) = &self.query.sql {
            if sql.trim().is_empty() {
                return Err(DbError::Config("query template is empty".into()));
            }
        }
        Ok(())
    }
}

/// Returns `true` for `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Keywords the engine reserves; they cannot name an unquoted relation.
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both", "case",
    "cast", "check", "collate", "column", "constraint", "create", "default", "deferrable", "desc",
    "describe", "distinct", "do", "else", "end", "except", "false", "fetch", "for", "foreign",
    "from", "grant", "group", "having", "in", "initially", "intersect", "into", "lateral",
    "leading", "limit", "not", "null", "offset", "on", "only", "or", "order", "pivot",
    "pivot_longer", "pivot_wider", "placing", "primary", "qualify", "references", "returning",
    "select", "show", "some", "summarize", "symmetric", "table", "then", "to", "trailing", "true",
    "union", "unique", "unpivot", "using", "variadic", "when", "where", "window", "with",
];

fn is_reserved_keyword(s: &str) -> bool {
    RESERVED_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(s))
}
