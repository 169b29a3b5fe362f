//! Embedded DuckDB engine handle.
//!
//! One [`Engine`] owns one `duckdb::Connection`. Sources attached through
//! the registrar live as long as the connection; closing or dropping the
//! engine releases all of them.

use std::collections::HashSet;
use std::path::Path;

use arrow_array::RecordBatch;
use arrowlake_connectors::{
    CellValue, ColumnMeta, CursorError, LogicalSchema, MaterializeOptions, RowCursor,
    RowMaterializer,
};
use duckdb::arrow::datatypes::DataType;
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::{Connection, Rows, ToSql};

use crate::config::{is_identifier, EngineConfig};
use crate::error::DbError;

/// Exclusive handle on an embedded engine instance.
pub struct Engine {
    conn: Connection,
    config: EngineConfig,
    /// Extensions loaded on this connection.
    extensions: HashSet<String>,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl Engine {
    /// Opens an in-memory engine with default settings.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_config(EngineConfig::default())
    }

    /// Opens (or creates) a file-backed engine.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        Self::with_config(EngineConfig {
            database_path: Some(path.as_ref().to_path_buf()),
            ..EngineConfig::default()
        })
    }

    /// Opens an engine and applies `config`.
    pub fn with_config(config: EngineConfig) -> Result<Self, DbError> {
        let conn = match &config.database_path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        let engine = Self {
            conn,
            config,
            extensions: HashSet::new(),
        };
        for stmt in settings_statements(&engine.config) {
            engine.execute_batch(&stmt)?;
        }
        tracing::debug!(
            path = ?engine.config.database_path,
            threads = ?engine.config.threads,
            "engine opened"
        );
        Ok(engine)
    }

    /// Settings in effect.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying connection, for statements outside the federation flow.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Executes one or more statements that return no rows.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| DbError::query(sql, e))
    }

    /// Runs a parameterized query and hands its cursor to `f`.
    pub fn query_cursor<R>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        f: impl FnOnce(&mut DuckDbCursor<'_>) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| DbError::query(sql, e))?;
        let rows = stmt.query(params).map_err(|e| DbError::query(sql, e))?;
        let mut cursor = DuckDbCursor::new(rows);
        f(&mut cursor)
    }

    /// Runs a parameterized query and materializes the full result.
    ///
    /// The schema is inferred from the result metadata; any column of an
    /// unsupported type fails the call before rows are read.
    pub fn query_batch(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        options: &MaterializeOptions,
    ) -> Result<RecordBatch, DbError> {
        self.query_cursor(sql, params, |cursor| {
            let schema = LogicalSchema::infer(cursor.columns())?;
            let batch =
                RowMaterializer::with_options(options.clone()).materialize(cursor, &schema)?;
            Ok(batch)
        })
    }

    /// Returns `true` if `name` was loaded through [`load_extension`](Self::load_extension).
    #[must_use]
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(&name.to_ascii_lowercase())
    }

    /// Installs (unless disabled) and loads an extension once per engine.
    ///
    /// Returns `true` if statements were issued, `false` if the extension
    /// was already loaded.
    pub fn load_extension(&mut self, name: &str) -> Result<bool, DbError> {
        let key = name.to_ascii_lowercase();
        if self.extensions.contains(&key) {
            return Ok(false);
        }
        if !is_identifier(&key) {
            return Err(DbError::ExtensionLoad {
                extension: name.to_string(),
                reason: "invalid extension name".into(),
            });
        }
        let sql = extension_statements(&key, self.config.autoinstall_extensions);
        self.conn
            .execute_batch(&sql)
            .map_err(|e| DbError::ExtensionLoad {
                extension: key.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(extension = %key, "extension loaded");
        self.extensions.insert(key);
        Ok(true)
    }

    /// Closes the connection, detaching every source.
    pub fn close(self) -> Result<(), DbError> {
        self.conn.close().map_err(|(_, e)| DbError::Engine(e))
    }
}

/// `SET` statements for the non-default parts of `config`.
fn settings_statements(config: &EngineConfig) -> Vec<String> {
    let mut stmts = Vec::new();
    if let Some(threads) = config.threads {
        stmts.push(format!("SET threads = {threads};"));
    }
    if let Some(limit) = &config.memory_limit {
        stmts.push(format!("SET memory_limit = {};", quote_literal(limit)));
    }
    if let Some(dir) = &config.extension_directory {
        stmts.push(format!(
            "SET extension_directory = {};",
            quote_literal(&dir.to_string_lossy())
        ));
    }
    stmts
}

/// `INSTALL x; LOAD x;`, or only `LOAD x;` without auto-install.
pub(crate) fn extension_statements(name: &str, autoinstall: bool) -> String {
    if autoinstall {
        format!("INSTALL {name}; LOAD {name};")
    } else {
        format!("LOAD {name};")
    }
}

/// Single-quoted SQL string literal with embedded quotes doubled.
pub(crate) fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// [`RowCursor`] over a DuckDB result.
///
/// Column metadata uses DuckDB type spellings. `TINYINT` and `SMALLINT`
/// cells decode to [`CellValue::Int32`]; timestamps are normalized to
/// microseconds.
pub struct DuckDbCursor<'stmt> {
    rows: Rows<'stmt>,
    columns: Vec<ColumnMeta>,
}

impl<'stmt> DuckDbCursor<'stmt> {
    /// Wraps the rows of an executed statement.
    ///
    /// Repeated result names, as produced by `SELECT *` over a join, are
    /// made unique with `_1`, `_2`, ... suffixes.
    #[must_use]
    pub fn new(rows: Rows<'stmt>) -> Self {
        let columns = rows
            .as_ref()
            .map(|stmt| {
                unique_column_names(stmt.column_names())
                    .into_iter()
                    .enumerate()
                    .map(|(idx, name)| {
                        ColumnMeta::new(name, duckdb_type_name(&stmt.column_type(idx)))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { rows, columns }
    }
}

impl RowCursor for DuckDbCursor<'_> {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn read_row(&mut self, cells: &mut Vec<CellValue>) -> Result<bool, CursorError> {
        cells.clear();
        let width = self.columns.len();
        let row = match self.rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(false),
            Err(e) => return Err(CursorError::Fetch(e.to_string())),
        };
        for idx in 0..width {
            let cell = row
                .get_ref(idx)
                .map_err(|e| e.to_string())
                .and_then(decode_value)
                .map_err(|message| CursorError::Decode {
                    column: idx,
                    message,
                })?;
            cells.push(cell);
        }
        Ok(true)
    }
}

/// Keeps the first occurrence of each name and suffixes later ones with the
/// lowest free `_<n>`.
fn unique_column_names(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut seen = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .map(|name| {
            if seen.insert(name.clone()) {
                return name;
            }
            let mut n = 1usize;
            let renamed = loop {
                let candidate = format!("{name}_{n}");
                if taken.insert(candidate.clone()) {
                    break candidate;
                }
                n += 1;
            };
            seen.insert(renamed.clone());
            renamed
        })
        .collect()
}

/// DuckDB spelling of a result column type.
fn duckdb_type_name(data_type: &DataType) -> String {
    let name = match data_type {
        DataType::Boolean => "BOOLEAN",
        DataType::Int8 => "TINYINT",
        DataType::Int16 => "SMALLINT",
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::UInt8 => "UTINYINT",
        DataType::UInt16 => "USMALLINT",
        DataType::UInt32 => "UINTEGER",
        DataType::UInt64 => "UBIGINT",
        DataType::Float32 => "FLOAT",
        DataType::Float64 => "DOUBLE",
        DataType::Utf8 | DataType::LargeUtf8 => "VARCHAR",
        DataType::Binary | DataType::LargeBinary => "BLOB",
        DataType::Date32 | DataType::Date64 => "DATE",
        DataType::Timestamp(_, None) => "TIMESTAMP",
        DataType::Timestamp(_, Some(_)) => "TIMESTAMP WITH TIME ZONE",
        DataType::Decimal128(p, s) => return format!("DECIMAL({p},{s})"),
        other => return other.to_string(),
    };
    name.to_string()
}

fn decode_value(value: ValueRef<'_>) -> Result<CellValue, String> {
    Ok(match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Boolean(v) => CellValue::Boolean(v),
        ValueRef::TinyInt(v) => CellValue::Int32(i32::from(v)),
        ValueRef::SmallInt(v) => CellValue::Int32(i32::from(v)),
        ValueRef::Int(v) => CellValue::Int32(v),
        ValueRef::BigInt(v) => CellValue::Int64(v),
        ValueRef::Float(v) => CellValue::Float32(v),
        ValueRef::Double(v) => CellValue::Float64(v),
        ValueRef::Text(bytes) => CellValue::Utf8(
            std::str::from_utf8(bytes)
                .map_err(|e| format!("invalid UTF-8: {e}"))?
                .to_string(),
        ),
        ValueRef::Timestamp(unit, v) => CellValue::Timestamp(timestamp_micros(unit, v)?),
        other => return Err(format!("unsupported value {other:?}")),
    })
}

fn timestamp_micros(unit: TimeUnit, value: i64) -> Result<i64, String> {
    let micros = match unit {
        TimeUnit::Second => value.checked_mul(1_000_000),
        TimeUnit::Millisecond => value.checked_mul(1_000),
        TimeUnit::Microsecond => Some(value),
        TimeUnit::Nanosecond => Some(value.div_euclid(1_000)),
    };
    micros.ok_or_else(|| format!("timestamp {value} out of range"))
}
