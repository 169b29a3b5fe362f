//! `PostgreSQL` result cursor.
//!
//! Adapts rows fetched with `tokio-postgres` to [`RowCursor`]. Column
//! metadata carries the `pg_type` spelling (`int4`, `text`, `timestamp`),
//! which the type mapper accepts directly.
//!
//! ```rust,no_run
//! use arrowlake_connectors::postgres::query_cursor;
//! use arrowlake_connectors::RowMaterializer;
//!
//! # async fn example(client: &tokio_postgres::Client) -> Result<(), Box<dyn std::error::Error>> {
//! let mut cursor = query_cursor(client, "SELECT id, name FROM customers", &[]).await?;
//! let batch = RowMaterializer::default().materialize_inferred(&mut cursor)?;
//! # Ok(())
//! # }
//! ```

use std::time::{SystemTime, UNIX_EPOCH};
use std::vec;

use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Row, Statement};

use crate::cell::CellValue;
use crate::cursor::{CursorError, RowCursor};
use crate::schema::ColumnMeta;

/// Cursor over rows already fetched from `PostgreSQL`.
pub struct PgRowsCursor {
    columns: Vec<ColumnMeta>,
    types: Vec<Type>,
    rows: vec::IntoIter<Row>,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for PgRowsCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgRowsCursor")
            .field("columns", &self.columns)
            .field("remaining", &self.rows.len())
            .finish()
    }
}

impl PgRowsCursor {
    /// Creates a cursor from a prepared statement and its result rows.
    ///
    /// Metadata comes from the statement so that empty results still
    /// report their columns.
    #[must_use]
    pub fn new(statement: &Statement, rows: Vec<Row>) -> Self {
        let columns = statement
            .columns()
            .iter()
            .map(|c| ColumnMeta::new(c.name(), c.type_().name()))
            .collect();
        let types = statement
            .columns()
            .iter()
            .map(|c| c.type_().clone())
            .collect();
        Self {
            columns,
            types,
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for PgRowsCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn read_row(&mut self, cells: &mut Vec<CellValue>) -> Result<bool, CursorError> {
        cells.clear();
        let Some(row) = self.rows.next() else {
            return Ok(false);
        };
        for (idx, ty) in self.types.iter().enumerate() {
            let cell = decode_cell(&row, idx, ty).map_err(|message| CursorError::Decode {
                column: idx,
                message,
            })?;
            cells.push(cell);
        }
        Ok(true)
    }
}

/// Prepares and runs `sql`, returning a cursor over the result.
pub async fn query_cursor(
    client: &Client,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<PgRowsCursor, tokio_postgres::Error> {
    let statement = client.prepare(sql).await?;
    let rows = client.query(&statement, params).await?;
    tracing::debug!(
        rows = rows.len(),
        columns = statement.columns().len(),
        "fetched postgres rows"
    );
    Ok(PgRowsCursor::new(&statement, rows))
}

fn decode_cell(row: &Row, idx: usize, ty: &Type) -> Result<CellValue, String> {
    let cell = match *ty {
        Type::INT2 => get::<i16>(row, idx)?.map(|v| CellValue::Int32(i32::from(v))),
        Type::INT4 => get::<i32>(row, idx)?.map(CellValue::Int32),
        Type::INT8 => get::<i64>(row, idx)?.map(CellValue::Int64),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(CellValue::Float32),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(CellValue::Float64),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx)?.map(CellValue::Utf8)
        }
        Type::BOOL => get::<bool>(row, idx)?.map(CellValue::Boolean),
        Type::TIMESTAMP => match get::<SystemTime>(row, idx)? {
            Some(ts) => Some(CellValue::Timestamp(epoch_micros(ts)?)),
            None => None,
        },
        _ => return Err(format!("unsupported postgres type '{}'", ty.name())),
    };
    Ok(cell.unwrap_or(CellValue::Null))
}

fn get<'a, T>(row: &'a Row, idx: usize) -> Result<Option<T>, String>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
}

/// Signed microseconds between the Unix epoch and `ts`.
fn epoch_micros(ts: SystemTime) -> Result<i64, String> {
    let overflow = || "timestamp out of range".to_string();
    match ts.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_micros()).map_err(|_| overflow()),
        Err(before) => i64::try_from(before.duration().as_micros())
            .map(|v| -v)
            .map_err(|_| overflow()),
    }
}
