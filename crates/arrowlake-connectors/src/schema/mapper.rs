//! Source type name to [`LogicalType`] mapping.
//!
//! Accepts the spellings reported by DuckDB, standard SQL catalogs and the
//! Postgres `pg_type` catalog. Matching is case-insensitive and ignores a
//! trailing length or precision suffix (`VARCHAR(255)`).

use super::error::{SchemaError, SchemaResult};
use super::types::LogicalType;

/// Maps a source type name to its logical type and nullability.
///
/// Nullability is always `true`; NOT NULL constraints live in the source
/// catalog and are not visible through a result cursor.
///
/// # Errors
///
/// Returns [`SchemaError::UnsupportedType`] for any name outside the
/// supported set. There is no fallback type.
pub fn map_source_type(type_name: &str) -> SchemaResult<(LogicalType, bool)> {
    let normalized = normalize(type_name);
    let logical = match normalized.as_str() {
        "INT" | "INTEGER" | "INT4" | "SIGNED" | "SMALLINT" | "INT2" | "SHORT" | "TINYINT"
        | "INT1" => LogicalType::Int32,
        "BIGINT" | "INT8" | "LONG" => LogicalType::Int64,
        "FLOAT" | "REAL" | "FLOAT4" => LogicalType::Float32,
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => LogicalType::Float64,
        "VARCHAR" | "CHAR" | "BPCHAR" | "TEXT" | "STRING" | "NAME" | "CHARACTER VARYING"
        | "CHARACTER" => LogicalType::Utf8,
        "BOOLEAN" | "BOOL" | "LOGICAL" => LogicalType::Boolean,
        "TIMESTAMP" | "DATETIME" | "TIMESTAMP WITHOUT TIME ZONE" => LogicalType::Timestamp,
        _ => return Err(SchemaError::unsupported(type_name.trim())),
    };
    Ok((logical, true))
}

/// Uppercases, strips a `(n)` / `(p, s)` suffix and collapses whitespace.
fn normalize(type_name: &str) -> String {
    let base = match type_name.find('(') {
        Some(idx) => &type_name[..idx],
        None => type_name,
    };
    base.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}
