//! SQLite page reads and value extraction.
//!
//! SQLite is dynamically typed: a column's declared type says little about
//! what a given cell holds. Values are therefore decoded by their storage
//! class (INTEGER, REAL, TEXT, BLOB), not by the declaration.

use crate::adapters::helpers::{
    column_list, limit_offset_clause, order_by_clause, query_failed, quote_ansi_identifier,
};
use crate::codec;
use crate::error::TableDumpError;
use crate::models::{ColumnInfo, Record};
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};

/// Builds the query for one page of a table.
pub(crate) fn page_query(
    table: &str,
    columns: &[ColumnInfo],
    sort_keys: &[String],
    offset: u64,
    limit: u64,
) -> String {
    format!(
        "SELECT {} FROM {}{}{}",
        column_list(columns, quote_ansi_identifier),
        quote_ansi_identifier(table),
        order_by_clause(sort_keys, quote_ansi_identifier),
        limit_offset_clause(offset, limit)
    )
}

/// Reads one page of records.
pub(crate) async fn select_page(
    pool: &SqlitePool,
    table: &str,
    columns: &[ColumnInfo],
    sort_keys: &[String],
    offset: u64,
    limit: u64,
) -> crate::Result<Vec<Record>> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let query = page_query(table, columns, sort_keys, offset, limit);
    tracing::trace!("Reading page of '{}': {}", table, query);

    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .map_err(query_failed(format!(
            "Failed to read rows {}..{} of table '{}'",
            offset,
            offset.saturating_add(limit),
            table
        )))?;

    rows.iter()
        .map(|row| row_to_record(row, columns.len(), table))
        .collect()
}

fn row_to_record(row: &SqliteRow, width: usize, table: &str) -> crate::Result<Record> {
    (0..width)
        .map(|index| extract_column_value(row, index, table))
        .collect()
}

/// Extracts a column value as a JSON value.
fn extract_column_value(row: &SqliteRow, index: usize, table: &str) -> crate::Result<JsonValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(query_failed(format!("Failed to read column {} of '{}'", index, table)))?;

    if raw.is_null() {
        return Ok(JsonValue::Null);
    }

    let storage = raw.type_info().name().to_uppercase();
    let decode_failed = |source| TableDumpError::Adapter {
        context: format!(
            "Failed to decode {} value in column {} of '{}'",
            storage, index, table
        ),
        source,
    };

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => {
            let n = <i64 as Decode<Sqlite>>::decode(raw).map_err(decode_failed)?;
            JsonValue::Number(n.into())
        }
        "REAL" | "NUMERIC" => {
            let f = <f64 as Decode<Sqlite>>::decode(raw).map_err(decode_failed)?;
            JsonValue::Number(finite_number(f, index, table)?)
        }
        "BLOB" => {
            let bytes = <Vec<u8> as Decode<Sqlite>>::decode(raw).map_err(decode_failed)?;
            codec::encode_blob(&bytes)
        }
        _ => {
            let s = <String as Decode<Sqlite>>::decode(raw).map_err(decode_failed)?;
            JsonValue::String(s)
        }
    };

    Ok(value)
}

/// JSON has no Infinity or NaN, so such cells cannot be dumped.
fn finite_number(value: f64, index: usize, table: &str) -> crate::Result<serde_json::Number> {
    serde_json::Number::from_f64(value).ok_or_else(|| {
        TableDumpError::format(format!(
            "column {} of '{}' holds {}, which JSON cannot represent",
            index, table, value
        ))
    })
}
