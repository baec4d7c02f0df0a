//! MySQL page reads.
//!
//! Each row is packed server-side with `JSON_ARRAY(...)`, which keeps the
//! positional column order and renders dates, decimals and integers in forms
//! MySQL parses back on insert. Binary columns are encoded as `base64:` text
//! before packing; MySQL's own JSON form for them is engine-specific.

use crate::adapters::helpers::{
    limit_offset_clause, order_by_clause, query_failed, quote_backtick_identifier,
};
use crate::codec::BLOB_PREFIX;
use crate::error::TableDumpError;
use crate::models::{ColumnInfo, Record};
use serde_json::Value as JsonValue;
use sqlx::MySqlPool;

/// Builds the query for one page of a table.
pub(crate) fn page_query(
    table: &str,
    columns: &[ColumnInfo],
    sort_keys: &[String],
    offset: u64,
    limit: u64,
) -> String {
    let packed: Vec<String> = columns.iter().map(packed_expression).collect();
    format!(
        "SELECT JSON_ARRAY({}) AS row_data FROM {}{}{}",
        packed.join(", "),
        quote_backtick_identifier(table),
        order_by_clause(sort_keys, quote_backtick_identifier),
        limit_offset_clause(offset, limit)
    )
}

fn packed_expression(column: &ColumnInfo) -> String {
    let quoted = quote_backtick_identifier(&column.name);
    if column.is_binary() {
        // TO_BASE64 wraps its output every 76 characters
        format!(
            "CONCAT('{}', REPLACE(TO_BASE64({}), CHAR(10 USING ascii), ''))",
            BLOB_PREFIX, quoted
        )
    } else {
        quoted
    }
}

/// Reads one page of records.
pub(crate) async fn select_page(
    pool: &MySqlPool,
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

    let rows: Vec<JsonValue> = sqlx::query_scalar(&query)
        .fetch_all(pool)
        .await
        .map_err(query_failed(format!(
            "Failed to read rows {}..{} of table '{}'",
            offset,
            offset.saturating_add(limit),
            table
        )))?;

    rows.into_iter()
        .map(|row| match row {
            JsonValue::Array(values) if values.len() == columns.len() => Ok(values),
            _ => Err(TableDumpError::format(format!(
                "row of table '{}' did not match its {} columns",
                table,
                columns.len()
            ))),
        })
        .collect()
}
