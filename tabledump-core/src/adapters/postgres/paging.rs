//! PostgreSQL page reads.
//!
//! Rows are converted to JSON by the server with `row_to_json`, which gives
//! every type (timestamps, numerics, arrays, json) a stable form that the
//! same server accepts back on restore. `bytea` columns are re-encoded
//! server-side as `base64:` text, the binary form every engine shares.

use crate::adapters::helpers::{
    limit_offset_clause, order_by_clause, query_failed, quote_ansi_identifier,
};
use crate::codec::BLOB_PREFIX;
use crate::error::TableDumpError;
use crate::models::{ColumnInfo, Record};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

/// Builds the query for one page of a table.
pub(crate) fn page_query(
    table: &str,
    columns: &[ColumnInfo],
    sort_keys: &[String],
    offset: u64,
    limit: u64,
) -> String {
    let order_by = order_by_clause(sort_keys, |k| format!("t.{}", quote_ansi_identifier(k)));
    if !columns.iter().any(ColumnInfo::is_binary) {
        return format!(
            "SELECT row_to_json(t.*) AS row_data FROM {} t{}{}",
            quote_ansi_identifier(table),
            order_by,
            limit_offset_clause(offset, limit)
        );
    }

    let selected: Vec<String> = columns.iter().map(select_expression).collect();
    format!(
        "SELECT row_to_json(p.*) AS row_data FROM (SELECT {} FROM {} t{}{}) p",
        selected.join(", "),
        quote_ansi_identifier(table),
        order_by,
        limit_offset_clause(offset, limit)
    )
}

fn select_expression(column: &ColumnInfo) -> String {
    let quoted = quote_ansi_identifier(&column.name);
    if column.is_binary() {
        // encode() wraps base64 output every 76 characters
        format!(
            "'{}' || translate(encode(t.{}, 'base64'), E'\\n', '') AS {}",
            BLOB_PREFIX, quoted, quoted
        )
    } else {
        format!("t.{}", quoted)
    }
}

/// Reads one page of records.
pub(crate) async fn select_page(
    pool: &PgPool,
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
        .map(|row| object_to_record(row, columns, table))
        .collect()
}

/// Reorders a `row_to_json` object into a positional record.
pub(crate) fn object_to_record(
    row: JsonValue,
    columns: &[ColumnInfo],
    table: &str,
) -> crate::Result<Record> {
    let JsonValue::Object(mut object) = row else {
        return Err(TableDumpError::format(format!(
            "row of table '{}' was not returned as a JSON object",
            table
        )));
    };

    columns
        .iter()
        .map(|column| {
            object.remove(&column.name).ok_or_else(|| {
                TableDumpError::format(format!(
                    "column '{}' missing from row of table '{}'",
                    column.name, table
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_query() {
        let columns = vec![
            ColumnInfo::new("user_id", "integer"),
            ColumnInfo::new("group_id", "integer"),
        ];
        let keys = vec!["user_id".to_string(), "group_id".to_string()];
        assert_eq!(
            page_query("memberships", &columns, &keys, 2000, 1000),
            "SELECT row_to_json(t.*) AS row_data FROM \"memberships\" t \
             ORDER BY t.\"user_id\", t.\"group_id\" LIMIT 1000 OFFSET 2000"
        );
        assert_eq!(
            page_query("logs", &columns, &[], 0, 10),
            "SELECT row_to_json(t.*) AS row_data FROM \"logs\" t LIMIT 10 OFFSET 0"
        );
    }

    #[test]
    fn test_page_query_encodes_bytea_as_base64() {
        let columns = vec![
            ColumnInfo::new("id", "integer"),
            ColumnInfo::binary("body", "bytea"),
        ];
        assert_eq!(
            page_query("files", &columns, &["id".to_string()], 0, 10),
            "SELECT row_to_json(p.*) AS row_data FROM (SELECT t.\"id\", \
             'base64:' || translate(encode(t.\"body\", 'base64'), E'\\n', '') AS \"body\" \
             FROM \"files\" t ORDER BY t.\"id\" LIMIT 10 OFFSET 0) p"
        );
    }

    #[test]
    fn test_object_to_record_follows_column_order() {
        let columns = vec![
            ColumnInfo::new("id", "integer"),
            ColumnInfo::boolean("active", "boolean"),
            ColumnInfo::new("name", "text"),
        ];
        let row = json!({"name": "ada", "id": 1, "active": true});
        assert_eq!(
            object_to_record(row, &columns, "users").unwrap(),
            vec![json!(1), json!(true), json!("ada")]
        );
    }

    #[test]
    fn test_object_to_record_rejects_missing_column() {
        let columns = vec![ColumnInfo::new("id", "integer")];
        assert!(object_to_record(json!({"other": 1}), &columns, "users").is_err());
        assert!(object_to_record(json!([1]), &columns, "users").is_err());
    }
}
