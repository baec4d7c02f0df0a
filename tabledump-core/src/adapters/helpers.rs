//! Helper utilities for database adapter implementations.
//!
//! Provides the SQL text building blocks shared across adapters (identifier
//! quoting, column lists, ORDER BY clauses, INSERT headers) and consistent
//! mapping of driver errors. Values never appear in generated SQL; adapters
//! bind them as parameters.

use crate::models::ColumnInfo;

/// Quotes an identifier with double quotes, doubling embedded quotes.
pub fn quote_ansi_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes an identifier with backticks, doubling embedded backticks.
pub fn quote_backtick_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Builds a comma-separated, quoted column list.
pub fn column_list(columns: &[ColumnInfo], quote: impl Fn(&str) -> String) -> String {
    columns
        .iter()
        .map(|c| quote(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds an ascending ORDER BY clause, or nothing when there is no key.
pub fn order_by_clause(sort_keys: &[String], quote: impl Fn(&str) -> String) -> String {
    if sort_keys.is_empty() {
        return String::new();
    }
    let keys: Vec<String> = sort_keys.iter().map(|k| quote(k)).collect();
    format!(" ORDER BY {}", keys.join(", "))
}

/// Builds the `LIMIT ... OFFSET ...` suffix of a page query.
pub fn limit_offset_clause(offset: u64, limit: u64) -> String {
    format!(" LIMIT {} OFFSET {}", limit, offset)
}

/// Builds `INSERT INTO <table> (<columns>) `, ready for a VALUES list.
pub fn insert_prefix(table: &str, columns: &[String], quote: impl Fn(&str) -> String) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote(c)).collect();
    format!("INSERT INTO {} ({}) ", quote(table), names.join(", "))
}

/// Rows per INSERT that keep `width` parameters per row within `max_params`.
///
/// Always at least one row.
pub fn rows_per_statement(width: usize, max_params: usize) -> usize {
    (max_params / width.max(1)).max(1)
}

/// Maps a driver error into an adapter error with operation context.
///
/// Permission denials are called out in the context so they stand apart
/// from syntax or constraint failures in logs.
#[cfg(any(feature = "postgresql", feature = "mysql", feature = "sqlite"))]
pub fn query_failed(
    context: impl Into<String>,
) -> impl FnOnce(sqlx::Error) -> crate::error::TableDumpError {
    let context = context.into();
    move |e| {
        let denied = match &e {
            sqlx::Error::Database(db_err) => matches!(
                db_err.code().as_deref(),
                // SQLSTATE for PostgreSQL insufficient_privilege and MySQL access errors
                Some("42501") | Some("42000")
            ) && db_err.message().to_lowercase().contains("denied"),
            _ => false,
        };
        if denied {
            crate::error::TableDumpError::adapter(format!("{} (permission denied)", context), e)
        } else {
            crate::error::TableDumpError::adapter(context, e)
        }
    }
}

/// Extension trait for extracting typed values from PostgreSQL rows
/// with consistent error handling.
///
/// # Example
/// ```rust,ignore
/// use tabledump_core::adapters::helpers::RowExt;
///
/// let name: String = row.get_field("column_name", Some("my_table"))?;
/// ```
#[cfg(feature = "postgresql")]
pub trait RowExt {
    /// Extracts a typed field from the row with proper error context.
    fn get_field<'r, T>(&'r self, field_name: &str, table_context: Option<&str>) -> crate::Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>;
}

#[cfg(feature = "postgresql")]
impl RowExt for sqlx::postgres::PgRow {
    fn get_field<'r, T>(&'r self, field_name: &str, table_context: Option<&str>) -> crate::Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        use sqlx::Row;
        self.try_get(field_name).map_err(|e| {
            let context = match table_context {
                Some(table) => format!("Failed to read field '{}' for table '{}'", field_name, table),
                None => format!("Failed to read field '{}'", field_name),
            };
            crate::error::TableDumpError::adapter(context, e)
        })
    }
}
