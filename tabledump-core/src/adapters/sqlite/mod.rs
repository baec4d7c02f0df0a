//! SQLite database adapter for table dumps and restores.
//!
//! # Module Structure
//! - `connection`: Connection handling (single-connection pool)
//! - `type_mapping`: Declared types to column kinds (boolean detection)
//! - `paging`: Ordered offset/limit page reads and value extraction
//! - `transaction`: Write transactions for restores
//!
//! # SQLite-Specific Behaviour
//! - Uses `sqlite_master` and `pragma_table_info` for introspection
//! - No TRUNCATE statement: loads fall back to `DELETE`
//! - `INTEGER PRIMARY KEY` rowids track explicit inserts on their own, so
//!   there is no sequence to repair
//! - Supports both file-based and in-memory databases

mod connection;
mod paging;
mod transaction;
mod type_mapping;


use super::helpers::{query_failed, quote_ansi_identifier};
use super::{AdapterFeature, AdapterTransaction, ConnectionConfig, DatabaseAdapter};
use crate::Result;
use crate::models::{ColumnInfo, DatabaseType, Record};
use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool};

pub use connection::{parse_sqlite_connection_config, validate_sqlite_connection_string};
pub use transaction::SqliteTransaction;
pub use type_mapping::column_kind;

/// SQLite database adapter.
///
/// SQLite uses file-based databases, so this adapter works differently from
/// pooled database adapters like PostgreSQL or MySQL: the pool holds a single
/// connection, which an open transaction owns until it finishes.
pub struct SqliteAdapter {
    /// Connection pool (single connection)
    pub pool: SqlitePool,
    /// Connection configuration
    pub config: ConnectionConfig,
    /// Original connection string (kept for reference, public for test access)
    pub connection_string: String,
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("config", &self.config)
            .field("is_in_memory", &self.is_in_memory())
            // Note: connection_string is intentionally omitted
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    async fn test_connection(&self) -> Result<()> {
        let connectivity_result: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(crate::error::TableDumpError::connection_failed)?;

        if connectivity_result != 1 {
            return Err(crate::error::TableDumpError::configuration(
                "Basic connectivity test failed: unexpected result",
            ));
        }

        // Table listing needs sqlite_master
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("Cannot access sqlite_master"))?;

        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn supports_feature(&self, feature: AdapterFeature) -> bool {
        matches!(
            feature,
            AdapterFeature::Transactions | AdapterFeature::ReadOnlyMode
        )
        // Note: SQLite does NOT support:
        // - Truncate (no TRUNCATE statement)
        // - SequenceReset (rowids are maintained by the engine)
    }

    fn connection_config(&self) -> ConnectionConfig {
        self.config.clone()
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let tables_query = r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;

        let rows = sqlx::query(tables_query)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("Failed to enumerate tables"))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("name")
                    .map_err(query_failed("Failed to parse table name"))
            })
            .collect()
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        table_columns(&self.pool, table).await
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", quote_ansi_identifier(table));
        let count: i64 = sqlx::query_scalar(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(format!(
                "Failed to get row count for table '{}'",
                table
            )))?;
        Ok(count.max(0) as u64)
    }

    async fn select_page(
        &self,
        table: &str,
        columns: &[ColumnInfo],
        sort_keys: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Record>> {
        paging::select_page(&self.pool, table, columns, sort_keys, offset, limit).await
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_ansi_identifier(name)
    }

    async fn begin(&self) -> Result<Box<dyn AdapterTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("Failed to begin transaction"))?;
        Ok(Box::new(SqliteTransaction::new(tx)))
    }
}

/// Reads a table's columns through any executor.
///
/// Loads run this on the transaction's connection: the pool holds only that
/// one connection while a transaction is open.
pub(crate) async fn table_columns<'c, E>(executor: E, table: &str) -> Result<Vec<ColumnInfo>>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
        .bind(table)
        .fetch_all(executor)
        .await
        .map_err(query_failed(format!(
            "Failed to collect columns for table '{}'",
            table
        )))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row
            .try_get("name")
            .map_err(query_failed("Failed to parse column name"))?;
        let declared_type: String = row.try_get("type").unwrap_or_default();
        columns.push(type_mapping::column_info(name, declared_type));
    }

    tracing::trace!("Table '{}' has {} columns", table, columns.len());
    Ok(columns)
}
