//! MySQL database adapter with connection pooling.
//!
//! # Module Structure
//! - `connection`: Connection pool management and validation
//! - `type_mapping`: MySQL column types to column kinds
//! - `paging`: Ordered offset/limit page reads via `JSON_ARRAY`
//! - `transaction`: Write transactions with bound inserts
//!
//! # MySQL-Specific Behaviour
//! - Tables come from the database named in the connection URL
//! - TRUNCATE commits implicitly, so loads always use `DELETE`
//! - AUTO_INCREMENT counters advance past explicit ids on their own

mod connection;
mod paging;
mod transaction;
mod type_mapping;

use super::helpers::{query_failed, quote_backtick_identifier};
use super::{AdapterFeature, AdapterTransaction, ConnectionConfig, DatabaseAdapter};
use crate::Result;
use crate::models::{ColumnInfo, DatabaseType, Record};
use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, Row};

pub use connection::{parse_mysql_connection_config, validate_mysql_connection_string};
pub use transaction::MySqlTransaction;
pub use type_mapping::column_kind;

/// MySQL database adapter with connection pooling
pub struct MySqlAdapter {
    /// Connection pool for database operations
    pub pool: MySqlPool,
    /// Connection configuration (pool settings, timeouts, etc.)
    pub config: ConnectionConfig,
}

impl std::fmt::Debug for MySqlAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlAdapter")
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DatabaseAdapter for MySqlAdapter {
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

        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE()",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed("Cannot access information_schema"))?;

        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn supports_feature(&self, feature: AdapterFeature) -> bool {
        matches!(
            feature,
            AdapterFeature::Transactions | AdapterFeature::ReadOnlyMode
        )
    }

    fn connection_config(&self) -> ConnectionConfig {
        self.config.clone()
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let tables_query = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS table_name
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        sqlx::query_scalar(tables_query)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("Failed to enumerate tables"))
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        table_columns(&self.pool, table).await
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", quote_backtick_identifier(table));
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
        quote_backtick_identifier(name)
    }

    async fn begin(&self) -> Result<Box<dyn AdapterTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("Failed to begin transaction"))?;
        Ok(Box::new(MySqlTransaction::new(tx)))
    }
}

/// Reads a table's columns through any executor.
pub(crate) async fn table_columns<'c, E>(executor: E, table: &str) -> Result<Vec<ColumnInfo>>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    let columns_query = r#"
        SELECT
            CAST(COLUMN_NAME AS CHAR) AS column_name,
            CAST(COLUMN_TYPE AS CHAR) AS column_type
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE()
        AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
    "#;

    let rows = sqlx::query(columns_query)
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
            .try_get("column_name")
            .map_err(query_failed("Failed to parse column name"))?;
        let column_type: String = row.try_get("column_type").unwrap_or_default();
        let kind = column_kind(&column_type);
        columns.push(ColumnInfo {
            name,
            data_type: column_type,
            kind,
        });
    }

    Ok(columns)
}
