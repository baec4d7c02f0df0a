//! PostgreSQL database adapter with connection pooling.
//!
//! # Module Structure
//! - `connection`: Connection pool management and validation
//! - `type_mapping`: PostgreSQL column types to column kinds
//! - `paging`: Ordered offset/limit page reads via `row_to_json`
//! - `transaction`: Write transactions with typed bound inserts,
//!   savepoint-guarded truncate and sequence repair
//!
//! # Scope
//! Tables are read from the connection's current schema (the first schema on
//! `search_path`), and table names are used unqualified.
//!
//! # Security Guarantees
//! - Dump connections set `default_transaction_read_only`
//! - Connection strings are sanitized in error messages
//! - Statement timeouts prevent runaway queries

mod connection;
mod paging;
mod transaction;
mod type_mapping;


use super::helpers::{RowExt, query_failed, quote_ansi_identifier};
use super::{AdapterFeature, AdapterTransaction, ConnectionConfig, DatabaseAdapter};
use crate::Result;
use crate::models::{ColumnInfo, DatabaseType, Record};
use async_trait::async_trait;
use sqlx::PgPool;

pub use transaction::PostgresTransaction;
pub use type_mapping::{array_literal, column_kind};

/// PostgreSQL database adapter with connection pooling
pub struct PostgresAdapter {
    pub pool: PgPool,
    pub config: ConnectionConfig,
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .field("pool_idle", &self.pool.num_idle())
            .finish()
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
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

        // Table listing needs information_schema
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = current_schema()",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed("Cannot access information_schema"))?;

        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn supports_feature(&self, feature: AdapterFeature) -> bool {
        matches!(
            feature,
            AdapterFeature::Truncate
                | AdapterFeature::SequenceReset
                | AdapterFeature::Transactions
                | AdapterFeature::ReadOnlyMode
        )
    }

    fn connection_config(&self) -> ConnectionConfig {
        self.config.clone()
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let tables_query = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        sqlx::query_scalar(tables_query)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("Failed to enumerate tables"))
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let columns_query = r#"
            SELECT column_name::text AS column_name, data_type::text AS data_type
            FROM information_schema.columns
            WHERE table_schema = current_schema()
            AND table_name = $1
            ORDER BY ordinal_position
        "#;

        let rows = sqlx::query(columns_query)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed(format!(
                "Failed to collect columns for table '{}'",
                table
            )))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get_field("column_name", Some(table))?;
            let data_type: String = row.get_field("data_type", Some(table))?;
            let kind = column_kind(&data_type);
            columns.push(ColumnInfo {
                name,
                data_type,
                kind,
            });
        }

        Ok(columns)
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
        Ok(Box::new(PostgresTransaction::new(tx)))
    }
}
