//! PostgreSQL write transactions.
//!
//! Statements that are allowed to fail without ending the load (TRUNCATE and
//! sequence repair) run inside a savepoint. PostgreSQL aborts the whole
//! transaction on any error, and rolling back to the savepoint is what keeps
//! it usable afterwards.
//!
//! Inserts bind every value as a parameter cast to the target column's
//! type, looked up once per table from the catalog.

use super::type_mapping::{PgParameter, bind_parameter};
use crate::Result;
use crate::adapters::AdapterTransaction;
use crate::adapters::helpers::{
    insert_prefix, query_failed, quote_ansi_identifier, rows_per_statement,
};
use crate::models::Record;
use async_trait::async_trait;
use sqlx::query_builder::Separated;
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashMap;

const TRUNCATE_SAVEPOINT: &str = "tabledump_truncate";
const SEQUENCE_SAVEPOINT: &str = "tabledump_sequence";

/// Bind parameters allowed in one statement by the wire protocol.
const MAX_BIND_PARAMS: usize = 65_535;

/// Column types of a table, without type modifiers so casts never truncate.
const COLUMN_TYPES_QUERY: &str = r#"
    SELECT a.attname::text, format_type(a.atttypid, NULL)
    FROM pg_attribute a
    WHERE a.attrelid = $1::regclass
    AND a.attnum > 0
    AND NOT a.attisdropped
"#;

/// Finds the single-column primary key of a table.
const PRIMARY_KEY_QUERY: &str = r#"
    SELECT a.attname::text AS column_name
    FROM pg_index i
    JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
    WHERE i.indrelid = $1::regclass
    AND i.indisprimary
"#;

/// An open PostgreSQL transaction.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    /// Column name to type, per target table
    column_types: HashMap<String, HashMap<String, String>>,
}

impl PostgresTransaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self {
            tx,
            column_types: HashMap::new(),
        }
    }

    async fn target_types(&mut self, table: &str, columns: &[String]) -> Result<Vec<Option<String>>> {
        if !self.column_types.contains_key(table) {
            let rows: Vec<(String, String)> = sqlx::query_as(COLUMN_TYPES_QUERY)
                .bind(quote_ansi_identifier(table))
                .fetch_all(&mut *self.tx)
                .await
                .map_err(query_failed(format!("Failed to read column types of '{}'", table)))?;
            self.column_types
                .insert(table.to_string(), rows.into_iter().collect());
        }

        let types = self.column_types.get(table);
        Ok(columns
            .iter()
            .map(|c| types.and_then(|t| t.get(c)).cloned())
            .collect())
    }

    async fn simple(&mut self, sql: &str) -> std::result::Result<u64, sqlx::Error> {
        sqlx::query(sql)
            .persistent(false)
            .execute(&mut *self.tx)
            .await
            .map(|r| r.rows_affected())
    }

    /// Runs `sql` inside a savepoint, rolling back to it on failure.
    async fn guarded(
        &mut self,
        savepoint: &str,
        sql: &str,
    ) -> std::result::Result<(), sqlx::Error> {
        self.simple(&format!("SAVEPOINT {}", savepoint)).await?;
        match self.simple(sql).await {
            Ok(_) => {
                self.simple(&format!("RELEASE SAVEPOINT {}", savepoint))
                    .await?;
                Ok(())
            }
            Err(e) => {
                self.simple(&format!("ROLLBACK TO SAVEPOINT {}", savepoint))
                    .await?;
                Err(e)
            }
        }
    }

    async fn sequence_target(&mut self, table: &str) -> Result<Option<(String, String)>> {
        let quoted = quote_ansi_identifier(table);

        let keys: Vec<String> = sqlx::query_scalar(PRIMARY_KEY_QUERY)
            .bind(&quoted)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(query_failed(format!("Failed to find primary key of '{}'", table)))?;

        let [key] = keys.as_slice() else {
            tracing::debug!(
                "Table '{}' has {} primary key columns, no sequence to reset",
                table,
                keys.len()
            );
            return Ok(None);
        };

        let sequence: Option<String> =
            sqlx::query_scalar("SELECT pg_get_serial_sequence($1, $2)")
                .bind(&quoted)
                .bind(key)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(query_failed(format!("Failed to find sequence of '{}'", table)))?;

        Ok(sequence.map(|s| (key.clone(), s)))
    }
}

fn push_parameter(
    row: &mut Separated<'_, '_, Postgres, &'static str>,
    parameter: PgParameter,
    column_type: Option<&str>,
) {
    match parameter {
        PgParameter::Text(text) => row.push_bind(text),
        PgParameter::Bytes(bytes) => row.push_bind(bytes),
    };
    if let Some(column_type) = column_type {
        row.push_unseparated(format!("::{}", column_type));
    }
}

#[async_trait]
impl AdapterTransaction for PostgresTransaction {
    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        records: &[Record],
    ) -> Result<u64> {
        let types = self.target_types(table, columns).await?;
        let prefix = insert_prefix(table, columns, quote_ansi_identifier);

        let mut inserted = 0;
        for chunk in records.chunks(rows_per_statement(columns.len(), MAX_BIND_PARAMS)) {
            let rows = chunk
                .iter()
                .map(|record| {
                    record
                        .iter()
                        .zip(&types)
                        .map(|(value, column_type)| bind_parameter(value, column_type.as_deref()))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?;

            let mut builder = QueryBuilder::<Postgres>::new(prefix.as_str());
            builder.push_values(rows, |mut row, parameters| {
                for (parameter, column_type) in parameters.into_iter().zip(&types) {
                    push_parameter(&mut row, parameter, column_type.as_deref());
                }
            });

            let result = builder
                .build()
                .persistent(false)
                .execute(&mut *self.tx)
                .await
                .map_err(query_failed(format!("Failed to insert rows into '{}'", table)))?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn truncate(&mut self, table: &str) -> Result<()> {
        let sql = format!("TRUNCATE TABLE {}", quote_ansi_identifier(table));
        self.guarded(TRUNCATE_SAVEPOINT, &sql)
            .await
            .map_err(query_failed(format!("Failed to truncate '{}'", table)))
    }

    async fn delete_all(&mut self, table: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {}", quote_ansi_identifier(table));
        self.simple(&sql)
            .await
            .map_err(query_failed(format!("Failed to delete rows of '{}'", table)))
    }

    async fn reset_sequence(&mut self, table: &str) -> Result<()> {
        // Catalog lookups only fail for a missing table, which the insert step
        // has already rejected.
        let Some((key, sequence)) = self.sequence_target(table).await? else {
            return Ok(());
        };

        let sql = format!(
            "SELECT setval('{}', COALESCE(MAX({}), 0) + 1, false) FROM {}",
            sequence.replace('\'', "''"),
            quote_ansi_identifier(&key),
            quote_ansi_identifier(table)
        );
        self.guarded(SEQUENCE_SAVEPOINT, &sql)
            .await
            .map_err(query_failed(format!("Failed to reset sequence {}", sequence)))?;

        tracing::debug!("Reset sequence {} for '{}'", sequence, table);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(query_failed("Failed to commit transaction"))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(query_failed("Failed to roll back transaction"))
    }
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction").finish_non_exhaustive()
    }
}
