//! SQLite write transactions.

use super::table_columns;
use crate::Result;
use crate::adapters::AdapterTransaction;
use crate::adapters::helpers::{
    insert_prefix, query_failed, quote_ansi_identifier, rows_per_statement,
};
use crate::codec::{self, BindValue};
use crate::error::TableDumpError;
use crate::models::Record;
use async_trait::async_trait;
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::{HashMap, HashSet};

/// Host parameter limit of the bundled SQLite (SQLITE_MAX_VARIABLE_NUMBER).
const MAX_BIND_PARAMS: usize = 32_766;

/// An open SQLite transaction holding the pool's connection.
pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
    /// BLOB-affinity columns per target table
    binary_columns: HashMap<String, HashSet<String>>,
}

impl SqliteTransaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self {
            tx,
            binary_columns: HashMap::new(),
        }
    }

    async fn binary_flags(&mut self, table: &str, columns: &[String]) -> Result<Vec<bool>> {
        if let Some(binary) = self.binary_columns.get(table) {
            return Ok(columns.iter().map(|c| binary.contains(c)).collect());
        }

        let binary: HashSet<String> = table_columns(&mut *self.tx, table)
            .await?
            .into_iter()
            .filter(|c| c.is_binary())
            .map(|c| c.name)
            .collect();
        let flags = columns.iter().map(|c| binary.contains(c)).collect();
        self.binary_columns.insert(table.to_string(), binary);
        Ok(flags)
    }
}

fn push_value(row: &mut Separated<'_, '_, Sqlite, &'static str>, value: BindValue) {
    match value {
        BindValue::Null => row.push_bind(None::<String>),
        BindValue::Bool(b) => row.push_bind(i64::from(b)),
        BindValue::Int(i) => row.push_bind(i),
        // REAL is the widest numeric storage class
        BindValue::Decimal(text) => match text.parse::<f64>() {
            Ok(f) => row.push_bind(f),
            Err(_) => row.push_bind(text),
        },
        BindValue::Text(text) => row.push_bind(text),
        BindValue::Bytes(bytes) => row.push_bind(bytes),
    };
}

#[async_trait]
impl AdapterTransaction for SqliteTransaction {
    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        records: &[Record],
    ) -> Result<u64> {
        let binary = self.binary_flags(table, columns).await?;
        let prefix = insert_prefix(table, columns, quote_ansi_identifier);

        let mut inserted = 0;
        for chunk in records.chunks(rows_per_statement(columns.len(), MAX_BIND_PARAMS)) {
            let rows = codec::bind_rows(chunk, &binary)?;
            let mut builder = QueryBuilder::<Sqlite>::new(prefix.as_str());
            builder.push_values(rows, |mut row, values| {
                for value in values {
                    push_value(&mut row, value);
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

    async fn truncate(&mut self, _table: &str) -> Result<()> {
        // SQLite has no TRUNCATE; an unqualified DELETE is its equivalent
        Err(TableDumpError::unsupported_feature("TRUNCATE", "SQLite"))
    }

    async fn delete_all(&mut self, table: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {}", quote_ansi_identifier(table));
        let result = sqlx::query(&sql)
            .execute(&mut *self.tx)
            .await
            .map_err(query_failed(format!("Failed to delete rows of '{}'", table)))?;
        Ok(result.rows_affected())
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
