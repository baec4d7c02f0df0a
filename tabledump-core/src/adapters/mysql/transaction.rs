//! MySQL write transactions.

use super::table_columns;
use crate::Result;
use crate::adapters::AdapterTransaction;
use crate::adapters::helpers::{
    insert_prefix, query_failed, quote_backtick_identifier, rows_per_statement,
};
use crate::codec::BindValue;
use crate::error::TableDumpError;
use crate::models::{ColumnInfo, Record};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::query_builder::Separated;
use sqlx::{MySql, QueryBuilder};
use std::collections::HashMap;

/// Placeholders allowed in one prepared statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// An open MySQL transaction.
pub struct MySqlTransaction {
    tx: sqlx::Transaction<'static, MySql>,
    /// Target columns by name, per table
    targets: HashMap<String, HashMap<String, ColumnInfo>>,
}

impl MySqlTransaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, MySql>) -> Self {
        Self {
            tx,
            targets: HashMap::new(),
        }
    }

    async fn target_columns(
        &mut self,
        table: &str,
        columns: &[String],
    ) -> Result<Vec<Option<ColumnInfo>>> {
        if !self.targets.contains_key(table) {
            let found = table_columns(&mut *self.tx, table).await?;
            let by_name = found.into_iter().map(|c| (c.name.clone(), c)).collect();
            self.targets.insert(table.to_string(), by_name);
        }

        let targets = self.targets.get(table);
        Ok(columns
            .iter()
            .map(|c| targets.and_then(|t| t.get(c)).cloned())
            .collect())
    }
}

/// Converts a dumped value for a target column.
///
/// JSON columns take the value's JSON text, so a JSON string stays a JSON
/// string instead of becoming raw text.
fn bind_value(value: &JsonValue, target: Option<&ColumnInfo>) -> Result<BindValue> {
    match target {
        Some(column) if column.data_type.eq_ignore_ascii_case("json") && !value.is_null() => {
            Ok(BindValue::Text(value.to_string()))
        }
        _ => BindValue::from_json(value, target.is_some_and(ColumnInfo::is_binary)),
    }
}

fn push_value(row: &mut Separated<'_, '_, MySql, &'static str>, value: BindValue) {
    match value {
        BindValue::Null => row.push_bind(None::<String>),
        BindValue::Bool(b) => row.push_bind(b),
        BindValue::Int(i) => row.push_bind(i),
        // Decimal text converts exactly into DECIMAL columns
        BindValue::Decimal(text) | BindValue::Text(text) => row.push_bind(text),
        BindValue::Bytes(bytes) => row.push_bind(bytes),
    };
}

#[async_trait]
impl AdapterTransaction for MySqlTransaction {
    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        records: &[Record],
    ) -> Result<u64> {
        let targets = self.target_columns(table, columns).await?;
        let prefix = insert_prefix(table, columns, quote_backtick_identifier);

        let mut inserted = 0;
        for chunk in records.chunks(rows_per_statement(columns.len(), MAX_BIND_PARAMS)) {
            let rows = chunk
                .iter()
                .map(|record| {
                    record
                        .iter()
                        .zip(&targets)
                        .map(|(value, target)| bind_value(value, target.as_ref()))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?;

            let mut builder = QueryBuilder::<MySql>::new(prefix.as_str());
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
        // TRUNCATE commits implicitly and would end the load transaction
        Err(TableDumpError::unsupported_feature(
            "transactional TRUNCATE",
            "MySQL",
        ))
    }

    async fn delete_all(&mut self, table: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {}", quote_backtick_identifier(table));
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
