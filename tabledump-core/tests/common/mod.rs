//! In-memory adapter and collecting sink shared by the engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tabledump_core::adapters::helpers::quote_ansi_identifier;
use tabledump_core::{
    AccessMode, AdapterFeature, AdapterTransaction, ColumnInfo, ConnectionConfig,
    DatabaseAdapter, DatabaseType, Record, Result, TableDumpError, TablePayload, TableSink,
};

/// One write operation seen by a [`MemoryTransaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Truncate(String),
    Delete(String),
    Insert {
        table: String,
        columns: Vec<String>,
        records: Vec<Record>,
    },
    ResetSequence(String),
}

/// Everything the adapter observed, shared with its transactions.
#[derive(Debug, Default)]
pub struct Journal {
    /// Operations of committed transactions, in order
    pub committed: Vec<Op>,
    pub commits: usize,
    pub rollbacks: usize,
    /// `(table, offset, limit)` of every page read
    pub page_reads: Vec<(String, u64, u64)>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Record>,
}

/// A [`DatabaseAdapter`] over in-memory tables whose rows are already in
/// sort-key order.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    pub tables: BTreeMap<String, MemoryTable>,
    pub truncate_fails: bool,
    pub supports_sequences: bool,
    pub sequence_reset_fails: bool,
    /// Inserting a batch holding this value fails
    pub fail_insert_of: Option<JsonValue>,
    pub journal: Arc<Mutex<Journal>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, columns: Vec<ColumnInfo>, rows: Vec<Record>) -> Self {
        self.tables
            .insert(name.to_string(), MemoryTable { columns, rows });
        self
    }

    /// A single-integer-column table holding `0..row_count`.
    pub fn with_numbered_table(self, name: &str, row_count: u64) -> Self {
        let rows = (0..row_count).map(|i| vec![JsonValue::from(i)]).collect();
        self.with_table(name, vec![ColumnInfo::new("id", "integer")], rows)
    }

    pub fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| TableDumpError::configuration(format!("no such table '{}'", name)))
    }
}

#[async_trait]
impl DatabaseAdapter for MemoryAdapter {
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn supports_feature(&self, feature: AdapterFeature) -> bool {
        match feature {
            AdapterFeature::Truncate => !self.truncate_fails,
            AdapterFeature::SequenceReset => self.supports_sequences,
            AdapterFeature::Transactions | AdapterFeature::ReadOnlyMode => true,
        }
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new("memory", AccessMode::ReadWrite)
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        Ok(self.table(table)?.rows.len() as u64)
    }

    async fn select_page(
        &self,
        table: &str,
        _columns: &[ColumnInfo],
        _sort_keys: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Record>> {
        self.journal()
            .page_reads
            .push((table.to_string(), offset, limit));
        Ok(self
            .table(table)?
            .rows
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_ansi_identifier(name)
    }

    async fn begin(&self) -> Result<Box<dyn AdapterTransaction>> {
        Ok(Box::new(MemoryTransaction {
            ops: Vec::new(),
            truncate_fails: self.truncate_fails,
            sequence_reset_fails: self.sequence_reset_fails,
            fail_insert_of: self.fail_insert_of.clone(),
            journal: Arc::clone(&self.journal),
        }))
    }
}

/// Buffers operations until commit.
pub struct MemoryTransaction {
    ops: Vec<Op>,
    truncate_fails: bool,
    sequence_reset_fails: bool,
    fail_insert_of: Option<JsonValue>,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait]
impl AdapterTransaction for MemoryTransaction {
    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        records: &[Record],
    ) -> Result<u64> {
        if let Some(rejected) = &self.fail_insert_of
            && records.iter().flatten().any(|v| v == rejected)
        {
            return Err(TableDumpError::configuration("insert rejected"));
        }
        self.ops.push(Op::Insert {
            table: table.to_string(),
            columns: columns.to_vec(),
            records: records.to_vec(),
        });
        Ok(records.len() as u64)
    }

    async fn truncate(&mut self, table: &str) -> Result<()> {
        if self.truncate_fails {
            return Err(TableDumpError::unsupported_feature("TRUNCATE", "memory"));
        }
        self.ops.push(Op::Truncate(table.to_string()));
        Ok(())
    }

    async fn delete_all(&mut self, table: &str) -> Result<u64> {
        self.ops.push(Op::Delete(table.to_string()));
        Ok(0)
    }

    async fn reset_sequence(&mut self, table: &str) -> Result<()> {
        if self.sequence_reset_fails {
            return Err(TableDumpError::configuration("no sequence"));
        }
        self.ops.push(Op::ResetSequence(table.to_string()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { ops, journal, .. } = *self;
        let mut journal = journal.lock().unwrap();
        journal.committed.extend(ops);
        journal.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.journal.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

/// A [`TableSink`] that keeps every table in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub tables: Vec<TablePayload>,
    /// Record count of every `write_records` call
    pub batches: Vec<usize>,
    pub finished: bool,
    open: Option<TablePayload>,
}

impl CollectingSink {
    pub fn table(&self, name: &str) -> Option<&TablePayload> {
        self.tables.iter().find(|t| t.table == name)
    }
}

impl TableSink for CollectingSink {
    fn begin_table(&mut self, table: &str) -> Result<()> {
        assert!(self.open.is_none(), "table already open");
        self.open = Some(TablePayload::new(table, Vec::new(), Vec::new()));
        Ok(())
    }

    fn write_columns(&mut self, columns: &[String]) -> Result<()> {
        self.open.as_mut().expect("no open table").columns = columns.to_vec();
        Ok(())
    }

    fn write_records(&mut self, records: &[Record]) -> Result<()> {
        self.batches.push(records.len());
        self.open
            .as_mut()
            .expect("no open table")
            .records
            .extend_from_slice(records);
        Ok(())
    }

    fn end_table(&mut self) -> Result<()> {
        let table = self.open.take().expect("no open table");
        self.tables.push(table);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
