//! Core data models for table dumps.
//!
//! Records are positional: a record is a list of values aligned 1:1 with the
//! column-name list of its table, so column names are stored once per table
//! rather than once per row.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseType::MySQL => write!(f, "MySQL"),
            DatabaseType::SQLite => write!(f, "SQLite"),
        }
    }
}

/// How the dump engine treats a column's values.
///
/// Booleans are normalized and binary values travel as base64 text; every
/// other type passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Boolean,
    Binary,
    Opaque,
}

/// A column as reported by the database adapter, in engine order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Engine-specific type name, kept for the manifest and logs
    pub data_type: String,
    pub kind: ColumnKind,
}

impl ColumnInfo {
    /// Creates a column with an opaque (pass-through) type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            kind: ColumnKind::Opaque,
        }
    }

    /// Creates a boolean column.
    pub fn boolean(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            kind: ColumnKind::Boolean,
        }
    }

    /// Creates a column holding raw bytes.
    pub fn binary(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            kind: ColumnKind::Binary,
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == ColumnKind::Boolean
    }

    pub fn is_binary(&self) -> bool {
        self.kind == ColumnKind::Binary
    }
}

/// One row, positionally aligned with its table's column list.
pub type Record = Vec<JsonValue>;

/// A bounded batch of records read by one offset/limit scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Zero-based page number within the table
    pub index: u64,
    /// Row offset the page was read from
    pub offset: u64,
    pub records: Vec<Record>,
}

/// Serialized form of one table: its column names and records.
///
/// An empty column list marks a table that was dumped with no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePayload {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl TablePayload {
    pub fn new(table: impl Into<String>, columns: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            table: table.into(),
            columns,
            records,
        }
    }

    /// True for the explicit "no data" marker (no declared columns).
    pub fn has_no_data(&self) -> bool {
        self.columns.is_empty()
    }

    /// Checks the payload's structural invariants.
    ///
    /// # Errors
    /// Returns a format error if records exist without columns or any record's
    /// length differs from the column count.
    pub fn validate(&self) -> crate::Result<()> {
        if self.columns.is_empty() {
            if self.records.is_empty() {
                return Ok(());
            }
            return Err(crate::error::TableDumpError::format(format!(
                "table '{}' has {} records but no column list",
                self.table,
                self.records.len()
            )));
        }

        for (position, record) in self.records.iter().enumerate() {
            if record.len() != self.columns.len() {
                return Err(crate::error::TableDumpError::format(format!(
                    "record {} of table '{}' has {} values, expected {}",
                    position,
                    self.table,
                    record.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }
}

/// What the dump engine wrote for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDumpSummary {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub sort_keys: Vec<String>,
    pub row_count: u64,
    pub pages: u64,
}

/// Result of a whole-database dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpSummary {
    pub tables: Vec<TableDumpSummary>,
}

impl DumpSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.row_count).sum()
    }
}

/// How existing rows were removed before a table was restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearStrategy {
    /// Existing rows were kept (`--no-truncate`)
    Kept,
    Truncated,
    /// Truncate was rejected and rows were deleted instead
    Deleted,
}

/// What the load engine did for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLoadSummary {
    pub table: String,
    pub rows_inserted: u64,
    pub cleared: ClearStrategy,
    pub sequence_reset: bool,
}

/// Result of loading one source (one file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub tables: Vec<TableLoadSummary>,
}

impl LoadSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_inserted).sum()
    }
}
