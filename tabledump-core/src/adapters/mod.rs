//! Database adapter traits and factory for engine-agnostic table access.
//!
//! The dump and load engines never talk to a database directly. Everything
//! they need (listing tables, reading pages, bound inserts, transactions) is
//! expressed as a capability on [`DatabaseAdapter`] or [`AdapterTransaction`],
//! and every engine-specific quirk stays behind these traits.
//!
//! # Module Structure
//! - `config`: Configuration types (ConnectionConfig, DumpConfig, LoadConfig)
//! - `helpers`: Shared helper utilities
//! - Database-specific modules (postgres, mysql, sqlite)

use crate::Result;
use crate::models::{ColumnInfo, DatabaseType, Record};
use async_trait::async_trait;

// Configuration module
pub mod config;

// Re-export configuration types for convenience
pub use config::{ConnectionConfig, DumpConfig, LoadConfig};

/// Features that database adapters may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterFeature {
    /// Fast table truncation inside a transaction
    Truncate,
    /// Primary-key sequence / auto-increment repair after a load
    SequenceReset,
    /// Transactional writes with rollback
    Transactions,
    /// Read-only connection enforcement
    ReadOnlyMode,
}

/// Whether an adapter may write to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Dumps only ever read
    ReadOnly,
    #[default]
    ReadWrite,
}

/// Main trait for database adapters with object-safe design.
///
/// # Object Safety
/// This trait is object-safe, allowing for dynamic dispatch through
/// `Box<dyn DatabaseAdapter>` or `&dyn DatabaseAdapter`.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Tests the database connection.
    ///
    /// # Errors
    /// Returns error if connection fails or times out
    async fn test_connection(&self) -> Result<()>;

    /// Returns the database type this adapter handles.
    fn database_type(&self) -> DatabaseType;

    /// Checks if the adapter supports a specific feature.
    fn supports_feature(&self, feature: AdapterFeature) -> bool;

    /// Gets the connection configuration (credentials sanitized).
    fn connection_config(&self) -> ConnectionConfig;

    /// Lists user tables. Engine-internal catalogs are never included.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Returns the table's columns in engine-reported order.
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Counts the rows currently in the table.
    async fn row_count(&self, table: &str) -> Result<u64>;

    /// Reads one page of raw records.
    ///
    /// Rows are ordered by `sort_keys` (no ORDER BY when empty), skipped by
    /// `offset`, and capped at `limit`. Every record has one value per entry
    /// of `columns`, in the same order.
    async fn select_page(
        &self,
        table: &str,
        columns: &[ColumnInfo],
        sort_keys: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Record>>;

    /// Quotes an identifier with the engine's rules.
    fn quote_identifier(&self, name: &str) -> String;

    /// Opens a transaction that owns one connection until commit/rollback.
    ///
    /// Dropping the transaction without committing rolls it back.
    async fn begin(&self) -> Result<Box<dyn AdapterTransaction>>;
}

/// Write operations bound to one open transaction.
#[async_trait]
pub trait AdapterTransaction: Send {
    /// Inserts records with multi-row INSERT statements.
    ///
    /// Each record is aligned with `columns`. Values are bound as statement
    /// parameters, converted for the target column types; a batch larger
    /// than the engine's parameter limit is split across statements.
    ///
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    /// Fails on the first rejected statement, or when a value cannot be
    /// converted for its column (e.g. malformed base64 in a binary column).
    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        records: &[Record],
    ) -> Result<u64>;

    /// Removes every row with the engine's fast path.
    ///
    /// # Errors
    /// May fail when the engine or the current privileges do not allow it; a
    /// failed truncate leaves the transaction usable for [`Self::delete_all`].
    async fn truncate(&mut self, table: &str) -> Result<()>;

    /// Removes every row with an unconditional DELETE.
    async fn delete_all(&mut self, table: &str) -> Result<u64>;

    /// Repairs the table's primary-key sequence after explicit-id inserts.
    ///
    /// # Default Implementation
    /// Reports the capability as unsupported.
    async fn reset_sequence(&mut self, _table: &str) -> Result<()> {
        Err(crate::error::TableDumpError::unsupported_feature(
            "sequence reset",
            "this adapter",
        ))
    }

    /// Commits the transaction.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rolls the transaction back.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Factory function to create database adapters based on connection string.
///
/// # Arguments
/// * `connection_string` - Database connection URL (will be sanitized in errors)
/// * `access` - Read-only for dumps, read-write for loads
///
/// # Errors
/// Returns error if:
/// - Connection string format is invalid
/// - Database type is not supported
/// - Required features are not compiled in
pub async fn create_adapter(
    connection_string: &str,
    access: AccessMode,
) -> Result<Box<dyn DatabaseAdapter>> {
    let database_type = detect_database_type(connection_string)?;
    tracing::debug!(
        "Creating {} adapter for {} ({:?})",
        database_type,
        redact_database_url(connection_string),
        access
    );

    match database_type {
        #[cfg(feature = "postgresql")]
        DatabaseType::PostgreSQL => {
            let adapter = postgres::PostgresAdapter::new(connection_string, access).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "postgresql"))]
        DatabaseType::PostgreSQL => Err(crate::error::TableDumpError::unsupported_feature(
            "PostgreSQL adapter",
            "Compile with --features postgresql to enable PostgreSQL support",
        )),
        #[cfg(feature = "mysql")]
        DatabaseType::MySQL => {
            let adapter = mysql::MySqlAdapter::new(connection_string, access).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "mysql"))]
        DatabaseType::MySQL => Err(crate::error::TableDumpError::unsupported_feature(
            "MySQL adapter",
            "Compile with --features mysql to enable MySQL support",
        )),
        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => {
            let adapter = sqlite::SqliteAdapter::new(connection_string, access).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseType::SQLite => Err(crate::error::TableDumpError::unsupported_feature(
            "SQLite adapter",
            "Compile with --features sqlite to enable SQLite support",
        )),
    }
}

/// Safely redacts credentials from database connection URLs.
///
/// Delegates to `crate::error::redact_database_url` for consistency.
#[inline]
pub fn redact_database_url(url: &str) -> String {
    crate::error::redact_database_url(url)
}

/// Detects database type from connection string.
///
/// # Errors
/// Returns error if connection string format is unrecognized
pub fn detect_database_type(connection_string: &str) -> Result<DatabaseType> {
    if connection_string.starts_with("postgres://")
        || connection_string.starts_with("postgresql://")
    {
        Ok(DatabaseType::PostgreSQL)
    } else if connection_string.starts_with("mysql://") {
        Ok(DatabaseType::MySQL)
    } else if connection_string.starts_with("sqlite://")
        || connection_string.starts_with("sqlite:")
        || connection_string == ":memory:"
        || connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        Ok(DatabaseType::SQLite)
    } else {
        Err(crate::error::TableDumpError::configuration(
            "Unrecognized database connection string format",
        ))
    }
}

// Shared helper utilities
pub mod helpers;

// Database-specific adapter modules
#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "sqlite")]
pub mod sqlite;
