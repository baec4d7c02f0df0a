//! Core engine for tabledump: engine-agnostic table data dump and restore.
//!
//! This crate provides the adapters, engines and serialization container
//! shared by the `tabledump` binary.
//!
//! # Guarantees
//! - Data only: schema, triggers and grants are never read or written
//! - Dumps run on read-only connections, one page of records in memory per table
//! - Each restored file is applied inside a single transaction
//! - No credentials stored or logged in any data structures
//!
//! # Architecture
//! - [`adapters`]: one [`DatabaseAdapter`] per engine behind a factory
//! - [`dump`] / [`load`]: engines driving the adapters
//! - [`container`]: JSON file and directory layouts, optionally zstd-compressed

pub mod adapters;
pub mod codec;
pub mod container;
pub mod dump;
pub mod error;
pub mod load;
pub mod logging;
pub mod manifest;
pub mod models;
pub mod selector;

// Re-export commonly used types
pub use adapters::{
    AccessMode, AdapterFeature, AdapterTransaction, ConnectionConfig, DatabaseAdapter,
    DumpConfig, LoadConfig, create_adapter,
};
pub use container::{DumpTarget, Layout, TableSink, TableSource};
pub use dump::{DumpEngine, TablePlan};
pub use error::{Result, TableDumpError};
pub use load::{DirectoryLoadReport, LoadEngine};
pub use manifest::Manifest;
pub use models::{
    ClearStrategy, ColumnInfo, ColumnKind, DatabaseType, DumpSummary, LoadSummary, Page, Record,
    TableDumpSummary, TableLoadSummary, TablePayload,
};
pub use selector::TableFilter;
