//! Configuration types for database adapters and the transfer engines.
//!
//! - `ConnectionConfig`: Database connection settings
//! - `DumpConfig`: Page size and table selection for dumps
//! - `LoadConfig`: Truncation and insert batching for restores
//!
//! # Security
//! These configuration structs intentionally do NOT store passwords or credentials.

mod connection;
mod transfer;

pub use connection::ConnectionConfig;
pub use transfer::{DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE, DumpConfig, LoadConfig};
