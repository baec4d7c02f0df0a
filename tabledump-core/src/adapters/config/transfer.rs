//! Dump and load configuration.

use crate::error::TableDumpError;
use crate::selector::TableFilter;
use serde::{Deserialize, Serialize};

/// Rows fetched per page when none is configured.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Records per multi-row INSERT when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for the dump engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Maximum rows read per page; bounds memory per table
    pub page_size: u64,
    /// Include/exclude lists applied after bookkeeping tables are removed
    pub filter: TableFilter,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            filter: TableFilter::default(),
        }
    }
}

impl DumpConfig {
    /// Validates dump configuration.
    ///
    /// # Errors
    /// Returns error if page size is zero
    pub fn validate(&self) -> crate::Result<()> {
        if self.page_size == 0 {
            return Err(TableDumpError::configuration(
                "page_size must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_filter(mut self, filter: TableFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Configuration for the load engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Clear each table before inserting (disabled by `--no-truncate`)
    pub truncate: bool,
    /// Records per multi-row INSERT statement
    pub batch_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            truncate: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl LoadConfig {
    /// Validates load configuration.
    ///
    /// # Errors
    /// Returns error if batch size is zero
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 {
            return Err(TableDumpError::configuration(
                "batch_size must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}
