//! Load engine: restores dumped tables inside one transaction per source.
//!
//! For every table the engine clears existing rows (TRUNCATE, falling back
//! to DELETE when the engine refuses), inserts the records in multi-row
//! batches and repairs the primary-key sequence where the engine has one.
//! Any error rolls the whole source back.

use crate::Result;
use crate::adapters::{AdapterFeature, AdapterTransaction, DatabaseAdapter, LoadConfig};
use crate::container::{self, TableSource};
use crate::error::TableDumpError;
use crate::logging::QuietScope;
use crate::models::{ClearStrategy, LoadSummary, TableLoadSummary, TablePayload};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Files restored by a directory load, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryLoadReport {
    pub loaded: Vec<(PathBuf, LoadSummary)>,
}

impl DirectoryLoadReport {
    pub fn total_rows(&self) -> u64 {
        self.loaded.iter().map(|(_, s)| s.total_rows()).sum()
    }
}

/// Writes dumped tables through a [`DatabaseAdapter`].
pub struct LoadEngine<'a> {
    adapter: &'a dyn DatabaseAdapter,
    config: LoadConfig,
}

impl std::fmt::Debug for LoadEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadEngine")
            .field("database_type", &self.adapter.database_type())
            .field("config", &self.config)
            .finish()
    }
}

impl<'a> LoadEngine<'a> {
    /// Creates an engine after validating `config`.
    pub fn new(adapter: &'a dyn DatabaseAdapter, config: LoadConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { adapter, config })
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Restores every table of `source` in a single transaction.
    ///
    /// # Errors
    /// Any failure, including malformed input, rolls back every table of
    /// this source and is returned unchanged.
    pub async fn load(&self, source: &mut dyn TableSource) -> Result<LoadSummary> {
        let _quiet = QuietScope::acquire();
        let mut tx = self.adapter.begin().await?;

        match self.load_tables(tx.as_mut(), source).await {
            Ok(summary) => {
                tx.commit().await?;
                info!(
                    "Restored {} rows into {} tables",
                    summary.total_rows(),
                    summary.tables.len()
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_error);
                }
                Err(e)
            }
        }
    }

    async fn load_tables(
        &self,
        tx: &mut dyn AdapterTransaction,
        source: &mut dyn TableSource,
    ) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();
        while let Some(payload) = source.next_table()? {
            summary.tables.push(self.load_table(tx, &payload).await?);
        }
        Ok(summary)
    }

    /// Restores one table inside an open transaction.
    pub async fn load_table(
        &self,
        tx: &mut dyn AdapterTransaction,
        payload: &TablePayload,
    ) -> Result<TableLoadSummary> {
        payload.validate()?;
        let table = payload.table.as_str();

        let cleared = if self.config.truncate {
            self.clear_table(tx, table).await?
        } else {
            ClearStrategy::Kept
        };

        let mut rows_inserted = 0u64;
        if payload.has_no_data() {
            debug!("Table '{}' was dumped without data", table);
        } else {
            for batch in payload.records.chunks(self.config.batch_size) {
                rows_inserted += tx.insert_rows(table, &payload.columns, batch).await?;
            }
        }

        let sequence_reset = if self.adapter.supports_feature(AdapterFeature::SequenceReset) {
            match tx.reset_sequence(table).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not reset sequence for '{}': {}", table, e);
                    false
                }
            }
        } else {
            false
        };

        info!("Loaded {} rows into '{}'", rows_inserted, table);
        Ok(TableLoadSummary {
            table: table.to_string(),
            rows_inserted,
            cleared,
            sequence_reset,
        })
    }

    async fn clear_table(
        &self,
        tx: &mut dyn AdapterTransaction,
        table: &str,
    ) -> Result<ClearStrategy> {
        match tx.truncate(table).await {
            Ok(()) => Ok(ClearStrategy::Truncated),
            Err(e) => {
                debug!("Truncate of '{}' failed ({}), deleting rows instead", table, e);
                tx.delete_all(table).await?;
                Ok(ClearStrategy::Deleted)
            }
        }
    }

    /// Restores one dump file in its own transaction.
    pub async fn load_file(&self, path: &Path) -> Result<LoadSummary> {
        info!("Loading {}", path.display());
        let mut source = container::open_file_source(path)?;
        self.load(&mut source).await
    }

    /// Restores every dump file of a directory, one transaction per file.
    ///
    /// Files are loaded in name order and dotfiles are skipped. A failing
    /// file is logged and the remaining files still load.
    ///
    /// # Errors
    /// Returns [`TableDumpError::DirectoryLoad`] naming the failed files if
    /// any file failed.
    pub async fn load_from_directory(&self, dir: &Path) -> Result<DirectoryLoadReport> {
        let files = container::dump_files(dir)?;
        info!("Loading {} files from {}", files.len(), dir.display());

        let mut report = DirectoryLoadReport::default();
        let mut failed = Vec::new();
        for path in &files {
            match self.load_file(path).await {
                Ok(summary) => report.loaded.push((path.clone(), summary)),
                Err(e) => {
                    error!("Failed to load {}: {}", path.display(), e);
                    failed.push(path.display().to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(report)
        } else {
            Err(TableDumpError::DirectoryLoad {
                failed: failed.len(),
                total: files.len(),
                files: failed.join(", "),
            })
        }
    }
}
