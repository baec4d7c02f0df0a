//! Dump engine: reads selected tables page by page into a [`TableSink`].
//!
//! Each table is scanned with ordered offset/limit queries, so at most one
//! page of records is held in memory at a time.

use crate::Result;
use crate::adapters::{DatabaseAdapter, DumpConfig};
use crate::codec;
use crate::container::TableSink;
use crate::error::TableDumpError;
use crate::logging::QuietScope;
use crate::models::{ColumnInfo, DumpSummary, Page, TableDumpSummary};
use crate::selector::{self, BOOKKEEPING_TABLES};
use futures::{Stream, TryStreamExt, pin_mut};
use tracing::{debug, info};

/// Everything needed to scan one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePlan {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub sort_keys: Vec<String>,
    pub row_count: u64,
}

impl TablePlan {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Number of pages a scan yields: `ceil(row_count / page_size)`.
    pub fn page_count(&self, page_size: u64) -> u64 {
        if page_size == 0 {
            return 0;
        }
        self.row_count.div_ceil(page_size)
    }
}

/// Reads table data through a [`DatabaseAdapter`].
pub struct DumpEngine<'a> {
    adapter: &'a dyn DatabaseAdapter,
    config: DumpConfig,
}

impl std::fmt::Debug for DumpEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpEngine")
            .field("database_type", &self.adapter.database_type())
            .field("config", &self.config)
            .finish()
    }
}

impl<'a> DumpEngine<'a> {
    /// Creates an engine after validating `config`.
    pub fn new(adapter: &'a dyn DatabaseAdapter, config: DumpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { adapter, config })
    }

    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    /// Tables a dump would visit, in dump order.
    pub async fn tables(&self) -> Result<Vec<String>> {
        let all_tables = self.adapter.list_tables().await?;
        Ok(selector::select_tables(
            &all_tables,
            &self.config.filter,
            BOOKKEEPING_TABLES,
        ))
    }

    /// Collects columns, sort keys and row count for a table.
    pub async fn plan_table(&self, table: &str) -> Result<TablePlan> {
        let columns = self.adapter.columns(table).await?;
        let sort_keys = selector::sort_keys(&columns);
        let row_count = self.adapter.row_count(table).await?;
        Ok(TablePlan {
            table: table.to_string(),
            columns,
            sort_keys,
            row_count,
        })
    }

    /// Dumps every selected table, then finishes the sink.
    pub async fn dump(&self, sink: &mut dyn TableSink) -> Result<DumpSummary> {
        let tables = self.tables().await?;
        info!("Dumping {} tables", tables.len());

        let mut summary = DumpSummary::default();
        {
            let _quiet = QuietScope::acquire();
            for table in &tables {
                sink.begin_table(table)?;
                let table_summary = self.dump_table(sink, table).await?;
                sink.end_table()?;
                info!(
                    "Dumped {} rows from '{}' in {} pages",
                    table_summary.row_count, table, table_summary.pages
                );
                summary.tables.push(table_summary);
            }
        }

        sink.finish()?;
        info!(
            "Dump complete: {} rows from {} tables",
            summary.total_rows(),
            summary.tables.len()
        );
        Ok(summary)
    }

    /// Writes one table's columns and records to an open sink entry.
    ///
    /// An empty table writes nothing, leaving the "no data" marker.
    pub async fn dump_table(
        &self,
        sink: &mut dyn TableSink,
        table: &str,
    ) -> Result<TableDumpSummary> {
        let plan = self.plan_table(table).await?;
        let mut summary = TableDumpSummary {
            table: plan.table.clone(),
            columns: plan.columns.clone(),
            sort_keys: plan.sort_keys.clone(),
            row_count: 0,
            pages: 0,
        };

        if plan.row_count == 0 {
            debug!("Table '{}' is empty", table);
            return Ok(summary);
        }

        sink.write_columns(&plan.column_names())?;

        let pages = self.each_page(&plan);
        pin_mut!(pages);
        while let Some(page) = pages.try_next().await? {
            debug!(
                "Page {} of '{}' at offset {}: {} rows",
                page.index,
                table,
                page.offset,
                page.records.len()
            );
            sink.write_records(&page.records)?;
            summary.pages += 1;
            summary.row_count += page.records.len() as u64;
        }

        Ok(summary)
    }

    /// Lazily yields the pages of a planned table.
    ///
    /// Exactly `plan.page_count(page_size)` pages are read; every page but
    /// the last holds `page_size` records. Boolean columns are normalized.
    pub fn each_page<'s>(&'s self, plan: &'s TablePlan) -> impl Stream<Item = Result<Page>> + 's {
        let page_size = self.config.page_size;
        let page_count = plan.page_count(page_size);

        futures::stream::try_unfold(0u64, move |index| async move {
            if index >= page_count {
                return Ok(None);
            }
            let offset = index * page_size;
            let records = self
                .adapter
                .select_page(&plan.table, &plan.columns, &plan.sort_keys, offset, page_size)
                .await?
                .into_iter()
                .map(|record| codec::normalize_record(&plan.columns, record))
                .collect();
            let page = Page {
                index,
                offset,
                records,
            };
            Ok::<_, TableDumpError>(Some((page, index + 1)))
        })
    }
}
