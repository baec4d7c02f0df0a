//! Dump manifest: a sidecar JSON file describing what a dump contains.
//!
//! The manifest is informational. Loads never need it, and in a directory
//! dump it is a dotfile so the loader skips it.

use crate::Result;
use crate::container::{DumpTarget, Layout};
use crate::error::TableDumpError;
use crate::models::{ColumnKind, DatabaseType, DumpSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current manifest format version.
pub const FORMAT_VERSION: &str = "1.0";

/// Manifest file name inside a directory dump.
pub const DIRECTORY_MANIFEST: &str = ".manifest.json";

/// One dumped column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestColumn {
    pub name: String,
    pub data_type: String,
    pub kind: ColumnKind,
}

/// One dumped table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTable {
    pub name: String,
    pub columns: Vec<ManifestColumn>,
    pub sort_keys: Vec<String>,
    pub row_count: u64,
    pub pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: String,
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    pub database_type: DatabaseType,
    pub layout: Layout,
    pub compressed: bool,
    pub page_size: u64,
    pub tables: Vec<ManifestTable>,
}

impl Manifest {
    /// Builds a manifest from a finished dump.
    pub fn from_summary(
        summary: &DumpSummary,
        database_type: DatabaseType,
        layout: Layout,
        compressed: bool,
        page_size: u64,
    ) -> Self {
        let tables = summary
            .tables
            .iter()
            .map(|table| ManifestTable {
                name: table.table.clone(),
                columns: table
                    .columns
                    .iter()
                    .map(|c| ManifestColumn {
                        name: c.name.clone(),
                        data_type: c.data_type.clone(),
                        kind: c.kind,
                    })
                    .collect(),
                sort_keys: table.sort_keys.clone(),
                row_count: table.row_count,
                pages: table.pages,
            })
            .collect();

        Self {
            format_version: FORMAT_VERSION.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            database_type,
            layout,
            compressed,
            page_size,
            tables,
        }
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.row_count).sum()
    }

    /// Writes the manifest as pretty-printed JSON.
    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| TableDumpError::serialization("Failed to encode manifest", e))?;
        tokio::fs::write(path, json).await.map_err(|e| {
            TableDumpError::io(format!("Failed to write manifest {}", path.display()), e)
        })
    }

    pub async fn read(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            TableDumpError::io(format!("Failed to read manifest {}", path.display()), e)
        })?;
        serde_json::from_str(&json).map_err(|e| TableDumpError::format(e.to_string()))
    }
}

/// Where the manifest of a dump target lives.
///
/// `<dir>/.manifest.json` for directories, `<file>.manifest.json` otherwise.
pub fn manifest_path(target: &DumpTarget) -> PathBuf {
    match target.layout {
        Layout::Directory => target.path.join(DIRECTORY_MANIFEST),
        Layout::File => {
            let mut name = target.path.as_os_str().to_os_string();
            name.push(".manifest.json");
            PathBuf::from(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnInfo, TableDumpSummary};
    use tempfile::TempDir;

    fn summary() -> DumpSummary {
        DumpSummary {
            tables: vec![TableDumpSummary {
                table: "users".to_string(),
                columns: vec![
                    ColumnInfo::new("id", "integer"),
                    ColumnInfo::boolean("active", "boolean"),
                ],
                sort_keys: vec!["id".to_string()],
                row_count: 3,
                pages: 1,
            }],
        }
    }

    #[test]
    fn test_manifest_paths() {
        let file = DumpTarget {
            layout: Layout::File,
            path: PathBuf::from("out/dump.json"),
        };
        assert_eq!(manifest_path(&file), PathBuf::from("out/dump.json.manifest.json"));

        let dir = DumpTarget {
            layout: Layout::Directory,
            path: PathBuf::from("out"),
        };
        assert_eq!(manifest_path(&dir), PathBuf::from("out/.manifest.json"));
    }

    #[tokio::test]
    async fn test_manifest_write_and_read() {
        let manifest =
            Manifest::from_summary(&summary(), DatabaseType::SQLite, Layout::File, false, 500);
        assert_eq!(manifest.total_rows(), 3);
        assert_eq!(manifest.tables[0].columns[1].kind, ColumnKind::Boolean);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.json.manifest.json");
        manifest.write(&path).await.unwrap();

        let read_back = Manifest::read(&path).await.unwrap();
        assert_eq!(read_back, manifest);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["format_version"], "1.0");
        assert_eq!(raw["layout"], "file");
        assert_eq!(raw["tables"][0]["columns"][1]["kind"], "boolean");
    }
}
