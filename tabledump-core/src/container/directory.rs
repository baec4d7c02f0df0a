//! Directory layout: one dump document per table.

use super::{FileWriter, JSON_EXTENSION, JsonSink, TableSink, ZSTD_EXTENSION};
use crate::Result;
use crate::error::TableDumpError;
use crate::models::Record;
use std::path::{Path, PathBuf};

/// File name used for a table's dump inside a directory.
///
/// # Errors
/// Rejects names that cannot be a plain file name, including names starting
/// with a dot, which the loader would skip.
pub fn table_file_name(table: &str, compress: bool) -> Result<String> {
    let unusable = table.is_empty()
        || table.starts_with('.')
        || table.contains(['/', '\\', '\0']);
    if unusable {
        return Err(TableDumpError::configuration(format!(
            "table name '{}' cannot be used as a file name",
            table
        )));
    }
    let extension = if compress { ZSTD_EXTENSION } else { JSON_EXTENSION };
    Ok(format!("{}{}", table, extension))
}

/// Writes each table to its own `<dir>/<table>.json[.zst]` file.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    compress: bool,
    current: Option<JsonSink<FileWriter>>,
    files: Vec<PathBuf>,
}

impl DirectorySink {
    /// Creates the directory if needed.
    pub fn create(dir: &Path, compress: bool) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            TableDumpError::io(format!("Failed to create directory {}", dir.display()), e)
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            compress,
            current: None,
            files: Vec::new(),
        })
    }

    /// Files written so far, in table order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn current(&mut self) -> Result<&mut JsonSink<FileWriter>> {
        self.current
            .as_mut()
            .ok_or_else(|| TableDumpError::configuration("no table is open"))
    }
}

impl TableSink for DirectorySink {
    fn begin_table(&mut self, table: &str) -> Result<()> {
        if self.current.is_some() {
            return Err(TableDumpError::configuration(
                "begin_table called while another table is open",
            ));
        }
        let path = self.dir.join(table_file_name(table, self.compress)?);
        let mut sink = JsonSink::new(FileWriter::create(&path, self.compress)?);
        sink.begin_table(table)?;
        self.current = Some(sink);
        self.files.push(path);
        Ok(())
    }

    fn write_columns(&mut self, columns: &[String]) -> Result<()> {
        self.current()?.write_columns(columns)
    }

    fn write_records(&mut self, records: &[Record]) -> Result<()> {
        self.current()?.write_records(records)
    }

    fn end_table(&mut self) -> Result<()> {
        let mut sink = self
            .current
            .take()
            .ok_or_else(|| TableDumpError::configuration("end_table called with no open table"))?;
        sink.end_table()?;
        sink.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if self.current.is_some() {
            return Err(TableDumpError::configuration(
                "finish called while a table is open",
            ));
        }
        Ok(())
    }
}

/// Lists the dump files of a directory in name order.
///
/// Dotfiles (including the manifest) and subdirectories are skipped.
pub fn dump_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        TableDumpError::io(format!("Failed to read directory {}", dir.display()), e)
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            TableDumpError::io(format!("Failed to read directory {}", dir.display()), e)
        })?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let path = entry.path();
        if hidden || !path.is_file() {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}
