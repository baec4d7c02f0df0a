//! Serialization container for dumped tables.
//!
//! A dump is a JSON object mapping each table name to either
//! `{"columns": [...], "records": [[...], ...]}` or `{}` for a table that
//! held no rows. It is written to a single file or to a directory holding
//! one file per table, optionally zstd-compressed.
//!
//! # Module Structure
//! - `json`: Streaming JSON writer and document reader
//! - `directory`: Per-table file layout and directory listing

mod directory;
mod json;

pub use directory::{DirectorySink, dump_files, table_file_name};
pub use json::{JsonSink, JsonSource};

use crate::Result;
use crate::error::TableDumpError;
use crate::models::{Record, TablePayload};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File extension of an uncompressed dump file.
pub const JSON_EXTENSION: &str = ".json";

/// File extension of a zstd-compressed dump file.
pub const ZSTD_EXTENSION: &str = ".json.zst";

#[cfg(feature = "compression")]
const ZSTD_LEVEL: i32 = 3;

/// Receives tables from the dump engine as they are read.
///
/// Calls arrive as `begin_table`, then optionally `write_columns` followed
/// by any number of `write_records`, then `end_table`. A table that never
/// receives `write_columns` is written as the "no data" marker.
pub trait TableSink {
    fn begin_table(&mut self, table: &str) -> Result<()>;

    fn write_columns(&mut self, columns: &[String]) -> Result<()>;

    fn write_records(&mut self, records: &[Record]) -> Result<()>;

    fn end_table(&mut self) -> Result<()>;

    /// Flushes and closes the output. No calls may follow.
    fn finish(&mut self) -> Result<()>;
}

/// Hands tables to the load engine in file order.
pub trait TableSource {
    fn next_table(&mut self) -> Result<Option<TablePayload>>;
}

impl TableSource for std::vec::IntoIter<TablePayload> {
    fn next_table(&mut self) -> Result<Option<TablePayload>> {
        Ok(self.next())
    }
}

/// Whether a dump lives in one file or one file per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    File,
    Directory,
}

/// Where a dump is written to or read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTarget {
    pub layout: Layout,
    pub path: PathBuf,
}

impl DumpTarget {
    /// Resolves a user-supplied path.
    ///
    /// Existing directories and paths ending in a separator use the
    /// directory layout; everything else is a single file.
    pub fn resolve(raw: &str) -> Self {
        let path = PathBuf::from(raw);
        let trailing_separator = raw.ends_with('/') || raw.ends_with(std::path::MAIN_SEPARATOR);
        let layout = if trailing_separator || path.is_dir() {
            Layout::Directory
        } else {
            Layout::File
        };
        Self { layout, path }
    }

    pub fn is_directory(&self) -> bool {
        self.layout == Layout::Directory
    }

    /// Opens a sink writing to this target.
    pub fn create_sink(&self, compress: bool) -> Result<Box<dyn TableSink>> {
        match self.layout {
            Layout::File => Ok(Box::new(create_file_sink(&self.path, compress)?)),
            Layout::Directory => Ok(Box::new(DirectorySink::create(&self.path, compress)?)),
        }
    }
}

/// True when the path names a compressed dump file.
pub fn is_compressed_path(path: &Path) -> bool {
    path.to_string_lossy().ends_with(ZSTD_EXTENSION)
}

/// A writer whose stream needs an explicit end, such as a compression frame.
pub trait FinishWrite: Write {
    fn finish_stream(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl FinishWrite for Vec<u8> {}

/// Buffered output file, optionally zstd-compressed.
pub enum FileWriter {
    Plain(BufWriter<File>),
    #[cfg(feature = "compression")]
    Zstd(zstd::Encoder<'static, BufWriter<File>>),
}

impl FileWriter {
    /// Creates (or truncates) `path` for writing.
    pub fn create(path: &Path, compress: bool) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            TableDumpError::io(format!("Failed to create {}", path.display()), e)
        })?;
        let buffered = BufWriter::new(file);

        if compress {
            #[cfg(feature = "compression")]
            {
                let encoder = zstd::Encoder::new(buffered, ZSTD_LEVEL).map_err(|e| {
                    TableDumpError::configuration(format!("Failed to create compressor: {}", e))
                })?;
                return Ok(Self::Zstd(encoder));
            }

            #[cfg(not(feature = "compression"))]
            {
                return Err(compression_unavailable());
            }
        }

        Ok(Self::Plain(buffered))
    }
}

impl std::fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("FileWriter::Plain"),
            #[cfg(feature = "compression")]
            Self::Zstd(_) => f.write_str("FileWriter::Zstd"),
        }
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            #[cfg(feature = "compression")]
            Self::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            #[cfg(feature = "compression")]
            Self::Zstd(w) => w.flush(),
        }
    }
}

impl FinishWrite for FileWriter {
    fn finish_stream(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            #[cfg(feature = "compression")]
            Self::Zstd(w) => {
                w.do_finish()?;
                w.get_mut().flush()
            }
        }
    }
}

/// Opens a single-file sink at `path`.
pub fn create_file_sink(path: &Path, compress: bool) -> Result<JsonSink<FileWriter>> {
    Ok(JsonSink::new(FileWriter::create(path, compress)?))
}

/// Opens and parses a dump file, decompressing `.json.zst` files.
///
/// # Errors
/// Returns a format error for malformed or truncated content.
pub fn open_file_source(path: &Path) -> Result<JsonSource> {
    let file = File::open(path)
        .map_err(|e| TableDumpError::io(format!("Failed to open {}", path.display()), e))?;

    if is_compressed_path(path) {
        #[cfg(feature = "compression")]
        {
            let decoder = zstd::Decoder::new(file).map_err(|e| {
                TableDumpError::io(format!("Failed to decompress {}", path.display()), e)
            })?;
            return JsonSource::from_reader(BufReader::new(decoder));
        }

        #[cfg(not(feature = "compression"))]
        {
            return Err(compression_unavailable());
        }
    }

    JsonSource::from_reader(BufReader::new(file))
}

#[cfg(not(feature = "compression"))]
fn compression_unavailable() -> TableDumpError {
    TableDumpError::configuration(
        "zstd support not available; rebuild with the 'compression' feature",
    )
}
