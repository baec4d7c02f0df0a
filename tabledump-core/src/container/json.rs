//! Streaming JSON writer and document reader.
//!
//! The writer emits one record per line so a dump stays diffable and never
//! needs more than one page of records in memory:
//!
//! ```text
//! {
//!   "tags": {},
//!   "users": {
//!     "columns": ["id", "name"],
//!     "records": [
//!       [1, "ada"],
//!       [2, "grace"]
//!     ]
//!   }
//! }
//! ```

use super::{FinishWrite, TableSink, TableSource};
use crate::Result;
use crate::error::TableDumpError;
use crate::models::{Record, TablePayload};
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use std::io::{Read, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableState {
    Closed,
    Open { table: String },
    Writing { table: String, records: u64 },
}

/// Writes a dump document to any [`FinishWrite`] output.
#[derive(Debug)]
pub struct JsonSink<W: FinishWrite> {
    out: W,
    tables: u64,
    state: TableState,
    finished: bool,
}

impl<W: FinishWrite> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            tables: 0,
            state: TableState::Closed,
            finished: false,
        }
    }

    /// Number of tables fully written so far.
    pub fn tables_written(&self) -> u64 {
        self.tables
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(text.as_bytes())
            .map_err(|e| TableDumpError::io("Failed to write dump output", e))
    }

    fn emit_json<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, value).map_err(|e| {
            if e.is_io() {
                TableDumpError::io("Failed to write dump output", e.into())
            } else {
                TableDumpError::serialization("Failed to encode dump value", e)
            }
        })
    }

    fn misuse(&self, call: &str) -> TableDumpError {
        TableDumpError::configuration(format!(
            "{} called out of order (state: {:?})",
            call, self.state
        ))
    }
}

impl<W: FinishWrite> TableSink for JsonSink<W> {
    fn begin_table(&mut self, table: &str) -> Result<()> {
        if self.state != TableState::Closed || self.finished {
            return Err(self.misuse("begin_table"));
        }
        self.emit(if self.tables == 0 { "{\n  " } else { ",\n  " })?;
        self.emit_json(table)?;
        self.emit(": ")?;
        self.state = TableState::Open {
            table: table.to_string(),
        };
        Ok(())
    }

    fn write_columns(&mut self, columns: &[String]) -> Result<()> {
        let TableState::Open { table } = &self.state else {
            return Err(self.misuse("write_columns"));
        };
        let table = table.clone();
        self.emit("{\n    \"columns\": ")?;
        self.emit_json(columns)?;
        self.emit(",\n    \"records\": [")?;
        self.state = TableState::Writing { table, records: 0 };
        Ok(())
    }

    fn write_records(&mut self, records: &[Record]) -> Result<()> {
        let TableState::Writing { records: written, .. } = self.state else {
            return Err(self.misuse("write_records"));
        };
        let mut count = written;
        for record in records {
            self.emit(if count == 0 { "\n      " } else { ",\n      " })?;
            self.emit_json(record)?;
            count += 1;
        }
        if let TableState::Writing { records, .. } = &mut self.state {
            *records = count;
        }
        Ok(())
    }

    fn end_table(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, TableState::Closed) {
            TableState::Open { .. } => self.emit("{}")?,
            TableState::Writing { records: 0, .. } => self.emit("]\n  }")?,
            TableState::Writing { .. } => self.emit("\n    ]\n  }")?,
            TableState::Closed => return Err(self.misuse("end_table")),
        }
        self.tables += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.state != TableState::Closed {
            return Err(self.misuse("finish"));
        }
        self.emit(if self.tables == 0 { "{}\n" } else { "\n}\n" })?;
        self.out
            .finish_stream()
            .map_err(|e| TableDumpError::io("Failed to flush dump output", e))?;
        self.finished = true;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    records: Vec<Record>,
}

/// Top-level document, keeping tables in file order.
struct DumpDocument(Vec<TablePayload>);

impl<'de> Deserialize<'de> for DumpDocument {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = DumpDocument;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("an object mapping table names to table data")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut tables = Vec::new();
                while let Some((table, entry)) = map.next_entry::<String, TableEntry>()? {
                    tables.push(TablePayload::new(table, entry.columns, entry.records));
                }
                Ok(DumpDocument(tables))
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

/// A parsed dump document, yielding tables in file order.
#[derive(Debug)]
pub struct JsonSource {
    tables: std::vec::IntoIter<TablePayload>,
}

impl JsonSource {
    /// Parses a whole document and checks every table's structure.
    ///
    /// # Errors
    /// Returns a format error for malformed JSON, truncated input, non-object
    /// table entries, non-array records or ragged records.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let document: DumpDocument = serde_json::from_reader(reader).map_err(|e| {
            if e.is_io() {
                TableDumpError::io("Failed to read dump input", e.into())
            } else {
                TableDumpError::format(e.to_string())
            }
        })?;

        for payload in &document.0 {
            payload.validate()?;
        }

        Ok(Self {
            tables: document.0.into_iter(),
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(bytes)
    }

    /// Tables not yet handed out.
    pub fn remaining(&self) -> usize {
        self.tables.len()
    }
}

impl TableSource for JsonSource {
    fn next_table(&mut self) -> Result<Option<TablePayload>> {
        Ok(self.tables.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(build: impl FnOnce(&mut JsonSink<Vec<u8>>)) -> String {
        let mut sink = JsonSink::new(Vec::new());
        build(&mut sink);
        sink.finish().unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_writer_layout() {
        let text = render(|sink| {
            sink.begin_table("tags").unwrap();
            sink.end_table().unwrap();
            sink.begin_table("users").unwrap();
            sink.write_columns(&["id".to_string(), "name".to_string()])
                .unwrap();
            sink.write_records(&[vec![json!(1), json!("ada")]]).unwrap();
            sink.write_records(&[vec![json!(2), json!("grace")]]).unwrap();
            sink.end_table().unwrap();
        });

        let expected = "{\n  \"tags\": {},\n  \"users\": {\n    \"columns\": [\"id\",\"name\"],\n    \"records\": [\n      [1,\"ada\"],\n      [2,\"grace\"]\n    ]\n  }\n}\n";
        assert_eq!(text, expected);

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["tags"], json!({}));
        assert_eq!(parsed["users"]["records"][1], json!([2, "grace"]));
    }

    #[test]
    fn test_empty_document_and_columns_without_records() {
        assert_eq!(render(|_| {}), "{}\n");

        let text = render(|sink| {
            sink.begin_table("t").unwrap();
            sink.write_columns(&["a".to_string()]).unwrap();
            sink.end_table().unwrap();
        });
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["t"], json!({"columns": ["a"], "records": []}));
    }

    #[test]
    fn test_out_of_order_calls_are_rejected() {
        let mut sink = JsonSink::new(Vec::new());
        assert!(sink.write_columns(&[]).is_err());
        assert!(sink.end_table().is_err());
        sink.begin_table("t").unwrap();
        assert!(sink.write_records(&[]).is_err());
        assert!(sink.finish().is_err());
    }

    #[test]
    fn test_reader_keeps_file_order() {
        let mut source = JsonSource::from_slice(
            br#"{"zeta": {}, "alpha": {"columns": ["id"], "records": [[1], [2]]}}"#,
        )
        .unwrap();
        assert_eq!(source.remaining(), 2);

        let zeta = source.next_table().unwrap().unwrap();
        assert_eq!(zeta.table, "zeta");
        assert!(zeta.has_no_data());

        let alpha = source.next_table().unwrap().unwrap();
        assert_eq!(alpha.table, "alpha");
        assert_eq!(alpha.records.len(), 2);
        assert!(source.next_table().unwrap().is_none());
    }

    #[test]
    fn test_malformed_documents_are_format_errors() {
        let cases: [&[u8]; 7] = [
            b"",
            b"{\"users\": {\"columns\": [\"id\"], \"records\": [[1]",
            b"[]",
            b"{\"users\": 5}",
            b"{\"users\": {\"columns\": [1]}}",
            b"{\"users\": {\"columns\": [\"id\"], \"records\": [1]}}",
            b"{\"users\": {\"columns\": [\"id\"], \"records\": [[1, 2]]}}",
        ];
        for input in cases {
            let err = JsonSource::from_slice(input).unwrap_err();
            assert!(
                matches!(err, TableDumpError::Format { .. }),
                "{:?} gave {:?}",
                String::from_utf8_lossy(input),
                err
            );
        }
    }
}
