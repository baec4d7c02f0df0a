//! Row value normalization and the parameter forms used on restore.
//!
//! Booleans are the one type normalized across engines: engines without a
//! native boolean hand back `1`/`0` or `'t'`/`'f'`, and dumps always store
//! JSON `true`/`false` so any engine can restore them. Binary cells are
//! dumped as `base64:` text and decoded back to bytes for binary columns.
//! Numbers keep their exact decimal text end to end.

use crate::Result;
use crate::error::TableDumpError;
use crate::models::{ColumnInfo, Record};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as JsonValue;

/// Prefix marking a binary value in a dump.
pub const BLOB_PREFIX: &str = "base64:";

/// Coerces a raw boolean column value to a storage boolean.
///
/// True for exactly `"t"`, `"1"`, `true` and integer `1`; false for
/// everything else.
pub fn to_storage_boolean(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => s == "t" || s == "1",
        JsonValue::Number(n) => n.as_i64() == Some(1) || n.as_u64() == Some(1),
        _ => false,
    }
}

/// Normalizes boolean-kind columns of one record in place.
///
/// SQL NULL stays NULL.
pub fn normalize_record(columns: &[ColumnInfo], mut record: Record) -> Record {
    for (column, value) in columns.iter().zip(record.iter_mut()) {
        if column.is_boolean() && !value.is_null() {
            *value = JsonValue::Bool(to_storage_boolean(value));
        }
    }
    record
}

/// Encodes binary cell contents as dump text.
pub fn encode_blob(bytes: &[u8]) -> JsonValue {
    JsonValue::String(format!("{}{}", BLOB_PREFIX, STANDARD.encode(bytes)))
}

/// Decodes text written by [`encode_blob`].
///
/// `None` when `text` does not carry the blob prefix.
pub fn decode_blob(text: &str) -> Option<Result<Vec<u8>>> {
    let encoded = text.strip_prefix(BLOB_PREFIX)?;
    Some(
        STANDARD
            .decode(encoded)
            .map_err(|e| TableDumpError::format(format!("invalid base64 blob value: {}", e))),
    )
}

/// A dumped value in the form it is bound as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Any other number, as its exact decimal text
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
}

impl BindValue {
    /// Converts a dumped value for a column of the target table.
    ///
    /// Blob text becomes bytes only when `binary` is set, so text columns
    /// keep such strings verbatim. Arrays and objects bind as their JSON text.
    ///
    /// # Errors
    /// A format error for malformed base64 in a binary column.
    pub fn from_json(value: &JsonValue, binary: bool) -> Result<Self> {
        Ok(match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Decimal(n.to_string()),
            },
            JsonValue::String(s) if binary => match decode_blob(s) {
                Some(bytes) => Self::Bytes(bytes?),
                None => Self::Text(s.clone()),
            },
            JsonValue::String(s) => Self::Text(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => Self::Text(value.to_string()),
        })
    }
}

/// Converts records for binding; `binary` flags each column.
pub fn bind_rows(records: &[Record], binary: &[bool]) -> Result<Vec<Vec<BindValue>>> {
    records
        .iter()
        .map(|record| {
            record
                .iter()
                .zip(binary)
                .map(|(value, is_binary)| BindValue::from_json(value, *is_binary))
                .collect()
        })
        .collect()
}
