//! MySQL column types to column kinds.
//!
//! MySQL has no boolean type: `BOOL` and `BOOLEAN` are aliases for
//! `TINYINT(1)`, and the display width is the only trace left of them.
//! Byte-string types are binary.

use crate::models::ColumnKind;

/// Maps an `information_schema.COLUMNS.COLUMN_TYPE` value to a column kind.
pub fn column_kind(column_type: &str) -> ColumnKind {
    let column_type = column_type.trim().to_lowercase();
    match column_type.as_str() {
        "tinyint(1)" | "tinyint(1) unsigned" | "bool" | "boolean" => ColumnKind::Boolean,
        t if t.ends_with("blob")
            || t.starts_with("binary")
            || t.starts_with("varbinary")
            || t.starts_with("bit") =>
        {
            ColumnKind::Binary
        }
        _ => ColumnKind::Opaque,
    }
}
