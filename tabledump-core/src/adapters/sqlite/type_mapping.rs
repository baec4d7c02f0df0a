//! SQLite declared types to column kinds.
//!
//! SQLite has no boolean storage class. Booleans are stored as integers and
//! only the declared column type (`BOOLEAN`, `BOOL`, ...) tells them apart,
//! so the declaration is the sole signal used here. Columns with BLOB
//! affinity (a declared type containing `BLOB`, or none at all) are binary.

use crate::models::{ColumnInfo, ColumnKind};

/// Maps a declared SQLite column type to a column kind.
///
/// # Example
/// ```rust
/// use tabledump_core::adapters::sqlite::column_kind;
/// use tabledump_core::models::ColumnKind;
///
/// assert_eq!(column_kind("BOOLEAN"), ColumnKind::Boolean);
/// assert_eq!(column_kind("INTEGER"), ColumnKind::Opaque);
/// ```
pub fn column_kind(declared_type: &str) -> ColumnKind {
    let declared = declared_type.trim().to_uppercase();
    if declared.starts_with("BOOL") {
        ColumnKind::Boolean
    } else if declared.is_empty() || declared.contains("BLOB") {
        ColumnKind::Binary
    } else {
        ColumnKind::Opaque
    }
}

/// Builds a column description from a `pragma_table_info` row.
pub(crate) fn column_info(name: String, declared_type: String) -> ColumnInfo {
    let kind = column_kind(&declared_type);
    ColumnInfo {
        name,
        data_type: declared_type,
        kind,
    }
}
