//! Table selection and row ordering.
//!
//! Decides which tables a dump visits, in which order, and which columns
//! order each table's rows so that offset/limit pages line up.

use crate::models::ColumnInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Migration trackers of common frameworks. Never dumped or listed.
pub const BOOKKEEPING_TABLES: &[&str] = &[
    "schema_migrations",
    "schema_info",
    "ar_internal_metadata",
    "_sqlx_migrations",
    "__diesel_schema_migrations",
];

/// Include/exclude lists for a dump.
///
/// An empty `include` list means every table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl TableFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Builds a filter from raw `a,b` / `a:b` configuration strings.
    pub fn from_lists(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include: include.map(Self::parse_list).unwrap_or_default(),
            exclude: exclude.map(Self::parse_list).unwrap_or_default(),
        }
    }

    /// Splits a list on `:` or `,`, trimming entries and dropping empty ones.
    ///
    /// # Example
    /// ```rust
    /// use tabledump_core::selector::TableFilter;
    ///
    /// assert_eq!(TableFilter::parse_list("users, posts:tags"), vec!["users", "posts", "tags"]);
    /// ```
    pub fn parse_list(raw: &str) -> Vec<String> {
        raw.split([':', ','])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Computes the ordered list of tables to dump.
///
/// The candidate set is `filter.include` when non-empty, otherwise
/// `all_tables`. Ignored and excluded tables are removed, and names missing
/// from `all_tables` are dropped without error. The result is sorted and
/// free of duplicates.
pub fn select_tables(all_tables: &[String], filter: &TableFilter, ignored: &[&str]) -> Vec<String> {
    let existing: BTreeSet<&str> = all_tables.iter().map(String::as_str).collect();

    let candidates: BTreeSet<&str> = if filter.include.is_empty() {
        existing.clone()
    } else {
        filter
            .include
            .iter()
            .map(String::as_str)
            .filter(|name| {
                let found = existing.contains(name);
                if !found {
                    tracing::debug!("Included table '{}' does not exist, skipping", name);
                }
                found
            })
            .collect()
    };

    candidates
        .into_iter()
        .filter(|name| !ignored.contains(name))
        .filter(|name| !filter.exclude.iter().any(|excluded| excluded == name))
        .map(str::to_string)
        .collect()
}

/// Chooses the columns that order a table's rows for paging.
///
/// Join tables whose first two columns are both `*_id` are ordered by that
/// pair; every other table by its first column. A key is not guaranteed to
/// be unique, so tied rows may straddle a page boundary in engine order.
pub fn sort_keys(columns: &[ColumnInfo]) -> Vec<String> {
    match columns {
        [] => Vec::new(),
        [first, second, ..] if first.name.ends_with("_id") && second.name.ends_with("_id") => {
            vec![first.name.clone(), second.name.clone()]
        }
        [first, ..] => vec![first.name.clone()],
    }
}
