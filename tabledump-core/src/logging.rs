//! Shared logging utilities.
//!
//! Provides the subscriber setup used by the `tabledump` binary and the
//! [`QuietScope`] guard that mutes per-statement SQL logging while bulk scans
//! and inserts run.

use crate::Result;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// Directive appended to the active filter while a [`QuietScope`] is held.
const QUIET_DIRECTIVE: &str = "sqlx=warn";

struct FilterControl {
    handle: reload::Handle<EnvFilter, Registry>,
    level: LevelFilter,
}

static FILTER_CONTROL: OnceLock<FilterControl> = OnceLock::new();
static QUIET_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Maps CLI verbosity flags to a tracing level.
///
/// `quiet` wins over any verbosity: 0=INFO, 1=DEBUG, 2+=TRACE.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
///
/// # Example
/// ```rust,no_run
/// use tabledump_core::logging::init_logging;
///
/// init_logging(1, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = LevelFilter::from_level(level_for(verbose, quiet));
    let (filter, handle) = reload::Layer::new(base_filter(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .map_err(|e| {
            crate::error::TableDumpError::configuration(format!(
                "Failed to initialize logging: {}",
                e
            ))
        })?;

    let _ = FILTER_CONTROL.set(FilterControl { handle, level });
    Ok(())
}

fn base_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}

fn quiet_filter(level: LevelFilter) -> EnvFilter {
    let filter = base_filter(level);
    match QUIET_DIRECTIVE.parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

fn apply_filter(quiet: bool) {
    let Some(control) = FILTER_CONTROL.get() else {
        return;
    };
    let filter = if quiet {
        quiet_filter(control.level)
    } else {
        base_filter(control.level)
    };
    if let Err(e) = control.handle.reload(filter) {
        tracing::debug!("Failed to swap log filter: {}", e);
    }
}

/// Scoped "quiet" output mode for bulk operations.
///
/// While at least one scope is alive, SQL statement logging from the driver
/// is capped at WARN. Dropping the last scope restores the original filter,
/// whether the guarded operation succeeded or failed. Scopes nest.
#[must_use = "logging is restored as soon as the scope is dropped"]
#[derive(Debug)]
pub struct QuietScope {
    _private: (),
}

impl QuietScope {
    /// Enters quiet mode until the returned guard is dropped.
    pub fn acquire() -> Self {
        if QUIET_DEPTH.fetch_add(1, Ordering::SeqCst) == 0 {
            apply_filter(true);
        }
        Self { _private: () }
    }

    /// Whether any quiet scope is currently held.
    pub fn is_active() -> bool {
        QUIET_DEPTH.load(Ordering::SeqCst) > 0
    }
}

impl Drop for QuietScope {
    fn drop(&mut self) {
        if QUIET_DEPTH.fetch_sub(1, Ordering::SeqCst) == 1 {
            apply_filter(false);
        }
    }
}
