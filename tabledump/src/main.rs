//! Table data dump and restore tool.
//!
//! This binary exports the contents of a relational database's tables to
//! portable JSON files and restores them into an existing schema.
//!
//! # Guarantees
//! - Dumps use read-only connections
//! - Each restored file is applied in a single transaction
//! - No credentials stored or logged

use clap::Parser;
use tabledump::Cli;
use tabledump_core::{Result, logging::init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet)?;

    tabledump::run(&cli).await
}
