//! Connection settings shared by every adapter.
//!
//! Credentials never enter a [`ConnectionConfig`]; they stay in the
//! connection string handed to the driver.

use crate::Result;
use crate::adapters::AccessMode;
use crate::error::TableDumpError;
use std::time::Duration;
use url::Url;

/// Pool and timeout settings of one adapter.
///
/// # Example
/// ```rust
/// use tabledump_core::adapters::{AccessMode, ConnectionConfig};
///
/// let config = ConnectionConfig::new("db.internal:5432/shop", AccessMode::ReadOnly);
/// assert!(config.is_read_only());
/// assert_eq!(config.to_string(), "db.internal:5432/shop (read-only)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// `host:port/database` for servers, the file name for SQLite
    pub target: String,
    pub access: AccessMode,
    /// Pool acquire timeout
    pub connect_timeout: Duration,
    /// Per-statement timeout, where the engine supports one
    pub query_timeout: Duration,
    /// Idle connection lifetime in the pool
    pub idle_timeout: Duration,
    pub max_connections: u32,
}

impl ConnectionConfig {
    pub fn new(target: impl Into<String>, access: AccessMode) -> Self {
        Self {
            target: target.into(),
            access,
            connect_timeout: Duration::from_secs(30),
            // Full-table scans and bulk inserts on production tables can be slow
            query_timeout: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(600),
            // One table at a time, plus one spare for the open transaction
            max_connections: 2,
        }
    }

    /// Builds the config of a server URL, applying its pool options.
    ///
    /// Recognized query parameters: `connect_timeout` (seconds),
    /// `statement_timeout` (milliseconds) and `pool_max_conns`. Anything else
    /// is left to the driver.
    pub fn from_server_url(url: &Url, default_port: u16, access: AccessMode) -> Self {
        let target = format!(
            "{}:{}/{}",
            url.host_str().unwrap_or("localhost"),
            url.port().unwrap_or(default_port),
            url.path().trim_start_matches('/')
        );
        let mut config = Self::new(target, access);

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "connect_timeout" => {
                    if let Ok(secs) = value.parse::<u64>()
                        && (1..=300).contains(&secs)
                    {
                        config.connect_timeout = Duration::from_secs(secs);
                    }
                }
                "statement_timeout" => {
                    if let Ok(ms) = value.parse::<u64>()
                        && ms >= 1000
                    {
                        config.query_timeout = Duration::from_millis(ms);
                    }
                }
                "pool_max_conns" => {
                    if let Ok(max) = value.parse::<u32>()
                        && (1..=100).contains(&max)
                    {
                        config.max_connections = max;
                    }
                }
                _ => {}
            }
        }
        config
    }

    pub fn is_read_only(&self) -> bool {
        self.access == AccessMode::ReadOnly
    }

    /// # Errors
    /// Returns a configuration error for an empty target, a pool size outside
    /// `1..=100` or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(TableDumpError::configuration("connection target cannot be empty"));
        }
        if !(1..=100).contains(&self.max_connections) {
            return Err(TableDumpError::configuration(
                "max_connections must be between 1 and 100",
            ));
        }
        if self.connect_timeout.is_zero() || self.query_timeout.is_zero() {
            return Err(TableDumpError::configuration("timeouts must be greater than 0"));
        }
        Ok(())
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let access = if self.is_read_only() {
            "read-only"
        } else {
            "read-write"
        };
        write!(f, "{} ({})", self.target, access)
    }
}
