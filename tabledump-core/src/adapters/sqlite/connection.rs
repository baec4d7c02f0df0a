//! SQLite connection strings and the single-connection pool.
//!
//! Accepted forms: `sqlite:///abs/path.db`, `sqlite://./relative.db`, a bare
//! path ending in `.db`, `.sqlite` or `.sqlite3`, and `sqlite::memory:` or
//! `:memory:`. Dumps open files read-only.

use super::{ConnectionConfig, SqliteAdapter};
use crate::Result;
use crate::adapters::AccessMode;
use crate::error::TableDumpError;
use sqlx::SqlitePool;
use url::Url;

impl SqliteAdapter {
    /// Opens a SQLite database.
    ///
    /// A missing file is an error unless the URL carries `mode=rwc`.
    ///
    /// # Errors
    /// Returns error if the connection string is invalid or the database
    /// cannot be opened
    pub async fn new(connection_string: &str, access: AccessMode) -> Result<Self> {
        let config = parse_sqlite_connection_config(connection_string, access)?;
        let pool = create_sqlite_connection(connection_string, &config).await?;

        Ok(Self {
            pool,
            config,
            connection_string: connection_string.to_string(),
        })
    }

    /// Checks if the connection is to an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        is_memory_connection_string(&self.connection_string)
    }

    /// Closes the connection gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_memory_connection_string(connection_string: &str) -> bool {
    connection_string.contains(":memory:") || connection_string.contains("mode=memory")
}

/// Builds the config of a SQLite connection string.
///
/// The pool holds one connection: SQLite has a single writer, and an
/// in-memory database lives and dies with its only connection.
pub fn parse_sqlite_connection_config(
    connection_string: &str,
    access: AccessMode,
) -> Result<ConnectionConfig> {
    validate_sqlite_connection_string(connection_string)?;

    let mut config = ConnectionConfig::new(database_file_name(connection_string), access);
    config.max_connections = 1;
    config.validate()?;
    Ok(config)
}

/// Validates SQLite connection string format.
///
/// # Errors
/// Returns error if connection string is invalid
pub fn validate_sqlite_connection_string(connection_string: &str) -> Result<()> {
    if connection_string == ":memory:" {
        return Ok(());
    }

    if connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        return Ok(());
    }

    if connection_string.starts_with("sqlite:") {
        if is_memory_connection_string(connection_string) {
            return Ok(());
        }

        if let Ok(url) = Url::parse(connection_string) {
            if url.scheme() != "sqlite" {
                return Err(TableDumpError::configuration(
                    "Connection string must use sqlite:// scheme",
                ));
            }
            return Ok(());
        }

        if connection_string.starts_with("sqlite://") {
            return Ok(());
        }
    }

    Err(TableDumpError::configuration(
        "Invalid SQLite connection string format: expected sqlite:// URL, file path, or :memory:",
    ))
}

/// File name of the database, without its directory.
fn database_file_name(connection_string: &str) -> String {
    if is_memory_connection_string(connection_string) {
        return ":memory:".to_string();
    }

    if let Some(stripped) = connection_string.strip_prefix("sqlite://") {
        let path = stripped.split('?').next().unwrap_or(stripped);
        if let Some(filename) = path.rsplit('/').next()
            && !filename.is_empty()
        {
            return filename.to_string();
        }
    }

    if let Some(filename) = connection_string.rsplit('/').next()
        && !filename.is_empty()
    {
        return filename.to_string();
    }

    "main".to_string()
}

/// Opens the single-connection pool.
async fn create_sqlite_connection(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<SqlitePool> {
    use sqlx::sqlite::SqliteConnectOptions;
    use std::str::FromStr;

    let normalized = normalize_connection_string(connection_string);
    let in_memory = is_memory_connection_string(connection_string);

    let mut options = SqliteConnectOptions::from_str(&normalized).map_err(|e| {
        TableDumpError::configuration(format!("Invalid SQLite connection string: {}", e))
    })?;

    // Wait for competing writers instead of failing with SQLITE_BUSY
    options = options.busy_timeout(config.query_timeout);

    if config.is_read_only() && !in_memory {
        options = options.read_only(true);
    }

    let mut pool_options = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(config.connect_timeout);

    pool_options = if in_memory {
        // Closing the last connection would discard the database
        pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.idle_timeout(config.idle_timeout)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(TableDumpError::connection_failed)?;

    tracing::debug!("Opened SQLite database {}", config);

    Ok(pool)
}

/// Normalizes connection string to SQLite URL format.
fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }

    format!("sqlite://{}", connection_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sqlite_connection_string_memory() {
        assert!(validate_sqlite_connection_string(":memory:").is_ok());
        assert!(validate_sqlite_connection_string("sqlite::memory:").is_ok());
        assert!(validate_sqlite_connection_string("sqlite://:memory:").is_ok());
    }

    #[test]
    fn test_validate_sqlite_connection_string_file() {
        assert!(validate_sqlite_connection_string("sqlite:///path/to/db.sqlite").is_ok());
        assert!(validate_sqlite_connection_string("sqlite://./test.db").is_ok());
        assert!(validate_sqlite_connection_string("sqlite:///tmp/x/data.db?mode=rwc").is_ok());
        assert!(validate_sqlite_connection_string("/path/to/database.db").is_ok());
        assert!(validate_sqlite_connection_string("data.sqlite3").is_ok());
    }

    #[test]
    fn test_validate_sqlite_connection_string_invalid() {
        assert!(validate_sqlite_connection_string("postgres://localhost/db").is_err());
        assert!(validate_sqlite_connection_string("mysql://localhost/db").is_err());
        assert!(validate_sqlite_connection_string("invalid").is_err());
    }

    #[test]
    fn test_database_file_name() {
        assert_eq!(database_file_name(":memory:"), ":memory:");
        assert_eq!(database_file_name("sqlite:///path/to/mydb.sqlite"), "mydb.sqlite");
        assert_eq!(database_file_name("sqlite://./test.db?mode=rwc"), "test.db");
        assert_eq!(database_file_name("/var/data/app.db"), "app.db");
    }

    #[test]
    fn test_normalize_connection_string() {
        assert_eq!(normalize_connection_string(":memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_connection_string("sqlite:///path/db.sqlite"),
            "sqlite:///path/db.sqlite"
        );
        assert_eq!(
            normalize_connection_string("/path/to/db.sqlite"),
            "sqlite:///path/to/db.sqlite"
        );
    }

    #[test]
    fn test_parse_sqlite_connection_config() {
        let config =
            parse_sqlite_connection_config("sqlite:///path/to/test.db", AccessMode::ReadOnly)
                .unwrap();
        assert_eq!(config.target, "test.db");
        assert_eq!(config.max_connections, 1);
        assert!(config.is_read_only());

        let config = parse_sqlite_connection_config(":memory:", AccessMode::ReadWrite).unwrap();
        assert_eq!(config.target, ":memory:");
    }
}
