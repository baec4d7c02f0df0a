//! PostgreSQL connection pool management and validation.
//!
//! Dump connections run every transaction read-only, and every connection
//! gets the configured statement timeout and a UTC session time zone.

use super::{ConnectionConfig, PostgresAdapter};
use crate::Result;
use crate::adapters::AccessMode;
use crate::error::TableDumpError;
use sqlx::PgPool;
use url::Url;

impl PostgresAdapter {
    /// Creates a new PostgreSQL adapter with connection pooling
    ///
    /// # Arguments
    /// * `connection_string` - PostgreSQL connection URL (credentials sanitized in errors)
    /// * `access` - Read-only for dumps, read-write for loads
    ///
    /// # Errors
    /// Returns error if:
    /// - Connection string format is invalid
    /// - Pool configuration is invalid
    pub async fn new(connection_string: &str, access: AccessMode) -> Result<Self> {
        let config = Self::parse_connection_config(connection_string, access)?;
        let pool = Self::create_connection_pool(connection_string, &config).await?;

        Ok(Self { pool, config })
    }

    /// Closes the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Parses connection string to extract configuration parameters
    ///
    /// # Errors
    /// Returns error if connection string is malformed
    pub fn parse_connection_config(
        connection_string: &str,
        access: AccessMode,
    ) -> Result<ConnectionConfig> {
        Self::validate_connection_string(connection_string)?;

        let url = Url::parse(connection_string).map_err(|e| {
            TableDumpError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        if url.path().trim_start_matches('/').len() > 63 {
            return Err(TableDumpError::configuration(
                "Database name too long: maximum 63 characters",
            ));
        }

        let config = ConnectionConfig::from_server_url(&url, 5432, access);
        config.validate()?;
        Ok(config)
    }

    /// Creates a connection pool with session settings applied to every connection
    ///
    /// # Session Settings
    /// - `statement_timeout` from the configured query timeout
    /// - `application_name` for connection tracking
    /// - `default_transaction_read_only` for dump connections
    /// - UTC timezone so dumped timestamps do not depend on the server
    pub(crate) async fn create_connection_pool(
        connection_string: &str,
        config: &ConnectionConfig,
    ) -> Result<PgPool> {
        use sqlx::Executor;

        Self::validate_connection_string(connection_string)?;

        let query_timeout_ms = config.query_timeout.as_millis();
        let read_only = config.is_read_only();

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections.min(100))
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(
                        format!("SET statement_timeout = '{}ms'", query_timeout_ms).as_str(),
                    )
                    .await?;

                    let app_name = format!("tabledump-{}", env!("CARGO_PKG_VERSION"));
                    conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                        .await?;

                    if read_only {
                        conn.execute("SET default_transaction_read_only = on")
                            .await?;
                    }

                    conn.execute("SET timezone = 'UTC'").await?;

                    Ok(())
                })
            })
            // Lazy: connection errors surface on first use with full context
            .connect_lazy(connection_string)
            .map_err(|e| TableDumpError::Connection {
                context: format!(
                    "Failed to create PostgreSQL connection pool to {}",
                    crate::adapters::redact_database_url(connection_string)
                ),
                source: Box::new(e),
            })?;

        Ok(pool)
    }

    /// Validates connection string format
    ///
    /// # Errors
    /// Returns error if connection string is invalid
    pub fn validate_connection_string(connection_string: &str) -> Result<()> {
        let url = Url::parse(connection_string).map_err(|e| {
            TableDumpError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(TableDumpError::configuration(
                "Connection string must use postgres:// or postgresql:// scheme",
            ));
        }

        if url.host_str().is_none() {
            return Err(TableDumpError::configuration(
                "Connection string must specify a host",
            ));
        }

        Ok(())
    }
}
