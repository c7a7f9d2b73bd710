// SQLite Connection Pool Setup

use plugin_check_core::port::HostError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::map_sqlx_error;

/// Create SQLite connection pool with WAL mode
///
/// In-memory databases live per connection, so they get a single connection
/// that is never recycled.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, HostError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| HostError::Connection(e.to_string()))?
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    let pool_options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(10)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| HostError::Connection(e.to_string()))?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .map_err(map_sqlx_error)?;

    Ok(pool)
}
