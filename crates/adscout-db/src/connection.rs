//! Database connection management.
//!
//! Provides a `SQLx` connection pool over a local `SQLite` file,
//! created on first use.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

/// Open a connection pool for the database at `path`.
///
/// The database file is created if it does not exist. `:memory:` opens
/// an in-memory database, which is limited to a single connection so
/// that every caller sees the same data.
pub async fn open_pool(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let path_str = path
        .as_ref()
        .to_str()
        .ok_or_else(|| DatabaseError::Open("database path is not valid UTF-8".to_string()))?;

    let connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true);

    // An in-memory SQLite database exists per connection.
    let max_connections = if path_str.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to open pool: {e}")))?;

    tracing::info!("Database pool opened at {}", path_str);

    Ok(pool)
}
