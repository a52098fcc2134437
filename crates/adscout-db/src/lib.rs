//! adscout Database Layer
//!
//! Provides `SQLite` access through `SQLx` with embedded, versioned
//! migrations. Two tables back the crawler: `listings`, keyed uniquely
//! by the source-assigned listing identifier, and `crawl_sessions`,
//! which records every discovery run with its terminal status and
//! counters.
//!
//! # Conventions
//!
//! - Timestamps are stored as RFC 3339 `TEXT`
//! - Row ids are UUID v4 strings
//! - Image URL lists are stored as JSON arrays
//! - Migrations run automatically via [`Database::run_migrations`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod crawl_sessions;
pub mod error;
pub mod listings;
pub mod migrations;

// Re-export commonly used types
pub use crawl_sessions::{CrawlSession, SessionCounters, SessionStatus};
pub use error::{DatabaseError, Result};
pub use listings::{ListingRecord, UpsertOutcome};

use sqlx::{Pool, Sqlite};
use std::path::Path;

/// High-level database handle.
#[derive(Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the database at `path`, creating the file if missing.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version (number of applied migrations).
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
