//! Crawl session lifecycle records.
//!
//! A session is created in `Running` state before any extraction
//! begins and makes exactly one terminal transition, to `Completed` or
//! `Failed`. Counters are written once, at the terminal transition.

use crate::error::{DatabaseError, Result};
use crate::listings::{parse_opt_timestamp, parse_timestamp};
use adscout_core::SearchParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};
use std::fmt;

/// Status of a crawl session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionStatus {
    /// Session is currently in progress.
    Running,
    /// Session finished normally.
    Completed,
    /// Session aborted with an error.
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl SessionStatus {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "Running" => Ok(Self::Running),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            other => Err(DatabaseError::Decode(format!(
                "invalid session status '{other}'"
            ))),
        }
    }
}

/// One discovery run, tracked from start to terminal state.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    /// Session id (UUID, generated at start).
    pub id: String,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session reached a terminal state.
    pub ended_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: SessionStatus,
    /// References processed during the session.
    pub total_listings_found: i64,
    /// Listings inserted for the first time.
    pub new_listings_found: i64,
    /// Listings merged into existing rows.
    pub updated_listings: i64,
    /// Result pages visited during discovery.
    pub pages_crawled: i64,
    /// Error message, set only on the `Failed` transition.
    pub error_message: Option<String>,
    /// JSON snapshot of the search parameters; immutable.
    pub search_config: String,
}

/// Counters written at session end.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionCounters {
    /// References processed during the session.
    pub total_listings_found: u32,
    /// Listings inserted for the first time.
    pub new_listings_found: u32,
    /// Listings merged into existing rows.
    pub updated_listings: u32,
    /// Result pages visited during discovery.
    pub pages_crawled: u32,
}

/// Create and persist a new session in `Running` state.
///
/// The search parameters are serialized into an immutable snapshot.
pub async fn create_session(pool: &Pool<Sqlite>, params: &SearchParams) -> Result<CrawlSession> {
    let id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let search_config = serde_json::to_string(params)?;

    sqlx::query(
        "INSERT INTO crawl_sessions (id, started_at, status, search_config) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(started_at.to_rfc3339())
    .bind(SessionStatus::Running.to_string())
    .bind(&search_config)
    .execute(pool)
    .await?;

    tracing::info!(session_id = %id, "Crawl session started");

    Ok(CrawlSession {
        id,
        started_at,
        ended_at: None,
        status: SessionStatus::Running,
        total_listings_found: 0,
        new_listings_found: 0,
        updated_listings: 0,
        pages_crawled: 0,
        error_message: None,
        search_config,
    })
}

/// Finalize a running session as `Completed`, writing its counters.
///
/// The transition only applies to a session still in `Running` state;
/// a second terminal transition is rejected.
pub async fn complete_session(
    pool: &Pool<Sqlite>,
    session_id: &str,
    counters: &SessionCounters,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE crawl_sessions
         SET status = 'Completed', ended_at = ?, total_listings_found = ?,
             new_listings_found = ?, updated_listings = ?, pages_crawled = ?
         WHERE id = ? AND status = 'Running'",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(i64::from(counters.total_listings_found))
    .bind(i64::from(counters.new_listings_found))
    .bind(i64::from(counters.updated_listings))
    .bind(i64::from(counters.pages_crawled))
    .bind(session_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!(
            "no running session '{session_id}' to complete"
        )));
    }

    Ok(())
}

/// Finalize a running session as `Failed`, recording the error message.
pub async fn fail_session(
    pool: &Pool<Sqlite>,
    session_id: &str,
    error_message: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE crawl_sessions
         SET status = 'Failed', ended_at = ?, error_message = ?
         WHERE id = ? AND status = 'Running'",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(error_message)
    .bind(session_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!(
            "no running session '{session_id}' to fail"
        )));
    }

    Ok(())
}

/// Load a session by id.
pub async fn get_session(pool: &Pool<Sqlite>, session_id: &str) -> Result<Option<CrawlSession>> {
    let row = sqlx::query("SELECT * FROM crawl_sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else { return Ok(None) };

    let status: String = row.try_get("status")?;

    Ok(Some(CrawlSession {
        id: row.try_get("id")?,
        started_at: parse_timestamp(&row.try_get::<String, _>("started_at")?)?,
        ended_at: parse_opt_timestamp(row.try_get("ended_at")?)?,
        status: SessionStatus::parse(&status)?,
        total_listings_found: row.try_get("total_listings_found")?,
        new_listings_found: row.try_get("new_listings_found")?,
        updated_listings: row.try_get("updated_listings")?,
        pages_crawled: row.try_get("pages_crawled")?,
        error_message: row.try_get("error_message")?,
        search_config: row.try_get("search_config")?,
    }))
}
