//! Error types for the crawl pipeline.

use adscout_browser::BrowserError;
use adscout_db::DatabaseError;
use thiserror::Error;

/// Failures raised while running a crawl session.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A browser operation failed.
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// A database operation failed.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result alias for crawl operations.
pub type Result<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_error_converts() {
        let err: CrawlError = BrowserError::Timeout("h1#viewad-title".to_string()).into();
        assert!(err.to_string().contains("timeout"));
    }
}
