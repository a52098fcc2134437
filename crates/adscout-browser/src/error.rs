use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

/// Failures raised by the browser driver.
///
/// The crawler's retry layer distinguishes transient failures (worth
/// retrying) from fatal ones via [`BrowserError::is_transient`].
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser session creation failed: {0}")]
    SessionCreation(String),

    #[error("browser window destroyed: {0}")]
    WindowClosed(String),

    #[error("timeout waiting for {0}")]
    Timeout(String),

    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    /// Whether this failure is likely recoverable on retry.
    ///
    /// Timeouts, stale references and connection resets are transient;
    /// a failed session launch or a destroyed window is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::StaleElement(_) | Self::ConnectionReset(_) | Self::Navigation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BrowserError::Timeout("h1".into()).is_transient());
        assert!(BrowserError::StaleElement("a.link".into()).is_transient());
        assert!(BrowserError::ConnectionReset("peer".into()).is_transient());
        assert!(!BrowserError::SessionCreation("no chrome".into()).is_transient());
        assert!(!BrowserError::WindowClosed("crashed".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = BrowserError::Timeout("h1#viewad-title".to_string());
        assert_eq!(err.to_string(), "timeout waiting for h1#viewad-title");
    }
}
