//! Error types for the notification layer.

use thiserror::Error;

/// Errors that can occur while building or sending notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// An email address in the configuration did not parse.
    #[error("Invalid email address '{address}': {reason}")]
    InvalidAddress {
        /// The offending address.
        address: String,
        /// Parser message.
        reason: String,
    },

    /// The message could not be assembled.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// The SMTP transport rejected the message or could not connect.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Notifications are enabled but the configuration is incomplete.
    #[error("Incomplete notification config: {0}")]
    IncompleteConfig(String),
}

/// Result alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
