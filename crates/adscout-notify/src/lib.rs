//! adscout Notifications
//!
//! Delivers an email digest when a crawl session discovers listings
//! that were never seen before. Rendering ([`templates`]) is separated
//! from delivery ([`sender`]) so the digest can be tested without an
//! SMTP relay, and the [`Notifier`] trait lets the orchestrator be
//! exercised with an in-memory fake.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod sender;
pub mod templates;

pub use error::{NotifyError, Result};
pub use sender::EmailNotifier;
pub use templates::{render_digest, EmailDigest};

use adscout_db::ListingRecord;
use async_trait::async_trait;

/// Delivery seam for new-listing notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification for a batch of newly discovered listings.
    ///
    /// Implementations may skip delivery (and return `Ok`) when the
    /// batch is empty.
    async fn notify_new_listings(&self, listings: &[ListingRecord]) -> Result<()>;
}

/// Notifier that only logs; used when notifications are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_new_listings(&self, listings: &[ListingRecord]) -> Result<()> {
        tracing::debug!(
            count = listings.len(),
            "Notifications disabled, skipping digest"
        );
        Ok(())
    }
}
