//! adscout Crawler
//!
//! The crawl pipeline: discovery walks the site's search UI and
//! collects listing page URLs; extraction turns each detail page into a
//! normalized [`adscout_core::Listing`]; the orchestrator wraps one
//! full pass in a crawl session with a guaranteed terminal state and
//! hands newly discovered listings to the notifier.
//!
//! # Resilience
//!
//! - Page loads run under [`retry`] with exponential backoff; only
//!   transient browser failures are retried.
//! - Field extraction is best-effort: a broken selector costs one
//!   field, not the listing.
//! - A failed listing costs one listing, not the session; only
//!   discovery failures fail the whole run.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

pub mod discovery;
pub mod error;
pub mod extractor;
pub mod normalize;
pub mod orchestrator;
pub mod pacing;
pub mod retry;
pub mod selectors;

pub use discovery::{DiscoveryOutcome, SearchDiscovery};
pub use error::{CrawlError, Result};
pub use extractor::ListingExtractor;
pub use orchestrator::{CrawlOrchestrator, TEST_MODE_REFERENCE_CAP};
pub use retry::{retry, RetryPolicy, Retryable};
