//! Session orchestration: one complete crawl run.
//!
//! A run owns a crawl session from its `Running` start to exactly one
//! terminal transition. Discovery failures fail the whole session;
//! individual listing failures are skipped and the run continues. The
//! browser driver is closed exactly once, on both the success and the
//! failure path.

use crate::discovery::SearchDiscovery;
use crate::error::Result;
use crate::extractor::ListingExtractor;
use crate::pacing;
use crate::retry::RetryPolicy;
use adscout_browser::Driver;
use adscout_core::{CrawlerConfig, SearchParams};
use adscout_db::{crawl_sessions, listings, CrawlSession, Database, SessionCounters, UpsertOutcome};
use adscout_notify::Notifier;
use std::sync::Arc;
use std::time::Duration;

/// Maximum references processed per session in test mode.
pub const TEST_MODE_REFERENCE_CAP: usize = 5;

/// Runs crawl sessions end to end.
pub struct CrawlOrchestrator<N: Notifier> {
    db: Arc<Database>,
    notifier: Arc<N>,
    crawler: CrawlerConfig,
    wait_timeout: Duration,
    test_mode: bool,
}

impl<N: Notifier> CrawlOrchestrator<N> {
    /// Create an orchestrator over an open database.
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<N>,
        crawler: CrawlerConfig,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            db,
            notifier,
            crawler,
            wait_timeout,
            test_mode: false,
        }
    }

    /// Enable test mode: cap the session at a handful of listings and
    /// suppress notifications.
    #[must_use]
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Run one crawl session with the given driver.
    ///
    /// Takes the driver by value: the session owns the browser and
    /// closes it before the terminal transition, whatever the outcome.
    /// On failure the session is marked `Failed` and the error is
    /// re-propagated to the caller.
    pub async fn run_once<D: Driver>(
        &self,
        driver: D,
        params: &SearchParams,
    ) -> Result<CrawlSession> {
        // The driver is owned from here on; release it even when the
        // session row cannot be created.
        let session = match crawl_sessions::create_session(self.db.pool(), params).await {
            Ok(session) => session,
            Err(e) => {
                if let Err(close_err) = driver.close().await {
                    tracing::warn!(error = %close_err, "Browser close failed");
                }
                return Err(e.into());
            }
        };
        tracing::info!(
            session_id = %session.id,
            keywords = params.keywords.len(),
            test_mode = self.test_mode,
            "Starting crawl session"
        );

        let outcome = self.run_session(&driver, &session.id, params).await;

        if let Err(e) = driver.close().await {
            tracing::warn!(error = %e, "Browser close failed");
        }

        match outcome {
            Ok(counters) => {
                crawl_sessions::complete_session(self.db.pool(), &session.id, &counters).await?;
                tracing::info!(
                    session_id = %session.id,
                    total = counters.total_listings_found,
                    new = counters.new_listings_found,
                    updated = counters.updated_listings,
                    pages = counters.pages_crawled,
                    "Crawl session completed"
                );

                if counters.new_listings_found > 0 && !self.test_mode {
                    self.send_notification(&session.id).await;
                }

                let stored = crawl_sessions::get_session(self.db.pool(), &session.id)
                    .await?
                    .ok_or_else(|| {
                        adscout_db::DatabaseError::NotFound(format!(
                            "session '{}' vanished after completion",
                            session.id
                        ))
                    })?;
                Ok(stored)
            }
            Err(e) => {
                tracing::error!(session_id = %session.id, error = %e, "Crawl session failed");
                if let Err(db_err) =
                    crawl_sessions::fail_session(self.db.pool(), &session.id, &e.to_string()).await
                {
                    tracing::error!(error = %db_err, "Could not record session failure");
                }
                Err(e)
            }
        }
    }

    async fn run_session<D: Driver>(
        &self,
        driver: &D,
        session_id: &str,
        params: &SearchParams,
    ) -> Result<SessionCounters> {
        let retry = RetryPolicy::from_config(&self.crawler);
        let pace_base = Duration::from_millis(self.crawler.delay_between_requests_ms);

        let discovery = SearchDiscovery::new(
            driver,
            retry.clone(),
            self.crawler.base_url.clone(),
            self.wait_timeout,
            pace_base,
        );
        let discovered = discovery.discover(params).await?;

        let mut references = discovered.references;
        if self.test_mode && references.len() > TEST_MODE_REFERENCE_CAP {
            tracing::info!(
                discovered = references.len(),
                cap = TEST_MODE_REFERENCE_CAP,
                "Test mode, truncating reference list"
            );
            references.truncate(TEST_MODE_REFERENCE_CAP);
        }

        let mut counters = SessionCounters {
            total_listings_found: references.len() as u32,
            pages_crawled: discovered.pages_crawled,
            ..SessionCounters::default()
        };

        let extractor = ListingExtractor::new(driver, retry, self.wait_timeout);
        for url in &references {
            pacing::pause(pace_base).await;

            match extractor.extract(url).await {
                Ok(Some(listing)) => {
                    match listings::upsert_listing(self.db.pool(), &listing, session_id).await? {
                        UpsertOutcome::New => counters.new_listings_found += 1,
                        UpsertOutcome::Updated => counters.updated_listings += 1,
                        UpsertOutcome::Conflict => {
                            tracing::warn!(
                                listing_id = %listing.listing_id,
                                "Concurrent insert, listing counted as neither new nor updated"
                            );
                        }
                    }
                }
                Ok(None) => {
                    tracing::warn!(url = %url, "Listing page yielded no data, skipping");
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Listing extraction failed, skipping");
                }
            }
        }

        Ok(counters)
    }

    /// Notification failures are logged, never propagated: the session
    /// already completed and its data is safely stored.
    async fn send_notification(&self, session_id: &str) {
        let new_listings = match listings::get_by_session(self.db.pool(), session_id).await {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(error = %e, "Could not load listings for notification");
                return;
            }
        };

        if let Err(e) = self.notifier.notify_new_listings(&new_listings).await {
            tracing::error!(error = %e, "Notification delivery failed");
        }
    }
}
