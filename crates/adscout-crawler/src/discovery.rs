//! Search discovery: from search parameters to listing page URLs.
//!
//! Drives the site's search UI: open the category search, accept the
//! cookie banner, set location and radius, then run one sub-search per
//! keyword, paginating each up to the configured cap. Results from all
//! keywords are merged in discovery order with duplicates removed.
//!
//! Interaction steps (cookie banner, location form, free filter) are
//! skip-on-failure; a keyword whose sub-search fails is logged and
//! skipped rather than aborting the run.

use crate::error::{CrawlError, Result};
use crate::pacing;
use crate::retry::{retry, RetryPolicy};
use crate::selectors;
use adscout_browser::{BrowserError, Driver};
use adscout_core::SearchParams;
use std::collections::HashSet;
use std::time::Duration;

/// What a discovery pass produced.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOutcome {
    /// Deduplicated listing page URLs in discovery order.
    pub references: Vec<String>,
    /// Result pages visited across all keyword sub-searches.
    pub pages_crawled: u32,
}

/// Runs keyword searches and collects listing references.
pub struct SearchDiscovery<'a, D: Driver> {
    driver: &'a D,
    retry: RetryPolicy,
    base_url: String,
    wait_timeout: Duration,
    pace_base: Duration,
}

impl<'a, D: Driver> SearchDiscovery<'a, D> {
    /// Create a discovery pass over an open driver.
    pub fn new(
        driver: &'a D,
        retry: RetryPolicy,
        base_url: impl Into<String>,
        wait_timeout: Duration,
        pace_base: Duration,
    ) -> Self {
        Self {
            driver,
            retry,
            base_url: base_url.into(),
            wait_timeout,
            pace_base,
        }
    }

    /// Run the full discovery pass for the given parameters.
    pub async fn discover(&self, params: &SearchParams) -> Result<DiscoveryOutcome> {
        let search_url = format!(
            "{}/s-{}/k0",
            self.base_url.trim_end_matches('/'),
            params.category
        );

        let search_page: &str = &search_url;
        retry(&self.retry, "open search page", || async move {
            self.driver.navigate(search_page).await?;
            self.driver
                .wait_for(selectors::SEARCH_QUERY, self.wait_timeout)
                .await
        })
        .await
        .map_err(CrawlError::from)?;

        self.accept_cookie_banner().await;
        self.set_location(params).await;
        if params.max_price == 0.0 {
            self.apply_free_filter().await;
        }

        let mut seen = HashSet::new();
        let mut references = Vec::new();
        let mut pages_crawled = 0;

        for keyword in &params.keywords {
            match self.search_keyword(keyword, params.max_pages).await {
                Ok((urls, pages)) => {
                    pages_crawled += pages;
                    for url in urls {
                        if seen.insert(url.clone()) {
                            references.push(url);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(keyword = %keyword, error = %e, "Keyword search failed, skipping");
                }
            }

            // Back to the search form for the next keyword.
            if let Err(e) = self.driver.navigate(&search_url).await {
                tracing::warn!(error = %e, "Return to search page failed");
            }
            pacing::pause(self.pace_base).await;
        }

        tracing::info!(
            references = references.len(),
            pages_crawled,
            "Discovery finished"
        );
        Ok(DiscoveryOutcome {
            references,
            pages_crawled,
        })
    }

    /// One keyword sub-search: fill the query, submit, walk the result
    /// pages collecting listing links.
    async fn search_keyword(&self, keyword: &str, max_pages: u32) -> Result<(Vec<String>, u32)> {
        self.driver.fill(selectors::SEARCH_QUERY, keyword).await?;
        if !self.driver.click(selectors::SEARCH_SUBMIT).await? {
            return Err(
                BrowserError::Navigation("search submit control missing".to_string()).into(),
            );
        }
        pacing::pause(self.pace_base).await;

        let mut urls = Vec::new();
        let mut pages = 0;
        loop {
            pages += 1;
            let hrefs = self.driver.attr_all(selectors::RESULT_LINKS, "href").await?;
            for href in hrefs {
                urls.push(absolutize(&self.base_url, &href));
            }

            if pages >= max_pages {
                tracing::debug!(keyword, max_pages, "Pagination cap reached");
                break;
            }
            if !self.driver.click(selectors::NEXT_PAGE).await? {
                break;
            }
            pacing::pause(self.pace_base).await;
        }

        tracing::debug!(keyword, results = urls.len(), pages, "Keyword search done");
        Ok((urls, pages))
    }

    async fn accept_cookie_banner(&self) {
        for selector in selectors::COOKIE_ACCEPT {
            match self.driver.click(selector).await {
                Ok(true) => {
                    tracing::debug!(selector, "Cookie banner accepted");
                    pacing::pause(self.pace_base).await;
                    return;
                }
                Ok(false) => {}
                Err(e) => tracing::debug!(selector, error = %e, "Cookie banner handling failed"),
            }
        }
    }

    /// Fill the location field and pick the first autocomplete
    /// suggestion, then select the radius. Failures leave the site's
    /// default location in place.
    async fn set_location(&self, params: &SearchParams) {
        if params.location.is_empty() {
            return;
        }

        if let Err(e) = self
            .driver
            .fill(selectors::SEARCH_LOCATION, &params.location)
            .await
        {
            tracing::warn!(error = %e, "Location input failed, keeping site default");
            return;
        }
        pacing::pause(self.pace_base).await;

        match self.driver.click(selectors::LOCATION_SUGGESTION).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    location = %params.location,
                    "No location suggestion appeared"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Location suggestion failed");
                return;
            }
        }

        let radius_option = format!(
            "{} option[value='{}']",
            selectors::SEARCH_RADIUS,
            params.radius_km
        );
        match self.driver.click(&radius_option).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                radius_km = params.radius_km,
                "Radius option not offered, keeping default"
            ),
            Err(e) => tracing::warn!(error = %e, "Radius selection failed"),
        }
    }

    async fn apply_free_filter(&self) {
        match self.driver.click(selectors::FREE_FILTER).await {
            Ok(true) => {
                tracing::debug!("Free-items filter applied");
                pacing::pause(self.pace_base).await;
            }
            Ok(false) => tracing::debug!("Free-items filter not present"),
            Err(e) => tracing::debug!(error = %e, "Free-items filter failed"),
        }
    }
}

/// Resolve a possibly relative href against the site base URL.
#[must_use]
pub fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href)
    }
}
