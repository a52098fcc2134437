//! Listing detail page extraction.
//!
//! Loading the page is the only hard requirement: navigation and the
//! wait for the title element run under the retry policy, and a page
//! that never yields a title is reported as `Ok(None)` so the
//! orchestrator can skip it. Every other field is best-effort; a
//! selector that fails merely leaves its field `None`.

use crate::error::{CrawlError, Result};
use crate::normalize;
use crate::retry::{retry, RetryPolicy};
use crate::selectors;
use adscout_browser::Driver;
use adscout_core::{Listing, SellerType};
use chrono::Utc;
use std::time::Duration;

/// Extracts a [`Listing`] from a detail page.
pub struct ListingExtractor<'a, D: Driver> {
    driver: &'a D,
    retry: RetryPolicy,
    wait_timeout: Duration,
}

impl<'a, D: Driver> ListingExtractor<'a, D> {
    /// Create an extractor over an open driver.
    pub fn new(driver: &'a D, retry: RetryPolicy, wait_timeout: Duration) -> Self {
        Self {
            driver,
            retry,
            wait_timeout,
        }
    }

    /// Load a listing page and extract its fields.
    ///
    /// Returns `Ok(None)` when the page loads but carries no title,
    /// which happens for deleted or reserved listings.
    pub async fn extract(&self, url: &str) -> Result<Option<Listing>> {
        retry(&self.retry, "load listing page", || async move {
            self.driver.navigate(url).await?;
            self.driver
                .wait_for(selectors::TITLE, self.wait_timeout)
                .await
        })
        .await
        .map_err(CrawlError::from)?;

        let Some(title) = self.read_text(selectors::TITLE).await else {
            tracing::debug!(url, "Listing page has no title, skipping");
            return Ok(None);
        };

        let mut listing = Listing::new(listing_id_from_url(url), title, url);

        listing.description = self.read_text(selectors::DESCRIPTION).await;
        listing.price = self
            .read_text(selectors::PRICE)
            .await
            .map_or(0.0, |raw| normalize::clean_price(&raw));

        if let Some(locality) = self.read_text(selectors::LOCALITY).await {
            listing.postal_code = normalize::extract_postal_code(&locality);
            listing.distance_km = normalize::extract_distance_km(&locality);
            listing.location = Some(locality);
        }

        listing.seller_name = self.read_text(selectors::SELLER_NAME).await;
        listing.seller_type = if self.element_present(selectors::COMMERCIAL_BADGE).await {
            SellerType::Commercial
        } else {
            SellerType::Private
        };

        self.extract_extra_info(&mut listing).await;
        self.extract_breadcrumbs(&mut listing).await;
        listing.condition = self.extract_condition().await;
        listing.contact_name = self.read_text(selectors::CONTACT_NAME).await;
        listing.phone_number = self.extract_phone().await;

        let (thumbnail, images) = self.extract_images().await;
        listing.thumbnail_url = thumbnail;
        listing.image_urls = images;

        tracing::debug!(
            listing_id = %listing.listing_id,
            price = listing.price,
            "Listing extracted"
        );
        Ok(Some(listing))
    }

    /// Date text and view counter share the extra-info span row.
    async fn extract_extra_info(&self, listing: &mut Listing) {
        let spans = self.read_texts(selectors::EXTRA_INFO).await;
        let now = Utc::now();
        for span in &spans {
            if span.contains("aufgerufen") {
                listing.view_count = normalize::first_integer(span);
            } else if listing.listing_date.is_none() {
                listing.listing_date = normalize::parse_listing_date(span, now);
            }
        }
    }

    /// Last breadcrumb is the subcategory, the one before it the
    /// category; shorter trails only yield the category.
    async fn extract_breadcrumbs(&self, listing: &mut Listing) {
        let crumbs = self.read_texts(selectors::BREADCRUMB_LINKS).await;
        match crumbs.len() {
            0 | 1 => {}
            2 => listing.category = crumbs.last().cloned(),
            n => {
                listing.category = Some(crumbs[n - 2].clone());
                listing.subcategory = Some(crumbs[n - 1].clone());
            }
        }
    }

    async fn extract_condition(&self) -> Option<String> {
        let items = self.read_texts(selectors::DETAIL_ITEMS).await;
        items.iter().find_map(|item| {
            let lower = item.to_lowercase();
            if lower.starts_with("zustand") {
                item.split_once(':')
                    .map(|(_, value)| value.trim().to_string())
                    .filter(|v| !v.is_empty())
            } else {
                None
            }
        })
    }

    /// The phone number sits behind a reveal button; sellers without a
    /// published number have no button at all.
    async fn extract_phone(&self) -> Option<String> {
        match self.driver.click(selectors::PHONE_REVEAL).await {
            Ok(true) => self.read_text(selectors::PHONE_NUMBER).await,
            Ok(false) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Phone reveal failed, skipping");
                None
            }
        }
    }

    /// Opening the gallery exposes the full-size image list; if the
    /// gallery cannot be opened, the inline main image serves as the
    /// only entry.
    async fn extract_images(&self) -> (Option<String>, Vec<String>) {
        let mut images = Vec::new();

        match self.driver.click(selectors::MAIN_IMAGE).await {
            Ok(true) => {
                images = self.read_attrs(selectors::GALLERY_IMAGES, "src").await;
                if images.is_empty() {
                    // Lazy-loaded slides keep the URL in data-src.
                    images = self.read_attrs(selectors::GALLERY_IMAGES, "data-src").await;
                }
                if let Err(e) = self.driver.click(selectors::GALLERY_CLOSE).await {
                    tracing::debug!(error = %e, "Gallery close failed");
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Gallery open failed, using inline image");
            }
        }

        if images.is_empty() {
            if let Ok(Some(src)) = self.driver.attr(selectors::MAIN_IMAGE_IMG, "src").await {
                images.push(src);
            }
        }

        let thumbnail = images.first().cloned();
        (thumbnail, images)
    }

    async fn read_text(&self, selector: &str) -> Option<String> {
        match self.driver.text(selector).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(selector, error = %e, "Text lookup failed");
                None
            }
        }
    }

    async fn read_texts(&self, selector: &str) -> Vec<String> {
        match self.driver.text_all(selector).await {
            Ok(values) => values,
            Err(e) => {
                tracing::debug!(selector, error = %e, "Text lookup failed");
                Vec::new()
            }
        }
    }

    async fn read_attrs(&self, selector: &str, name: &str) -> Vec<String> {
        match self.driver.attr_all(selector, name).await {
            Ok(values) => values,
            Err(e) => {
                tracing::debug!(selector, error = %e, "Attribute lookup failed");
                Vec::new()
            }
        }
    }

    async fn element_present(&self, selector: &str) -> bool {
        self.driver.exists(selector).await.unwrap_or(false)
    }
}

/// The listing id is the last path segment of the detail URL.
#[must_use]
pub fn listing_id_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}
