//! Shared domain types used across the adscout crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a listing was posted by a private person or a dealer.
///
/// Classification is based on the presence of a commercial badge on the
/// seller profile; listings without a badge default to `Private`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SellerType {
    /// Private seller (no commercial badge).
    #[default]
    Private,
    /// Commercial seller (dealer badge present).
    Commercial,
}

impl fmt::Display for SellerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Commercial => write!(f, "commercial"),
        }
    }
}

impl SellerType {
    /// Parse from the string representation stored in the database.
    ///
    /// Unknown values fall back to `Private`, the classification default.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "commercial" => Self::Commercial,
            _ => Self::Private,
        }
    }
}

/// Parameters for one discovery search.
///
/// A serialized snapshot of this struct is stored on every crawl
/// session and never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Category slug, e.g. `antike-buecher`.
    pub category: String,
    /// Free-text location, e.g. a city name.
    pub location: String,
    /// Search radius around the location in kilometers.
    pub radius_km: u32,
    /// Maximum price in EUR; `0.0` restricts the search to free items.
    pub max_price: f64,
    /// Keywords searched one after another; results are merged.
    pub keywords: Vec<String>,
    /// Pagination cap per keyword search.
    pub max_pages: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            category: "antike-buecher".to_string(),
            location: "Karlsruhe".to_string(),
            radius_km: 20,
            max_price: 0.0,
            keywords: Vec::new(),
            max_pages: 50,
        }
    }
}

/// One extracted and normalized listing, ready for persistence.
///
/// Every optional field is genuinely optional: extraction is
/// best-effort per field, and the upsert engine preserves previously
/// stored values where a re-extraction yields `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Stable source-assigned identifier; the sole dedup key.
    pub listing_id: String,
    /// Listing title.
    pub title: String,
    /// Full description text.
    pub description: Option<String>,
    /// Normalized price in EUR; `0.0` means free or no price given.
    pub price: f64,
    /// Raw location string as shown on the page.
    pub location: Option<String>,
    /// Five-digit postal code extracted from the location.
    pub postal_code: Option<String>,
    /// Distance from the search location in kilometers.
    pub distance_km: Option<f64>,
    /// Seller display name.
    pub seller_name: Option<String>,
    /// Private or commercial seller.
    pub seller_type: SellerType,
    /// Source-side seller identifier, when exposed.
    pub seller_id: Option<String>,
    /// Category from the breadcrumb trail.
    pub category: Option<String>,
    /// Subcategory from the breadcrumb trail.
    pub subcategory: Option<String>,
    /// Item condition, when listed in the detail table.
    pub condition: Option<String>,
    /// Absolute posting time resolved from the page's date text.
    pub listing_date: Option<DateTime<Utc>>,
    /// View counter shown on the page.
    pub view_count: Option<i64>,
    /// Canonical URL of the listing page.
    pub listing_url: String,
    /// First image, used as thumbnail.
    pub thumbnail_url: Option<String>,
    /// All gallery image URLs in page order.
    pub image_urls: Vec<String>,
    /// Phone number, if the seller exposed one behind the reveal button.
    pub phone_number: Option<String>,
    /// Contact person named in the contact box.
    pub contact_name: Option<String>,
}

impl Listing {
    /// Create a listing with only the required fields set.
    #[must_use]
    pub fn new(
        listing_id: impl Into<String>,
        title: impl Into<String>,
        listing_url: impl Into<String>,
    ) -> Self {
        Self {
            listing_id: listing_id.into(),
            title: title.into(),
            description: None,
            price: 0.0,
            location: None,
            postal_code: None,
            distance_km: None,
            seller_name: None,
            seller_type: SellerType::default(),
            seller_id: None,
            category: None,
            subcategory: None,
            condition: None,
            listing_date: None,
            view_count: None,
            listing_url: listing_url.into(),
            thumbnail_url: None,
            image_urls: Vec::new(),
            phone_number: None,
            contact_name: None,
        }
    }
}
