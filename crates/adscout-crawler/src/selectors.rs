//! CSS selectors for the classifieds site.
//!
//! Kept in one place because the site's markup drifts; when a selector
//! breaks, this is the file to fix.

#![allow(missing_docs)]

// Listing detail page
pub const TITLE: &str = "h1#viewad-title";
pub const DESCRIPTION: &str = "#viewad-description-text";
pub const PRICE: &str = "#viewad-price";
pub const LOCALITY: &str = "#viewad-locality";
pub const SELLER_NAME: &str = ".userprofile-name";
pub const COMMERCIAL_BADGE: &str = ".userbadges-vip";
pub const EXTRA_INFO: &str = "#viewad-extra-info span";
pub const BREADCRUMB_LINKS: &str = ".breadcrump-link";
pub const DETAIL_ITEMS: &str = "#viewad-details li";
pub const MAIN_IMAGE: &str = "#viewad-image";
pub const MAIN_IMAGE_IMG: &str = "#viewad-image img";
pub const GALLERY_IMAGES: &str = ".gallery-img img";
pub const GALLERY_CLOSE: &str = ".icon-close-white";
pub const PHONE_REVEAL: &str = ".phoneline-reveal";
pub const PHONE_NUMBER: &str = ".phoneline-number";
pub const CONTACT_NAME: &str = "#viewad-contact-name";

// Search and result pages
// The consent banner's markup varies; candidates are tried in order.
pub const COOKIE_ACCEPT: &[&str] = &[
    "#gdpr-banner-accept",
    "button[data-testid='gdpr-banner-accept']",
];
pub const SEARCH_LOCATION: &str = "#site-search-area";
pub const LOCATION_SUGGESTION: &str = ".autocomplete-suggestion";
pub const SEARCH_RADIUS: &str = "#site-search-rad";
pub const SEARCH_QUERY: &str = "#site-search-query";
pub const SEARCH_SUBMIT: &str = "button[type='submit']";
pub const FREE_FILTER: &str = "a[href*='preis::0']";
pub const RESULT_LINKS: &str = "article.aditem a[href*='/s-anzeige/']";
pub const NEXT_PAGE: &str = "a.pagination-next";
