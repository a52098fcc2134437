//! Normalization of raw page text into typed fields.
//!
//! The source site renders prices, dates and locations as free-form
//! German text. These helpers are pure functions so every quirk the
//! site produces can be pinned down in unit tests.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Tokens marking a giveaway listing.
const FREE_TOKENS: &[&str] = &[
    "zu verschenken",
    "verschenken",
    "gratis",
    "kostenlos",
    "umsonst",
    "free",
];

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Integer part with optional dot-separated thousands, optional
    // comma decimal ("1.200", "5,50", "15,99").
    RE.get_or_init(|| Regex::new(r"(\d{1,3}(?:\.\d{3})+|\d+)(?:,(\d+))?").unwrap())
}

fn postal_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{5})\b").unwrap())
}

fn distance_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:ca\.\s*)?(\d+(?:[.,]\d+)?)\s*km").unwrap())
}

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

fn days_ago_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"vor\s+(\d+)\s+tag|(\d+)\s+days?\s+ago").unwrap())
}

fn hours_ago_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"vor\s+(\d+)\s+stunde|(\d+)\s+hours?\s+ago").unwrap())
}

fn minutes_ago_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"vor\s+(\d+)\s+minute|(\d+)\s+minutes?\s+ago").unwrap())
}

fn relative_amount(caps: &regex::Captures<'_>) -> Option<i64> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn absolute_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})\.(\d{1,2})\.(\d{4})").unwrap())
}

/// Parse a raw price string into EUR.
///
/// Giveaway markers ("Zu verschenken", "Gratis", ...) and text without
/// any number both map to `0.0`. Negotiation suffixes ("VB",
/// "Festpreis") and currency markers are ignored; German decimal
/// commas and dot-separated thousands are understood.
#[must_use]
pub fn clean_price(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let lower = trimmed.to_lowercase();
    if FREE_TOKENS.iter().any(|token| lower.contains(token)) {
        return 0.0;
    }

    let Some(caps) = price_re().captures(trimmed) else {
        return 0.0;
    };

    let integer_part = caps[1].replace('.', "");
    let value = match caps.get(2) {
        Some(decimal) => format!("{integer_part}.{}", decimal.as_str()),
        None => integer_part,
    };
    value.parse().unwrap_or(0.0)
}

/// Resolve a relative or absolute German date string against `now`.
///
/// "Heute"/"Gestern"/"Vorgestern" and "vor N Tagen" resolve to midnight
/// of the respective day; hour and minute offsets resolve relative to
/// `now` itself. `DD.MM.YYYY` resolves to midnight of that date.
/// Unrecognized text yields `None`.
#[must_use]
pub fn parse_listing_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = raw.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    let midnight = now.date_naive().and_hms_opt(0, 0, 0)?.and_utc();

    // "vorgestern" contains "gestern", so it is checked first.
    if lower.contains("vorgestern") {
        return Some(midnight - Duration::days(2));
    }
    if lower.contains("gestern") || lower.contains("yesterday") {
        return Some(midnight - Duration::days(1));
    }
    if lower.contains("heute") || lower.contains("today") {
        return Some(midnight);
    }

    // Scraped offsets can be arbitrarily large; an unresolvable one
    // yields None, never a panic.
    if let Some(caps) = days_ago_re().captures(&lower) {
        let offset = Duration::try_days(relative_amount(&caps)?)?;
        return midnight.checked_sub_signed(offset);
    }
    if let Some(caps) = hours_ago_re().captures(&lower) {
        let offset = Duration::try_hours(relative_amount(&caps)?)?;
        return now.checked_sub_signed(offset);
    }
    if let Some(caps) = minutes_ago_re().captures(&lower) {
        let offset = Duration::try_minutes(relative_amount(&caps)?)?;
        return now.checked_sub_signed(offset);
    }

    if let Some(caps) = absolute_date_re().captures(&lower) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    None
}

/// Extract the first 5-digit postal code from a location string.
#[must_use]
pub fn extract_postal_code(location: &str) -> Option<String> {
    postal_code_re()
        .captures(location)
        .map(|caps| caps[1].to_string())
}

/// Extract a "... km" distance from a location string.
#[must_use]
pub fn extract_distance_km(text: &str) -> Option<f64> {
    let caps = distance_re().captures(text)?;
    caps[1].replace(',', ".").parse().ok()
}

/// First run of digits in a string, e.g. from "123 mal aufgerufen".
#[must_use]
pub fn first_integer(text: &str) -> Option<i64> {
    integer_re()
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}
