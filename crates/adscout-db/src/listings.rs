//! Listing storage and the dedup/upsert engine.
//!
//! Listings are keyed by their source-assigned `listing_id`; at most
//! one row per identifier exists at any time. [`upsert_listing`] is the
//! single write path: it inserts unseen listings and merges
//! re-observations into the existing row inside one transaction.

use crate::error::{DatabaseError, Result};
use adscout_core::{Listing, SellerType};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

/// A persisted listing row, including observation tracking fields.
#[derive(Debug, Clone)]
pub struct ListingRecord {
    /// Surrogate row id (UUID).
    pub id: String,
    /// Source-assigned identifier; unique across the table.
    pub listing_id: String,
    /// Listing title.
    pub title: String,
    /// Description text.
    pub description: Option<String>,
    /// Price in EUR; 0 means free.
    pub price: f64,
    /// Raw location string.
    pub location: Option<String>,
    /// Extracted 5-digit postal code.
    pub postal_code: Option<String>,
    /// Distance from the search location in kilometers.
    pub distance_km: Option<f64>,
    /// Seller display name.
    pub seller_name: Option<String>,
    /// Private or commercial seller.
    pub seller_type: SellerType,
    /// Source-side seller identifier.
    pub seller_id: Option<String>,
    /// Breadcrumb category.
    pub category: Option<String>,
    /// Breadcrumb subcategory.
    pub subcategory: Option<String>,
    /// Item condition.
    pub condition: Option<String>,
    /// Absolute posting time, when the date text could be resolved.
    pub listing_date: Option<DateTime<Utc>>,
    /// View counter at last observation.
    pub view_count: Option<i64>,
    /// Listing page URL.
    pub listing_url: String,
    /// Thumbnail image URL.
    pub thumbnail_url: Option<String>,
    /// Gallery image URLs.
    pub image_urls: Vec<String>,
    /// Revealed phone number.
    pub phone_number: Option<String>,
    /// Contact person.
    pub contact_name: Option<String>,
    /// First observation time; set once, never updated.
    pub first_seen: DateTime<Utc>,
    /// Last observation time; refreshed on every re-observation.
    pub last_seen: DateTime<Utc>,
    /// Whether the listing was present in the most recent observation.
    pub is_active: bool,
    /// Number of observations, starting at 1.
    pub times_seen: i64,
    /// Session that first discovered this listing.
    pub crawl_session_id: String,
}

/// Outcome of an upsert call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was inserted.
    New,
    /// An existing row was merged and its counters bumped.
    Updated,
    /// A concurrent observation inserted the same `listing_id` first;
    /// the transaction was rolled back and nothing was written.
    Conflict,
}

/// Insert a newly observed listing or merge a re-observation.
///
/// Within one transaction: looks up the row by `listing_id`. If absent,
/// inserts with `times_seen = 1` and `first_seen = last_seen = now`,
/// owned by `session_id`. If present, overwrites descriptive fields
/// only where the new value is non-null (a `None` re-extraction keeps
/// the stored value), always refreshes `last_seen`/`is_active` and
/// increments `times_seen`; a non-empty image list replaces the stored
/// images and thumbnail. The owning session is never changed.
///
/// A uniqueness violation during insert is reported as
/// [`UpsertOutcome::Conflict`] rather than an error.
pub async fn upsert_listing(
    pool: &Pool<Sqlite>,
    listing: &Listing,
    session_id: &str,
) -> Result<UpsertOutcome> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let existing = sqlx::query("SELECT id FROM listings WHERE listing_id = ?")
        .bind(&listing.listing_id)
        .fetch_optional(&mut *tx)
        .await?;

    if existing.is_none() {
        return if insert_listing(&mut tx, listing, session_id, now).await? {
            tx.commit().await?;
            Ok(UpsertOutcome::New)
        } else {
            // Lost a race against a concurrent observation of the
            // same listing; the caller treats this as neither new
            // nor updated.
            tx.rollback().await?;
            tracing::warn!(
                listing_id = %listing.listing_id,
                "insert conflict on listing, rolled back"
            );
            Ok(UpsertOutcome::Conflict)
        };
    }

    sqlx::query(
        "UPDATE listings SET
             title = ?,
             description = COALESCE(?, description),
             price = ?,
             location = COALESCE(?, location),
             postal_code = COALESCE(?, postal_code),
             distance_km = COALESCE(?, distance_km),
             seller_name = COALESCE(?, seller_name),
             seller_type = ?,
             seller_id = COALESCE(?, seller_id),
             category = COALESCE(?, category),
             subcategory = COALESCE(?, subcategory),
             condition = COALESCE(?, condition),
             listing_date = COALESCE(?, listing_date),
             view_count = COALESCE(?, view_count),
             phone_number = COALESCE(?, phone_number),
             contact_name = COALESCE(?, contact_name),
             last_seen = ?,
             is_active = 1,
             times_seen = times_seen + 1
         WHERE listing_id = ?",
    )
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(listing.price)
    .bind(&listing.location)
    .bind(&listing.postal_code)
    .bind(listing.distance_km)
    .bind(&listing.seller_name)
    .bind(listing.seller_type.to_string())
    .bind(&listing.seller_id)
    .bind(&listing.category)
    .bind(&listing.subcategory)
    .bind(&listing.condition)
    .bind(listing.listing_date.map(|d| d.to_rfc3339()))
    .bind(listing.view_count)
    .bind(&listing.phone_number)
    .bind(&listing.contact_name)
    .bind(now.to_rfc3339())
    .bind(&listing.listing_id)
    .execute(&mut *tx)
    .await?;

    if !listing.image_urls.is_empty() {
        let image_urls = serde_json::to_string(&listing.image_urls)?;
        sqlx::query("UPDATE listings SET image_urls = ?, thumbnail_url = ? WHERE listing_id = ?")
            .bind(image_urls)
            .bind(&listing.thumbnail_url)
            .bind(&listing.listing_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(UpsertOutcome::Updated)
}

/// Insert a brand-new listing row inside the caller's transaction.
///
/// Returns `Ok(false)` when another row with the same `listing_id`
/// already exists (a lost race against a concurrent observation); any
/// other failure is an error.
async fn insert_listing(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    listing: &Listing,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let image_urls = serde_json::to_string(&listing.image_urls)?;
    let insert = sqlx::query(
        "INSERT INTO listings (id, listing_id, title, description, price, location,
                               postal_code, distance_km, seller_name, seller_type, seller_id,
                               category, subcategory, condition, listing_date, view_count,
                               listing_url, thumbnail_url, image_urls, phone_number,
                               contact_name, first_seen, last_seen, is_active, times_seen,
                               crawl_session_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 1, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&listing.listing_id)
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(listing.price)
    .bind(&listing.location)
    .bind(&listing.postal_code)
    .bind(listing.distance_km)
    .bind(&listing.seller_name)
    .bind(listing.seller_type.to_string())
    .bind(&listing.seller_id)
    .bind(&listing.category)
    .bind(&listing.subcategory)
    .bind(&listing.condition)
    .bind(listing.listing_date.map(|d| d.to_rfc3339()))
    .bind(listing.view_count)
    .bind(&listing.listing_url)
    .bind(&listing.thumbnail_url)
    .bind(image_urls)
    .bind(&listing.phone_number)
    .bind(&listing.contact_name)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .bind(session_id)
    .execute(&mut **tx)
    .await;

    match insert {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Look up a listing by its source-assigned identifier.
pub async fn get_by_listing_id(
    pool: &Pool<Sqlite>,
    listing_id: &str,
) -> Result<Option<ListingRecord>> {
    let row = sqlx::query("SELECT * FROM listings WHERE listing_id = ?")
        .bind(listing_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| record_from_row(&r)).transpose()
}

/// All listings first discovered by the given session, oldest first.
///
/// Because the owning session is set only at creation, this is exactly
/// the set of listings newly inserted during that session.
pub async fn get_by_session(pool: &Pool<Sqlite>, session_id: &str) -> Result<Vec<ListingRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM listings WHERE crawl_session_id = ? ORDER BY first_seen, listing_id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ListingRecord> {
    let image_urls_json: String = row.try_get("image_urls")?;
    let image_urls: Vec<String> = serde_json::from_str(&image_urls_json)
        .map_err(|e| DatabaseError::Decode(format!("invalid image_urls JSON: {e}")))?;

    let seller_type: String = row.try_get("seller_type")?;

    Ok(ListingRecord {
        id: row.try_get("id")?,
        listing_id: row.try_get("listing_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        location: row.try_get("location")?,
        postal_code: row.try_get("postal_code")?,
        distance_km: row.try_get("distance_km")?,
        seller_name: row.try_get("seller_name")?,
        seller_type: SellerType::parse(&seller_type),
        seller_id: row.try_get("seller_id")?,
        category: row.try_get("category")?,
        subcategory: row.try_get("subcategory")?,
        condition: row.try_get("condition")?,
        listing_date: parse_opt_timestamp(row.try_get("listing_date")?)?,
        view_count: row.try_get("view_count")?,
        listing_url: row.try_get("listing_url")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        image_urls,
        phone_number: row.try_get("phone_number")?,
        contact_name: row.try_get("contact_name")?,
        first_seen: parse_timestamp(&row.try_get::<String, _>("first_seen")?)?,
        last_seen: parse_timestamp(&row.try_get::<String, _>("last_seen")?)?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        times_seen: row.try_get("times_seen")?,
        crawl_session_id: row.try_get("crawl_session_id")?,
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{raw}': {e}")))
}

pub(crate) fn parse_opt_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection::open_pool, crawl_sessions, migrations};
    use adscout_core::SearchParams;

    async fn setup_test_pool() -> (Pool<Sqlite>, String) {
        let pool = open_pool(":memory:").await.expect("open pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        let session = crawl_sessions::create_session(&pool, &SearchParams::default())
            .await
            .expect("create session");
        (pool, session.id)
    }

    fn sample_listing() -> Listing {
        let mut listing = Listing::new(
            "2547891234",
            "Bücherkiste mit Romanen",
            "https://www.kleinanzeigen.de/s-anzeige/buecherkiste/2547891234",
        );
        listing.description = Some("Gut erhaltene Romane".to_string());
        listing.price = 5.5;
        listing.location = Some("76133 Karlsruhe".to_string());
        listing.postal_code = Some("76133".to_string());
        listing.view_count = Some(42);
        listing.image_urls = vec!["https://img.example.com/1.jpg".to_string()];
        listing.thumbnail_url = Some("https://img.example.com/1.jpg".to_string());
        listing
    }

    #[tokio::test]
    async fn test_upsert_inserts_new_listing() {
        let (pool, session_id) = setup_test_pool().await;

        let outcome = upsert_listing(&pool, &sample_listing(), &session_id)
            .await
            .expect("upsert");
        assert_eq!(outcome, UpsertOutcome::New);

        let record = get_by_listing_id(&pool, "2547891234")
            .await
            .expect("lookup")
            .expect("record exists");
        assert_eq!(record.times_seen, 1);
        assert!(record.is_active);
        assert_eq!(record.first_seen, record.last_seen);
        assert_eq!(record.crawl_session_id, session_id);
        assert_eq!(record.image_urls.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_identifier() {
        let (pool, session_id) = setup_test_pool().await;
        let listing = sample_listing();

        upsert_listing(&pool, &listing, &session_id)
            .await
            .expect("first upsert");
        let first = get_by_listing_id(&pool, &listing.listing_id)
            .await
            .expect("lookup")
            .expect("record exists");

        let outcome = upsert_listing(&pool, &listing, &session_id)
            .await
            .expect("second upsert");
        assert_eq!(outcome, UpsertOutcome::Updated);

        let second = get_by_listing_id(&pool, &listing.listing_id)
            .await
            .expect("lookup")
            .expect("record exists");

        // Exactly one row, observed twice.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 1);
        assert_eq!(second.times_seen, 2);
        assert_eq!(second.first_seen, first.first_seen);
        assert!(second.last_seen >= first.last_seen);
    }

    #[tokio::test]
    async fn test_lost_insert_race_reports_conflict() {
        let (pool, session_id) = setup_test_pool().await;
        upsert_listing(&pool, &sample_listing(), &session_id)
            .await
            .expect("first upsert");

        // Models an observation that raced past the existence check:
        // the row already exists when the insert runs.
        let mut tx = pool.begin().await.expect("begin");
        let inserted = insert_listing(&mut tx, &sample_listing(), &session_id, Utc::now())
            .await
            .expect("conflicting insert is not an error");
        assert!(!inserted, "duplicate listing_id must report a conflict");
        tx.rollback().await.expect("rollback");

        // The existing row is untouched.
        let record = get_by_listing_id(&pool, "2547891234")
            .await
            .expect("lookup")
            .expect("record exists");
        assert_eq!(record.times_seen, 1);
        assert_eq!(record.crawl_session_id, session_id);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_upsert_preserves_fields_on_none() {
        let (pool, session_id) = setup_test_pool().await;
        upsert_listing(&pool, &sample_listing(), &session_id)
            .await
            .expect("first upsert");

        // Re-observation where description and view count could not be read.
        let mut sparse = sample_listing();
        sparse.description = None;
        sparse.view_count = None;
        sparse.image_urls = Vec::new();
        sparse.thumbnail_url = None;

        upsert_listing(&pool, &sparse, &session_id)
            .await
            .expect("sparse upsert");

        let record = get_by_listing_id(&pool, &sparse.listing_id)
            .await
            .expect("lookup")
            .expect("record exists");
        assert_eq!(record.description.as_deref(), Some("Gut erhaltene Romane"));
        assert_eq!(record.view_count, Some(42));
        assert_eq!(record.image_urls.len(), 1);
        assert_eq!(
            record.thumbnail_url.as_deref(),
            Some("https://img.example.com/1.jpg")
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_images_when_present() {
        let (pool, session_id) = setup_test_pool().await;
        upsert_listing(&pool, &sample_listing(), &session_id)
            .await
            .expect("first upsert");

        let mut refreshed = sample_listing();
        refreshed.image_urls = vec![
            "https://img.example.com/2.jpg".to_string(),
            "https://img.example.com/3.jpg".to_string(),
        ];
        refreshed.thumbnail_url = Some("https://img.example.com/2.jpg".to_string());

        upsert_listing(&pool, &refreshed, &session_id)
            .await
            .expect("refresh upsert");

        let record = get_by_listing_id(&pool, &refreshed.listing_id)
            .await
            .expect("lookup")
            .expect("record exists");
        assert_eq!(record.image_urls.len(), 2);
        assert_eq!(
            record.thumbnail_url.as_deref(),
            Some("https://img.example.com/2.jpg")
        );
    }

    #[tokio::test]
    async fn test_update_keeps_owning_session() {
        let (pool, first_session) = setup_test_pool().await;
        upsert_listing(&pool, &sample_listing(), &first_session)
            .await
            .expect("first upsert");

        let later_session = crawl_sessions::create_session(&pool, &SearchParams::default())
            .await
            .expect("second session");

        upsert_listing(&pool, &sample_listing(), &later_session.id)
            .await
            .expect("second upsert");

        let record = get_by_listing_id(&pool, "2547891234")
            .await
            .expect("lookup")
            .expect("record exists");
        assert_eq!(record.crawl_session_id, first_session);

        // The later session inserted nothing, so it owns nothing.
        let owned = get_by_session(&pool, &later_session.id)
            .await
            .expect("get by session");
        assert!(owned.is_empty());
    }
}
