//! Email digest rendering.
//!
//! Renders the set of newly discovered listings into a subject line and
//! an HTML body. Rendering is pure so it can be tested without a
//! transport.

use adscout_db::ListingRecord;

/// A rendered email, ready to hand to a transport.
#[derive(Debug, Clone)]
pub struct EmailDigest {
    /// Subject line, including the listing count.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

/// Render the digest for a batch of new listings.
#[must_use]
pub fn render_digest(listings: &[ListingRecord]) -> EmailDigest {
    let subject = format!(
        "Neue Bücher auf Kleinanzeigen: {} Anzeigen",
        listings.len()
    );

    let mut rows = String::new();
    for listing in listings {
        rows.push_str(&render_row(listing));
    }

    let html_body = format!(
        "<html><body>\
         <h2>{count} neue Anzeigen gefunden</h2>\
         <table border=\"0\" cellpadding=\"6\">\
         <tr><th align=\"left\">Titel</th><th align=\"left\">Preis</th>\
         <th align=\"left\">Ort</th></tr>\
         {rows}\
         </table>\
         </body></html>",
        count = listings.len(),
    );

    EmailDigest { subject, html_body }
}

fn render_row(listing: &ListingRecord) -> String {
    let price = format_price(listing.price);
    let location = listing.location.as_deref().unwrap_or("-");
    format!(
        "<tr><td><a href=\"{url}\">{title}</a></td><td>{price}</td><td>{location}</td></tr>",
        url = escape_html(&listing.listing_url),
        title = escape_html(&listing.title),
        price = escape_html(&price),
        location = escape_html(location),
    )
}

/// Format a price for display; zero means the item is given away.
#[must_use]
pub fn format_price(price: f64) -> String {
    if price == 0.0 {
        "Zu verschenken".to_string()
    } else if (price - price.trunc()).abs() < f64::EPSILON {
        format!("{price:.0} €")
    } else {
        format!("{price:.2} €").replace('.', ",")
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use adscout_core::SellerType;
    use chrono::Utc;

    fn sample_record(title: &str, price: f64) -> ListingRecord {
        ListingRecord {
            id: "row-1".to_string(),
            listing_id: "2754312098".to_string(),
            title: title.to_string(),
            description: None,
            price,
            location: Some("76133 Karlsruhe".to_string()),
            postal_code: Some("76133".to_string()),
            distance_km: None,
            seller_name: None,
            seller_type: SellerType::Private,
            seller_id: None,
            category: None,
            subcategory: None,
            condition: None,
            listing_date: None,
            view_count: None,
            listing_url: "https://www.kleinanzeigen.de/s-anzeige/2754312098".to_string(),
            thumbnail_url: None,
            image_urls: Vec::new(),
            phone_number: None,
            contact_name: None,
            first_seen: Utc::now(),
            last_seen: Utc::now(),
            is_active: true,
            times_seen: 1,
            crawl_session_id: "s1".to_string(),
        }
    }

    #[test]
    fn test_subject_contains_count() {
        let listings = vec![sample_record("Faust", 10.0), sample_record("Werther", 5.5)];
        let digest = render_digest(&listings);
        assert_eq!(digest.subject, "Neue Bücher auf Kleinanzeigen: 2 Anzeigen");
    }

    #[test]
    fn test_body_contains_listing_rows() {
        let digest = render_digest(&[sample_record("Faust", 10.0)]);
        assert!(digest.html_body.contains("Faust"));
        assert!(digest.html_body.contains("10 €"));
        assert!(digest.html_body.contains("76133 Karlsruhe"));
        assert!(digest
            .html_body
            .contains("https://www.kleinanzeigen.de/s-anzeige/2754312098"));
    }

    #[test]
    fn test_free_listing_renders_as_giveaway() {
        let digest = render_digest(&[sample_record("Alte Romane", 0.0)]);
        assert!(digest.html_body.contains("Zu verschenken"));
    }

    #[test]
    fn test_price_formatting() {
        assert_eq!(format_price(0.0), "Zu verschenken");
        assert_eq!(format_price(10.0), "10 €");
        assert_eq!(format_price(5.5), "5,50 €");
    }

    #[test]
    fn test_html_is_escaped() {
        let digest = render_digest(&[sample_record("<script>alert(1)</script>", 1.0)]);
        assert!(!digest.html_body.contains("<script>"));
        assert!(digest.html_body.contains("&lt;script&gt;"));
    }
}
