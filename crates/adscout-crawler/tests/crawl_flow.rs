//! End-to-end crawl session tests against a scripted browser driver
//! and an in-memory database.

use adscout_browser::{BrowserError, Driver};
use adscout_core::{CrawlerConfig, SearchParams};
use adscout_crawler::orchestrator::CrawlOrchestrator;
use adscout_db::{listings, Database, SessionStatus};
use adscout_notify::{Notifier, NotifyError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASE_URL: &str = "https://example.test";

/// Scripted content of one page.
#[derive(Default, Clone)]
struct PageScript {
    texts: HashMap<String, Vec<String>>,
    attrs: HashMap<(String, String), Vec<String>>,
    clickable: HashSet<String>,
    present: HashSet<String>,
}

impl PageScript {
    fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts
            .entry(selector.to_string())
            .or_default()
            .push(text.to_string());
        self
    }

    fn with_attrs(mut self, selector: &str, attr: &str, values: &[&str]) -> Self {
        self.attrs.insert(
            (selector.to_string(), attr.to_string()),
            values.iter().map(|v| (*v).to_string()).collect(),
        );
        self
    }

    fn with_clickable(mut self, selector: &str) -> Self {
        self.clickable.insert(selector.to_string());
        self
    }

    fn with_present(mut self, selector: &str) -> Self {
        self.present.insert(selector.to_string());
        self
    }

    fn has(&self, selector: &str) -> bool {
        self.texts.contains_key(selector)
            || self.clickable.contains(selector)
            || self.present.contains(selector)
    }
}

#[derive(Clone, Copy)]
enum NavFailure {
    Transient,
    Fatal,
}

struct MockState {
    pages: HashMap<String, PageScript>,
    nav_failures: HashMap<String, (NavFailure, u32)>,
    current: String,
}

/// Scripted driver; pages are keyed by URL, lookups hit the page last
/// navigated to.
#[derive(Clone)]
struct MockDriver {
    state: Arc<Mutex<MockState>>,
    close_count: Arc<AtomicU32>,
}

impl MockDriver {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                pages: HashMap::new(),
                nav_failures: HashMap::new(),
                current: String::new(),
            })),
            close_count: Arc::new(AtomicU32::new(0)),
        }
    }

    fn add_page(&self, url: &str, script: PageScript) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), script);
    }

    /// Make navigation to `url` fail `count` times.
    fn fail_navigation(&self, url: &str, failure: NavFailure, count: u32) {
        self.state
            .lock()
            .unwrap()
            .nav_failures
            .insert(url.to_string(), (failure, count));
    }

    fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }

    fn current_page<T>(&self, f: impl FnOnce(&PageScript) -> T) -> T {
        let state = self.state.lock().unwrap();
        let script = state.pages.get(&state.current).cloned().unwrap_or_default();
        f(&script)
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn navigate(&self, url: &str) -> adscout_browser::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some((failure, remaining)) = state.nav_failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return match failure {
                    NavFailure::Transient => {
                        Err(BrowserError::Navigation(format!("cannot load {url}")))
                    }
                    NavFailure::Fatal => {
                        Err(BrowserError::WindowClosed("browser crashed".to_string()))
                    }
                };
            }
        }
        state.current = url.to_string();
        Ok(())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> adscout_browser::Result<()> {
        if self.current_page(|p| p.has(selector)) {
            Ok(())
        } else {
            Err(BrowserError::Timeout(selector.to_string()))
        }
    }

    async fn text(&self, selector: &str) -> adscout_browser::Result<Option<String>> {
        Ok(self.current_page(|p| {
            p.texts
                .get(selector)
                .and_then(|texts| texts.first())
                .filter(|t| !t.is_empty())
                .cloned()
        }))
    }

    async fn text_all(&self, selector: &str) -> adscout_browser::Result<Vec<String>> {
        Ok(self.current_page(|p| p.texts.get(selector).cloned().unwrap_or_default()))
    }

    async fn attr(&self, selector: &str, name: &str) -> adscout_browser::Result<Option<String>> {
        Ok(self.current_page(|p| {
            p.attrs
                .get(&(selector.to_string(), name.to_string()))
                .and_then(|values| values.first())
                .cloned()
        }))
    }

    async fn attr_all(&self, selector: &str, name: &str) -> adscout_browser::Result<Vec<String>> {
        Ok(self.current_page(|p| {
            p.attrs
                .get(&(selector.to_string(), name.to_string()))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn fill(&self, _selector: &str, _value: &str) -> adscout_browser::Result<()> {
        Ok(())
    }

    async fn click(&self, selector: &str) -> adscout_browser::Result<bool> {
        Ok(self.current_page(|p| p.clickable.contains(selector)))
    }

    async fn exists(&self, selector: &str) -> adscout_browser::Result<bool> {
        Ok(self.current_page(|p| p.has(selector)))
    }

    async fn close(&self) -> adscout_browser::Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Notifier that records the size of every delivered batch.
#[derive(Default)]
struct RecordingNotifier {
    batches: Mutex<Vec<usize>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_new_listings(
        &self,
        listings: &[adscout_db::ListingRecord],
    ) -> Result<(), NotifyError> {
        self.batches.lock().unwrap().push(listings.len());
        Ok(())
    }
}

fn test_config() -> CrawlerConfig {
    CrawlerConfig {
        base_url: BASE_URL.to_string(),
        delay_between_requests_ms: 0,
        retry_max_attempts: 3,
        retry_initial_delay_ms: 1,
        retry_backoff: 2.0,
    }
}

fn test_params(keywords: &[&str]) -> SearchParams {
    SearchParams {
        category: "antike-buecher".to_string(),
        location: String::new(),
        keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        ..SearchParams::default()
    }
}

fn search_page_url() -> String {
    format!("{BASE_URL}/s-antike-buecher/k0")
}

fn search_page(result_hrefs: &[&str]) -> PageScript {
    PageScript::default()
        .with_present("#site-search-query")
        .with_clickable("button[type='submit']")
        .with_attrs("article.aditem a[href*='/s-anzeige/']", "href", result_hrefs)
}

fn listing_page(title: &str, price: &str, locality: &str) -> PageScript {
    PageScript::default()
        .with_text("h1#viewad-title", title)
        .with_text("#viewad-price", price)
        .with_text("#viewad-locality", locality)
        .with_text("#viewad-description-text", "Gut erhaltene Sammlung.")
}

async fn setup_db() -> Arc<Database> {
    let db = Database::new(":memory:").await.expect("open database");
    db.run_migrations().await.expect("run migrations");
    Arc::new(db)
}

#[tokio::test]
async fn test_session_with_no_keywords_completes_empty() {
    let db = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let driver = MockDriver::new();
    driver.add_page(&search_page_url(), search_page(&[]));

    let orchestrator = CrawlOrchestrator::new(
        db.clone(),
        notifier.clone(),
        test_config(),
        Duration::from_millis(10),
    );
    let session = orchestrator
        .run_once(driver.clone(), &test_params(&[]))
        .await
        .expect("session completes");

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.total_listings_found, 0);
    assert_eq!(session.new_listings_found, 0);
    assert_eq!(session.pages_crawled, 0);
    assert!(session.ended_at.is_some());
    assert!(notifier.batches.lock().unwrap().is_empty());
    assert_eq!(driver.close_count(), 1);
}

#[tokio::test]
async fn test_failed_listing_is_skipped_and_session_completes() {
    let db = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let driver = MockDriver::new();

    driver.add_page(
        &search_page_url(),
        search_page(&["/s-anzeige/erstausgabe/111", "/s-anzeige/konvolut/222"]),
    );
    // Listing 111 never loads; 222 is fine.
    driver.fail_navigation(
        &format!("{BASE_URL}/s-anzeige/erstausgabe/111"),
        NavFailure::Transient,
        u32::MAX,
    );
    driver.add_page(
        &format!("{BASE_URL}/s-anzeige/konvolut/222"),
        listing_page("Konvolut alter Romane", "5,50 €", "76133 Karlsruhe"),
    );

    let orchestrator = CrawlOrchestrator::new(
        db.clone(),
        notifier.clone(),
        test_config(),
        Duration::from_millis(10),
    );
    let session = orchestrator
        .run_once(driver.clone(), &test_params(&["romane"]))
        .await
        .expect("session completes despite one bad listing");

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.total_listings_found, 2);
    assert_eq!(session.new_listings_found, 1);
    assert_eq!(session.updated_listings, 0);
    assert_eq!(session.pages_crawled, 1);

    let stored = listings::get_by_listing_id(db.pool(), "222")
        .await
        .expect("query listing")
        .expect("listing stored");
    assert_eq!(stored.title, "Konvolut alter Romane");
    assert_eq!(stored.price, 5.5);
    assert_eq!(stored.postal_code.as_deref(), Some("76133"));
    assert_eq!(stored.crawl_session_id, session.id);

    assert_eq!(*notifier.batches.lock().unwrap(), vec![1]);
    assert_eq!(driver.close_count(), 1);
}

#[tokio::test]
async fn test_discovery_failure_fails_session_and_closes_driver() {
    let db = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let driver = MockDriver::new();
    driver.fail_navigation(&search_page_url(), NavFailure::Fatal, u32::MAX);

    let orchestrator = CrawlOrchestrator::new(
        db.clone(),
        notifier.clone(),
        test_config(),
        Duration::from_millis(10),
    );
    let result = orchestrator
        .run_once(driver.clone(), &test_params(&["romane"]))
        .await;
    assert!(result.is_err(), "discovery failure must propagate");

    // The failed session is recorded with its error message.
    let session_id: String = sqlx::query_scalar("SELECT id FROM crawl_sessions")
        .fetch_one(db.pool())
        .await
        .expect("one session row");
    let session = adscout_db::crawl_sessions::get_session(db.pool(), &session_id)
        .await
        .expect("query session")
        .expect("session exists");
    assert_eq!(session.status, SessionStatus::Failed);
    assert!(session
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("browser"));

    assert!(notifier.batches.lock().unwrap().is_empty());
    assert_eq!(driver.close_count(), 1);
}

#[tokio::test]
async fn test_driver_closed_when_session_creation_fails() {
    let db = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let driver = MockDriver::new();
    driver.add_page(&search_page_url(), search_page(&[]));

    // Creating the session row cannot succeed without its table.
    sqlx::query("DROP TABLE crawl_sessions")
        .execute(db.pool())
        .await
        .expect("drop sessions table");

    let orchestrator = CrawlOrchestrator::new(
        db.clone(),
        notifier.clone(),
        test_config(),
        Duration::from_millis(10),
    );
    let result = orchestrator
        .run_once(driver.clone(), &test_params(&[]))
        .await;

    assert!(result.is_err(), "session creation failure must propagate");
    assert_eq!(
        driver.close_count(),
        1,
        "driver must be closed on every failure path"
    );
    assert!(notifier.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_test_mode_caps_listings_and_suppresses_notification() {
    let db = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let driver = MockDriver::new();

    let hrefs: Vec<String> = (301..=307)
        .map(|n| format!("/s-anzeige/buch/{n}"))
        .collect();
    let href_refs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
    driver.add_page(&search_page_url(), search_page(&href_refs));
    for n in 301..=307 {
        driver.add_page(
            &format!("{BASE_URL}/s-anzeige/buch/{n}"),
            listing_page(&format!("Buch {n}"), "Zu verschenken", "76131 Karlsruhe"),
        );
    }

    let orchestrator = CrawlOrchestrator::new(
        db.clone(),
        notifier.clone(),
        test_config(),
        Duration::from_millis(10),
    )
    .with_test_mode(true);
    let session = orchestrator
        .run_once(driver.clone(), &test_params(&["buch"]))
        .await
        .expect("session completes");

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.total_listings_found, 5);
    assert_eq!(session.new_listings_found, 5);
    assert!(
        notifier.batches.lock().unwrap().is_empty(),
        "test mode must not notify"
    );
}

#[tokio::test]
async fn test_duplicate_references_across_keywords_counted_once() {
    let db = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let driver = MockDriver::new();

    // Both keyword searches surface the same listing.
    driver.add_page(&search_page_url(), search_page(&["/s-anzeige/sammlung/500"]));
    driver.add_page(
        &format!("{BASE_URL}/s-anzeige/sammlung/500"),
        listing_page("Sammlung Goethe", "20 €", "76133 Karlsruhe"),
    );

    let orchestrator = CrawlOrchestrator::new(
        db.clone(),
        notifier.clone(),
        test_config(),
        Duration::from_millis(10),
    );
    let session = orchestrator
        .run_once(driver.clone(), &test_params(&["goethe", "sammlung"]))
        .await
        .expect("session completes");

    assert_eq!(session.total_listings_found, 1);
    assert_eq!(session.new_listings_found, 1);
    assert_eq!(session.pages_crawled, 2, "one result page per keyword");
}

#[tokio::test]
async fn test_pagination_stops_at_page_cap() {
    let db = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let driver = MockDriver::new();

    // The next-page control is always clickable; only the cap stops
    // the walk.
    driver.add_page(
        &search_page_url(),
        search_page(&["/s-anzeige/buch/600"]).with_clickable("a.pagination-next"),
    );
    driver.add_page(
        &format!("{BASE_URL}/s-anzeige/buch/600"),
        listing_page("Altes Buch", "Zu verschenken", "76131 Karlsruhe"),
    );

    let params = SearchParams {
        max_pages: 3,
        ..test_params(&["buch"])
    };
    let orchestrator = CrawlOrchestrator::new(
        db.clone(),
        notifier.clone(),
        test_config(),
        Duration::from_millis(10),
    );
    let session = orchestrator
        .run_once(driver.clone(), &params)
        .await
        .expect("session completes");

    assert_eq!(session.pages_crawled, 3);
    assert_eq!(session.total_listings_found, 1, "same href deduplicated");
}

#[tokio::test]
async fn test_failing_keyword_is_skipped() {
    let db = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let driver = MockDriver::new();

    // Search form present but the submit control is missing: every
    // keyword sub-search fails, the session still completes.
    driver.add_page(
        &search_page_url(),
        PageScript::default().with_present("#site-search-query"),
    );

    let orchestrator = CrawlOrchestrator::new(
        db.clone(),
        notifier.clone(),
        test_config(),
        Duration::from_millis(10),
    );
    let session = orchestrator
        .run_once(driver.clone(), &test_params(&["romane", "lyrik"]))
        .await
        .expect("session completes with all keywords skipped");

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.total_listings_found, 0);
    assert_eq!(session.pages_crawled, 0);
}

#[tokio::test]
async fn test_second_run_updates_instead_of_duplicating() {
    let db = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());

    let make_driver = || {
        let driver = MockDriver::new();
        driver.add_page(&search_page_url(), search_page(&["/s-anzeige/faust/999"]));
        driver.add_page(
            &format!("{BASE_URL}/s-anzeige/faust/999"),
            listing_page("Faust Erstdruck", "120 €", "76133 Karlsruhe"),
        );
        driver
    };

    let orchestrator = CrawlOrchestrator::new(
        db.clone(),
        notifier.clone(),
        test_config(),
        Duration::from_millis(10),
    );

    let first = orchestrator
        .run_once(make_driver(), &test_params(&["faust"]))
        .await
        .expect("first run");
    assert_eq!(first.new_listings_found, 1);
    assert_eq!(first.updated_listings, 0);

    let second = orchestrator
        .run_once(make_driver(), &test_params(&["faust"]))
        .await
        .expect("second run");
    assert_eq!(second.new_listings_found, 0);
    assert_eq!(second.updated_listings, 1);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
        .fetch_one(db.pool())
        .await
        .expect("count listings");
    assert_eq!(count, 1);

    let stored = listings::get_by_listing_id(db.pool(), "999")
        .await
        .expect("query listing")
        .expect("listing stored");
    assert_eq!(stored.times_seen, 2);
    assert_eq!(stored.crawl_session_id, first.id, "owning session is kept");
}
