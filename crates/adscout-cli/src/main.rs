//! adscout command-line entry point.
//!
//! Runs a single crawl session by default; `--schedule` keeps running
//! sessions at the configured interval until interrupted.

use adscout_browser::ChromiumDriver;
use adscout_core::AppConfig;
use adscout_crawler::CrawlOrchestrator;
use adscout_db::Database;
use adscout_notify::{EmailNotifier, Notifier, NullNotifier};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// adscout: a classified-ads crawler for used book listings
///
/// Discovers listings through the site's search UI, stores them
/// deduplicated in a local SQLite database and emails a digest when
/// something new turns up.
#[derive(Parser, Debug)]
#[command(name = "adscout")]
#[command(version)]
#[command(about = "Classified-ads listing crawler", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (default: XDG config dir)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep running sessions at the configured interval
    #[arg(long)]
    schedule: bool,

    /// Initialize the database and exit
    #[arg(long)]
    init_db: bool,

    /// Short verification run: a handful of listings, no notifications
    #[arg(long)]
    test_mode: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_config(&cli)?;

    let db_path = resolve_db_path(&config)?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }

    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("opening database at {}", db_path.display()))?;
    db.run_migrations().await.context("running migrations")?;

    if cli.init_db {
        let version = db.get_schema_version().await?;
        println!("Database initialized at {} (schema v{version})", db_path.display());
        return Ok(());
    }

    let db = Arc::new(db);
    if config.notifications.enabled && !cli.test_mode {
        let notifier = EmailNotifier::from_config(&config.notifications)
            .context("building email notifier")?;
        run(&cli, &config, db, Arc::new(notifier)).await
    } else {
        run(&cli, &config, db, Arc::new(NullNotifier)).await
    }
}

async fn run<N: Notifier>(
    cli: &Cli,
    config: &AppConfig,
    db: Arc<Database>,
    notifier: Arc<N>,
) -> anyhow::Result<()> {
    let wait_timeout = Duration::from_secs(config.browser.element_wait_timeout_secs);
    let orchestrator = CrawlOrchestrator::new(db, notifier, config.crawler.clone(), wait_timeout)
        .with_test_mode(cli.test_mode);

    loop {
        match run_session(&orchestrator, config).await {
            Ok(()) => {}
            Err(e) if cli.schedule => {
                tracing::error!(error = %e, "Session failed, waiting for next run");
            }
            Err(e) => return Err(e),
        }

        if !cli.schedule {
            return Ok(());
        }

        let interval = Duration::from_secs(config.schedule.interval_hours * 3600);
        tracing::info!(
            interval_hours = config.schedule.interval_hours,
            "Waiting until next scheduled run"
        );
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                return Ok(());
            }
        }
    }
}

async fn run_session<N: Notifier>(
    orchestrator: &CrawlOrchestrator<N>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let driver = ChromiumDriver::launch(&config.browser)
        .await
        .context("launching browser")?;

    let session = orchestrator
        .run_once(driver, &config.search)
        .await
        .context("running crawl session")?;

    tracing::info!(
        session_id = %session.id,
        total = session.total_listings_found,
        new = session.new_listings_found,
        updated = session.updated_listings,
        pages = session.pages_crawled,
        "Session finished"
    );
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            config.apply_env();
            config
        }
        None => AppConfig::load_with_env().context("loading config")?,
    };
    Ok(config)
}

/// A relative database path lands in the XDG data directory.
fn resolve_db_path(config: &AppConfig) -> anyhow::Result<PathBuf> {
    let path = &config.database.path;
    if path.is_absolute() || path.to_string_lossy().contains(":memory:") {
        Ok(path.clone())
    } else {
        Ok(AppConfig::data_dir()
            .context("resolving data directory")?
            .join(path))
    }
}

fn setup_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},chromiumoxide=warn")));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
