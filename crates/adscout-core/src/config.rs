//! Configuration management for adscout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::SearchParams;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// Loaded from `~/.config/adscout/config.toml` (or platform
/// equivalent). Missing file or missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database settings
    pub database: DatabaseConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Crawl behavior settings
    pub crawler: CrawlerConfig,
    /// Search parameters for scheduled runs
    pub search: SearchParams,
    /// Email notification settings
    pub notifications: NotificationConfig,
    /// Scheduled-run settings
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(Self::config_path()?)
    }

    /// Load configuration from an explicit path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(&path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `ADSCOUT_DB_PATH`: Override the database file path
    /// - `ADSCOUT_HEADLESS`: Override browser headless mode (true/false)
    /// - `ADSCOUT_SMTP_PASSWORD`: SMTP credential, kept out of the config file
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides to an already loaded config.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("ADSCOUT_DB_PATH") {
            self.database.path = PathBuf::from(val);
            tracing::debug!("Override database.path from env");
        }

        if let Ok(val) = std::env::var("ADSCOUT_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("ADSCOUT_SMTP_PASSWORD") {
            self.notifications.smtp_password = val;
            tracing::debug!("Override notifications.smtp_password from env");
        }
    }

    /// Save configuration to disk, creating the config directory if needed.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/adscout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("de", "adscout", "adscout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path, used for the default database location.
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("de", "adscout", "adscout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("adscout.db"),
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run the browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Page navigation timeout in seconds
    pub page_load_timeout_secs: u64,
    /// Element wait timeout in seconds
    pub element_wait_timeout_secs: u64,
    /// Optional user agent override
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            page_load_timeout_secs: 30,
            element_wait_timeout_secs: 10,
            user_agent: None,
        }
    }
}

/// Crawl behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Base URL of the classifieds site
    pub base_url: String,
    /// Base delay between consecutive page fetches in milliseconds;
    /// the actual pause is jittered between 0.5x and 1.5x of this.
    pub delay_between_requests_ms: u64,
    /// Maximum retry attempts for transient failures
    pub retry_max_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_initial_delay_ms: u64,
    /// Multiplier applied to the retry delay after each failure
    pub retry_backoff: f64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.kleinanzeigen.de".to_string(),
            delay_between_requests_ms: 3000,
            retry_max_attempts: 3,
            retry_initial_delay_ms: 2000,
            retry_backoff: 2.0,
        }
    }
}

/// Email notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Whether email notifications are enabled
    pub enabled: bool,
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP relay port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password; prefer the `ADSCOUT_SMTP_PASSWORD` env variable
    #[serde(skip_serializing)]
    pub smtp_password: String,
    /// Sender address
    pub sender: String,
    /// Recipient addresses
    pub recipients: Vec<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            sender: String::new(),
            recipients: Vec::new(),
        }
    }
}

/// Scheduled-run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Hours between scheduled crawl sessions
    pub interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_hours: 6 }
    }
}
