//! adscout Core - Foundation crate for the adscout listing crawler.
//!
//! This crate provides the shared domain types and configuration
//! management that all other adscout crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Configuration error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared domain types (`SearchParams`, `Listing`, `SellerType`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, CrawlerConfig, DatabaseConfig, NotificationConfig, ScheduleConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use types::{Listing, SearchParams, SellerType};
