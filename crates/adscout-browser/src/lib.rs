//! adscout Browser - Browser automation layer.
//!
//! Exposes the [`Driver`] trait the crawler is written against and a
//! chromiumoxide-backed implementation, [`ChromiumDriver`]. The error
//! taxonomy distinguishes transient failures (timeouts, stale element
//! references, connection resets) from fatal ones (session creation,
//! destroyed windows); the crawler's retry layer only retries the
//! former.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod driver;
pub mod engine;
pub mod error;

pub use driver::Driver;
pub use engine::ChromiumDriver;
pub use error::{BrowserError, Result};
