use crate::error::Result;
use std::time::Duration;

/// Selector-oriented browser driver interface.
///
/// The crawler talks to the browser exclusively through this trait so
/// that discovery and extraction can be exercised against a scripted
/// implementation in tests. All lookups take CSS selectors; element
/// handles are never exposed.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Navigate the page to a URL.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait until an element matching the selector is present.
    ///
    /// Returns [`crate::BrowserError::Timeout`] if the deadline passes.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Trimmed text content of the first matching element, `None` when
    /// the element is absent or empty.
    async fn text(&self, selector: &str) -> Result<Option<String>>;

    /// Trimmed text content of every matching element.
    async fn text_all(&self, selector: &str) -> Result<Vec<String>>;

    /// Attribute value of the first matching element.
    async fn attr(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Attribute values of every matching element that carries it.
    async fn attr_all(&self, selector: &str, name: &str) -> Result<Vec<String>>;

    /// Clear a form field and type a value into it.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Click the first matching element.
    ///
    /// Returns `false` when no element matches; interaction steps in
    /// the crawler are skip-on-failure and branch on this.
    async fn click(&self, selector: &str) -> Result<bool>;

    /// Whether an element matching the selector is currently present.
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Release the underlying browser resource.
    async fn close(&self) -> Result<()>;
}
