use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use adscout_core::BrowserConfig as BrowserSettings;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How often [`Driver::wait_for`] polls for the selector.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Chromium-backed [`Driver`] implementation.
///
/// Owns one browser process and a single page; the crawler runs
/// strictly sequentially, so no tab pooling is needed.
pub struct ChromiumDriver {
    browser: Mutex<Browser>,
    page: Page,
}

impl ChromiumDriver {
    /// Launch a browser process and open a blank page.
    ///
    /// # Errors
    /// Returns [`BrowserError::SessionCreation`] if the browser cannot
    /// be launched; this kind is never retried.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.window_width, settings.window_height)
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(user_agent) = &settings.user_agent {
            builder = builder.arg(format!("--user-agent={user_agent}"));
        }

        let config = builder
            .request_timeout(Duration::from_secs(settings.page_load_timeout_secs))
            .build()
            .map_err(BrowserError::SessionCreation)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::SessionCreation(e.to_string()))?;

        // Drive the CDP event loop for the lifetime of the browser.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::SessionCreation(e.to_string()))?;

        tracing::info!("Browser driver launched");

        Ok(Self {
            browser: Mutex::new(browser),
            page,
        })
    }
}

#[async_trait::async_trait]
impl Driver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation(e.to_string()))
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(selector.to_string()));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn text(&self, selector: &str) -> Result<Option<String>> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(None);
        };
        let text = element
            .inner_text()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        Ok(text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
    }

    async fn text_all(&self, selector: &str) -> Result<Vec<String>> {
        let Ok(elements) = self.page.find_elements(selector).await else {
            return Ok(Vec::new());
        };
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            if let Ok(Some(text)) = element.inner_text().await {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    texts.push(text);
                }
            }
        }
        Ok(texts)
    }

    async fn attr(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(None);
        };
        element
            .attribute(name)
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn attr_all(&self, selector: &str, name: &str) -> Result<Vec<String>> {
        let Ok(elements) = self.page.find_elements(selector).await else {
            return Ok(Vec::new());
        };
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            if let Ok(Some(value)) = element.attribute(name).await {
                values.push(value);
            }
        }
        Ok(values)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::StaleElement(format!("{selector}: {e}")))?;
        element
            .focus()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        element
            .type_str(value)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(false);
        };
        element
            .click()
            .await
            .map(|_| true)
            .map_err(|e| BrowserError::StaleElement(format!("{selector}: {e}")))
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        let _ = browser.wait().await;
        tracing::info!("Browser driver closed");
        Ok(())
    }
}
