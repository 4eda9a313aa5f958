use crate::scrapers::traits::{with_retries, Fetcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Fetcher that renders pages in headless Chrome
#[derive(Clone)]
pub struct BrowserFetcher {
    browser: Browser,
    wait_for: Option<String>,
    timeout: Duration,
    retries: u32,
}

impl BrowserFetcher {
    /// Launch headless Chrome
    pub fn launch(timeout: Duration, retries: u32) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            // Chrome shuts itself down after this long without a command
            .idle_browser_timeout(timeout * 4)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser,
            wait_for: None,
            timeout,
            retries,
        })
    }

    /// Same browser, but each fetch waits for `selector` before reading the page
    pub fn waiting_for(&self, selector: &str) -> Self {
        Self {
            wait_for: Some(selector.to_string()),
            ..self.clone()
        }
    }
}

/// Render `url` in a fresh tab. The tab is closed whatever the outcome.
fn render(browser: &Browser, url: &str, wait_for: Option<&str>, timeout: Duration) -> Result<String> {
    let tab = browser.new_tab().context("Failed to open browser tab")?;
    tab.set_default_timeout(timeout);

    let result = (|| -> Result<String> {
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;

        if let Some(selector) = wait_for {
            tab.wait_for_element(selector)
                .with_context(|| format!("Timed out waiting for {}", selector))?;
        }

        tab.get_content()
    })();

    if let Err(e) = tab.close(true) {
        debug!("Error closing tab for {}: {}", url, e);
    }

    result.with_context(|| format!("Failed to render {}", url))
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        with_retries(url, self.retries, Duration::from_secs(1), || {
            let browser = self.browser.clone();
            let url = url.to_string();
            let wait_for = self.wait_for.clone();
            let timeout = self.timeout;
            async move {
                let html = tokio::task::spawn_blocking(move || {
                    render(&browser, &url, wait_for.as_deref(), timeout)
                })
                .await
                .context("Render task panicked")??;

                debug!("Rendered {} bytes of HTML", html.len());
                Ok(html)
            }
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "headless-chrome"
    }
}
