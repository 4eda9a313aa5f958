use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Common trait for page fetchers
/// Implementations return the HTML of `url`, rendered if the backend can run JavaScript
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a page and return its HTML
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Get the name of the fetch backend
    fn backend_name(&self) -> &'static str;
}

/// Run `attempt` until it succeeds or `retries` extra attempts have failed
pub async fn with_retries<F, Fut, T>(
    url: &str,
    retries: u32,
    backoff: Duration,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if tries < retries => {
                tries += 1;
                warn!("Attempt {}/{} for {} failed: {:#}", tries, retries + 1, url, err);
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}


/// In-memory fetcher for tests: known URLs return their HTML, anything else fails
#[cfg(test)]
pub struct StaticFetcher {
    pages: std::collections::HashMap<String, String>,
    requested: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl StaticFetcher {
    pub fn new<I, K, V>(pages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            requested: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no page for {}", url))
    }

    fn backend_name(&self) -> &'static str {
        "static"
    }
}
