use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Greater Accra rentals on Jiji, `{}` is replaced with the page number
pub const DEFAULT_BASE_URL: &str =
    "https://jiji.com.gh/greater-accra/houses-apartments-for-rent?page={}";

/// Adverts per search results page on Jiji
pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub const DEFAULT_HOUSE_TYPE: &str = "Bedsitter";

/// Runtime settings for a scrape
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub page_size: u32,
    /// Maximum listing pages fetched at the same time
    pub concurrency: usize,
    /// Extra attempts after a failed request
    pub retries: u32,
    pub timeout: Duration,
    /// Pause between requests
    pub delay: Duration,
    /// Render pages in headless Chrome instead of a plain HTTP GET
    pub render_js: bool,
    pub output_dir: PathBuf,
    pub default_house_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: 8,
            retries: 2,
            timeout: Duration::from_secs(60),
            delay: Duration::from_millis(300),
            render_js: true,
            output_dir: PathBuf::from("outputs"),
            default_house_type: DEFAULT_HOUSE_TYPE.to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by any `SCOUT_*` variables that are set
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            base_url: env::var("SCOUT_BASE_URL").unwrap_or(defaults.base_url),
            page_size: env_or("SCOUT_PAGE_SIZE", defaults.page_size)?,
            concurrency: env_or("SCOUT_CONCURRENCY", defaults.concurrency)?,
            retries: env_or("SCOUT_RETRIES", defaults.retries)?,
            timeout: Duration::from_secs(env_or(
                "SCOUT_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            delay: Duration::from_millis(env_or(
                "SCOUT_DELAY_MS",
                defaults.delay.as_millis() as u64,
            )?),
            render_js: env_or("SCOUT_RENDER_JS", defaults.render_js)?,
            output_dir: env::var("SCOUT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            default_house_type: defaults.default_house_type,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page size must be at least 1");
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base URL must start with http:// or https://: {}", self.base_url);
        }
        Ok(())
    }

    pub fn urls_dir(&self) -> PathBuf {
        self.output_dir.join("urls")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.output_dir.join("data")
    }

    pub fn clean_dir(&self) -> PathBuf {
        self.output_dir.join("clean")
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
