use crate::cleaner::{retain_long_term_rentals, DataCleaner};
use crate::config::Config;
use crate::models::{CleanedTable, ListingRecord, UrlRecord};
use crate::output;
use crate::scrapers::{BrowserFetcher, DetailExtractor, Fetcher, HttpFetcher, SiteSelectors, UrlCollector};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const URLS_PREFIX: &str = "listingURLS";
pub const LISTINGS_PREFIX: &str = "listings";
pub const CLEAN_PREFIX: &str = "listings_clean";
pub const REMAINING_PREFIX: &str = "remaining_urls";

/// Runs the scrape stages and writes their CSV outputs
pub struct Pipeline {
    config: Config,
    selectors: SiteSelectors,
}

impl Pipeline {
    pub fn new(config: Config, selectors: SiteSelectors) -> Self {
        Self { config, selectors }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetcher for one stage, `ready` is the element a rendered page must contain
    fn fetcher(&self, ready: &str) -> Result<Box<dyn Fetcher>> {
        let fetcher: Box<dyn Fetcher> = if self.config.render_js {
            let browser = BrowserFetcher::launch(self.config.timeout, self.config.retries)?;
            Box::new(browser.waiting_for(ready))
        } else {
            Box::new(HttpFetcher::new(self.config.timeout, self.config.retries)?)
        };
        info!("Using {} fetcher", fetcher.backend_name());
        Ok(fetcher)
    }

    /// Stage 1: collect listing URLs from `base_url` covering `total` listings
    pub async fn collect_urls(&self, base_url: &str, total: u32) -> Result<(PathBuf, Vec<UrlRecord>)> {
        info!("🚀 Starting URL collection");
        info!("🌐 Base URL: {}", base_url);

        let fetcher = self.fetcher(&self.selectors.search_ready)?;
        let collector = UrlCollector::new(
            &*fetcher,
            base_url,
            self.config.page_size,
            self.selectors.listing_link_selector()?,
        )
        .with_delay(self.config.delay);

        let records = collector.collect(total).await?;

        let path = output::timestamped_path(&self.config.urls_dir(), URLS_PREFIX);
        output::write_url_records(&path, &records)?;
        Ok((path, records))
    }

    /// Stage 2: scrape detail fields for every URL in `urls_file`
    pub async fn extract_details(&self, urls_file: &Path) -> Result<(PathBuf, Vec<ListingRecord>)> {
        info!("🚀 Starting listing extraction");
        info!("📂 URL file: {}", urls_file.display());

        let urls = output::read_url_records(urls_file)?;
        info!("Loaded {} URLs", urls.len());
        self.extract_records(&urls).await
    }

    async fn extract_records(&self, urls: &[UrlRecord]) -> Result<(PathBuf, Vec<ListingRecord>)> {
        let fetcher = self.fetcher(&self.selectors.listing_ready)?;
        let extractor = DetailExtractor::new(&*fetcher, self.selectors.compile_listing()?)
            .with_concurrency(self.config.concurrency)
            .with_delay(self.config.delay);

        let listings = extractor.extract_all(urls).await;

        let path = output::timestamped_path(&self.config.data_dir(), LISTINGS_PREFIX);
        output::write_listings(&path, &listings)?;
        Ok((path, listings))
    }

    /// Stage 3: clean a detail file into the final table. A file that is
    /// already cleaned is cleaned again, which leaves it unchanged.
    pub fn clean_file(&self, file: &Path, long_term_only: bool) -> Result<(PathBuf, CleanedTable)> {
        let cleaner = DataCleaner::new(&self.config.default_house_type);

        let table = if output::is_cleaned_file(file)? {
            let table = output::read_cleaned(file)
                .with_context(|| format!("Failed to load cleaned listings from {}", file.display()))?;
            info!("📂 Loaded {} cleaned listings from {}", table.len(), file.display());
            cleaner.reclean(&table)
        } else {
            let listings = output::read_listings(file)
                .with_context(|| format!("Failed to load listings from {}", file.display()))?;
            info!("📂 Loaded {} listings from {}", listings.len(), file.display());
            cleaner.clean(&listings)
        };

        self.save_cleaned(table, long_term_only)
    }

    fn clean_records(&self, listings: &[ListingRecord], long_term_only: bool) -> Result<(PathBuf, CleanedTable)> {
        let cleaner = DataCleaner::new(&self.config.default_house_type);
        self.save_cleaned(cleaner.clean(listings), long_term_only)
    }

    fn save_cleaned(&self, mut table: CleanedTable, long_term_only: bool) -> Result<(PathBuf, CleanedTable)> {
        if long_term_only {
            retain_long_term_rentals(&mut table);
        }
        if table.is_empty() {
            warn!("No listings left after cleaning");
        }

        let path = output::timestamped_path(&self.config.clean_dir(), CLEAN_PREFIX);
        output::write_cleaned(&path, &table)?;
        Ok((path, table))
    }

    /// All three stages back to back. Returns the cleaned file, if any listings were found.
    pub async fn run_all(&self, base_url: &str, total: u32, long_term_only: bool) -> Result<Option<PathBuf>> {
        let (_, urls) = self.collect_urls(base_url, total).await?;
        if urls.is_empty() {
            warn!("No listing URLs collected, stopping");
            return Ok(None);
        }

        let (_, listings) = self.extract_records(&urls).await?;
        if listings.is_empty() {
            warn!("No listings extracted, stopping");
            return Ok(None);
        }

        let (path, _) = self.clean_records(&listings, long_term_only)?;
        Ok(Some(path))
    }

    /// Write the URLs of `urls_file` missing from `listings_file` to a new URL file.
    /// Returns `None` when nothing is left to scrape.
    pub fn remaining_urls(&self, urls_file: &Path, listings_file: &Path) -> Result<Option<PathBuf>> {
        let urls = output::read_url_records(urls_file)?;
        let scraped = output::read_listings(listings_file)?;
        let remaining = output::remaining_urls(&urls, &scraped);

        let done = urls.len() - remaining.len();
        let percent = if urls.is_empty() {
            100.0
        } else {
            done as f64 / urls.len() as f64 * 100.0
        };
        info!("✅ Completion: {}/{} ({:.1}%)", done, urls.len(), percent);

        if remaining.is_empty() {
            info!("🎉 All URLs have been scraped!");
            return Ok(None);
        }

        let path = output::timestamped_path(&self.config.urls_dir(), REMAINING_PREFIX);
        output::write_url_records(&path, &remaining)?;
        Ok(Some(path))
    }
}
