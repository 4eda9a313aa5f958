use crate::models::UrlRecord;
use crate::scrapers::traits::Fetcher;
use anyhow::{Context, Result};
use chrono::Utc;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Number of search pages needed to cover `total` listings
pub fn page_count(total: u32, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// URL of search page `page`.
///
/// A `{}` placeholder in the base URL takes the page number, otherwise a
/// `page` query parameter is appended.
pub fn page_url(base_url: &str, page: u32) -> Result<String> {
    if base_url.contains("{}") {
        let url = base_url.replace("{}", &page.to_string());
        Url::parse(&url).with_context(|| format!("Invalid search URL: {}", url))?;
        return Ok(url);
    }

    let mut url = Url::parse(base_url).with_context(|| format!("Invalid search URL: {}", base_url))?;
    url.query_pairs_mut().append_pair("page", &page.to_string());
    Ok(url.into())
}

/// Absolute listing URLs found on one rendered search page
pub fn extract_listing_links(html: &str, page_url: &Url, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);

    document
        .select(selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .filter_map(|href| match page_url.join(href) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                debug!("Skipping unresolvable link {:?}: {}", href, e);
                None
            }
        })
        .collect()
}

/// Walks the paginated search results and records every listing link
pub struct UrlCollector<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
    base_url: String,
    page_size: u32,
    link_selector: Selector,
    delay: Duration,
}

impl<'a, F: Fetcher + ?Sized> UrlCollector<'a, F> {
    pub fn new(fetcher: &'a F, base_url: &str, page_size: u32, link_selector: Selector) -> Self {
        Self {
            fetcher,
            base_url: base_url.to_string(),
            page_size,
            link_selector,
            delay: Duration::ZERO,
        }
    }

    /// Pause between page requests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Collect listing URLs from enough pages to cover `total` listings.
    ///
    /// Pages that fail to load or contain no listings are logged and skipped.
    /// Only an unusable base URL is an error.
    pub async fn collect(&self, total: u32) -> Result<Vec<UrlRecord>> {
        let pages = page_count(total, self.page_size);
        info!("Total listings: {}, calculated pages: {}", total, pages);

        // Fail before any request if the base URL is unusable
        page_url(&self.base_url, 1)?;

        let mut records = Vec::new();

        for page in 1..=pages {
            if page > 1 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let url = page_url(&self.base_url, page)?;
            let parsed = Url::parse(&url)?;

            let html = match self.fetcher.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Skipping page {}/{} ({}): {:#}", page, pages, url, e);
                    continue;
                }
            };

            let links = extract_listing_links(&html, &parsed, &self.link_selector);
            if links.is_empty() {
                warn!("Page {}/{}: no listings found, skipping", page, pages);
                continue;
            }

            info!("Page {}/{}: found {} links", page, pages, links.len());

            let fetch_date = Utc::now();
            records.extend(links.into_iter().map(|url| UrlRecord {
                url,
                page,
                fetch_date,
            }));
        }

        info!("Collected {} listing URLs from {} pages", records.len(), pages);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::traits::StaticFetcher;
    use crate::scrapers::types::SiteSelectors;

    const BASE: &str = "https://jiji.com.gh/greater-accra/houses-apartments-for-rent?page={}";

    fn search_page(hrefs: &[&str]) -> String {
        let cards: String = hrefs
            .iter()
            .map(|h| format!(r#"<div class="b-advert-listing"><a href="{}">Advert</a></div>"#, h))
            .collect();
        format!("<html><body>{}</body></html>", cards)
    }

    fn link_selector() -> Selector {
        SiteSelectors::default().listing_link_selector().unwrap()
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(100, 20), 5);
        assert_eq!(page_count(101, 20), 6);
        assert_eq!(page_count(1, 20), 1);
        assert_eq!(page_count(0, 20), 0);
        assert_eq!(page_count(48, 24), 2);
    }

    #[test]
    fn page_url_fills_placeholder() {
        assert_eq!(
            page_url(BASE, 3).unwrap(),
            "https://jiji.com.gh/greater-accra/houses-apartments-for-rent?page=3"
        );
    }

    #[test]
    fn page_url_appends_query_parameter() {
        assert_eq!(
            page_url("https://example.com/rent", 2).unwrap(),
            "https://example.com/rent?page=2"
        );
        assert_eq!(
            page_url("https://example.com/rent?sort=new", 2).unwrap(),
            "https://example.com/rent?sort=new&page=2"
        );
    }

    #[test]
    fn page_url_rejects_garbage() {
        assert!(page_url("not a url", 1).is_err());
    }

    #[test]
    fn links_are_resolved_against_the_page() {
        let page = Url::parse("https://jiji.com.gh/greater-accra/houses-apartments-for-rent?page=1").unwrap();
        let html = search_page(&[
            "/east-legon/houses-apartments-for-rent/2br-flat-abc.html",
            "https://jiji.com.gh/osu/houses-apartments-for-rent/room-xyz.html",
            "#",
        ]);

        let links = extract_listing_links(&html, &page, &link_selector());

        assert_eq!(
            links,
            vec![
                "https://jiji.com.gh/east-legon/houses-apartments-for-rent/2br-flat-abc.html",
                "https://jiji.com.gh/osu/houses-apartments-for-rent/room-xyz.html",
            ]
        );
    }

    #[tokio::test]
    async fn collects_each_page_and_skips_failures() {
        let fetcher = StaticFetcher::new([
            (
                "https://jiji.com.gh/greater-accra/houses-apartments-for-rent?page=1",
                search_page(&["/a.html", "/b.html"]),
            ),
            // page 2 is missing and fails to fetch
            (
                "https://jiji.com.gh/greater-accra/houses-apartments-for-rent?page=3",
                "<html><body><p>No results</p></body></html>".to_string(),
            ),
            (
                "https://jiji.com.gh/greater-accra/houses-apartments-for-rent?page=4",
                search_page(&["/a.html"]),
            ),
        ]);

        let collector = UrlCollector::new(&fetcher, BASE, 20, link_selector());
        let records = collector.collect(61).await.unwrap();

        assert_eq!(fetcher.requested().len(), 4);
        let summary: Vec<(&str, u32)> = records.iter().map(|r| (r.url.as_str(), r.page)).collect();
        assert_eq!(
            summary,
            vec![
                ("https://jiji.com.gh/a.html", 1),
                ("https://jiji.com.gh/b.html", 1),
                ("https://jiji.com.gh/a.html", 4),
            ]
        );
    }

    #[tokio::test]
    async fn zero_total_requests_nothing() {
        let fetcher = StaticFetcher::new(Vec::<(String, String)>::new());
        let collector = UrlCollector::new(&fetcher, BASE, 20, link_selector());

        let records = collector.collect(0).await.unwrap();

        assert!(records.is_empty());
        assert!(fetcher.requested().is_empty());
    }

    #[tokio::test]
    async fn invalid_base_url_is_fatal() {
        let fetcher = StaticFetcher::new(Vec::<(String, String)>::new());
        let collector = UrlCollector::new(&fetcher, "nowhere/{}", 20, link_selector());

        assert!(collector.collect(40).await.is_err());
    }
}
