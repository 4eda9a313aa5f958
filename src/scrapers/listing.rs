use crate::models::{ListingRecord, UrlRecord};
use crate::scrapers::traits::Fetcher;
use crate::scrapers::types::ListingSelectors;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whitespace-collapsed text of an element
fn element_text(element: ElementRef<'_>) -> String {
    let words: Vec<&str> = element.text().flat_map(str::split_whitespace).collect();
    words.join(" ")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

pub fn extract_title(document: &Html, selectors: &ListingSelectors) -> Option<String> {
    first_text(document, &selectors.title)
}

pub fn extract_location(document: &Html, selectors: &ListingSelectors) -> Option<String> {
    first_text(document, &selectors.location)
}

pub fn extract_price(document: &Html, selectors: &ListingSelectors) -> Option<String> {
    selectors
        .price
        .iter()
        .find_map(|selector| first_text(document, selector))
}

/// Label/value rows rendered as `"Label: value"`, in page order
pub fn extract_properties(document: &Html, selectors: &ListingSelectors) -> Vec<String> {
    let mut properties = Vec::new();

    for layout in &selectors.property_rows {
        for row in document.select(&layout.row) {
            let label = row.select(&layout.label).next().map(element_text);
            let value = row.select(&layout.value).next().map(element_text);

            if let (Some(label), Some(value)) = (label, value) {
                let label = label.trim_end_matches(':').trim();
                if !label.is_empty() && !value.is_empty() {
                    let pair = format!("{}: {}", label, value);
                    if !properties.contains(&pair) {
                        properties.push(pair);
                    }
                }
            }
        }
    }

    properties
}

pub fn extract_amenities(document: &Html, selectors: &ListingSelectors) -> BTreeSet<String> {
    document
        .select(&selectors.amenity)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// House type, bedrooms and bathrooms from the icon attribute strip
#[derive(Debug, Default, PartialEq)]
pub struct IconDetails {
    pub house_type: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
}

const BEDROOM_WORDS: &[&str] = &["bed", "beds", "bedroom", "bedrooms"];
const BATHROOM_WORDS: &[&str] = &["bath", "baths", "bathroom", "bathrooms", "toilet", "toilets"];

/// Whether `text` names a room count such as `"2 bedrooms"` or `"3bath"`.
/// Words that only start with a room word, like `"Bedsitter"`, do not count.
fn is_room_count(text: &str, words: &[&str]) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .map(|word| word.trim_start_matches(|c: char| c.is_ascii_digit()))
        .any(|word| words.contains(&word))
}

pub fn extract_icon_details(document: &Html, selectors: &ListingSelectors) -> IconDetails {
    let mut details = IconDetails::default();

    for text in document.select(&selectors.icon_attribute).map(element_text) {
        if text.is_empty() {
            continue;
        }
        if is_room_count(&text, BEDROOM_WORDS) {
            details.bedrooms = Some(text);
        } else if is_room_count(&text, BATHROOM_WORDS) {
            details.bathrooms = Some(text);
        } else if details.house_type.is_none() {
            details.house_type = Some(text);
        }
    }

    details
}

/// Value of the first `"Label: value"` pair whose label matches one of `labels`
fn property_value(properties: &[String], labels: &[&str]) -> Option<String> {
    labels.iter().find_map(|wanted| {
        properties.iter().find_map(|pair| {
            let (label, value) = pair.split_once(':')?;
            (label.trim().eq_ignore_ascii_case(wanted)).then(|| value.trim().to_string())
        })
    })
}

/// Build a record from a rendered listing page. Missing markup leaves fields empty.
pub fn extract_listing(
    url: &str,
    html: &str,
    selectors: &ListingSelectors,
    fetch_date: DateTime<Utc>,
) -> ListingRecord {
    let document = Html::parse_document(html);
    let mut record = ListingRecord::new(url, fetch_date);

    record.title = extract_title(&document, selectors);
    record.location = extract_location(&document, selectors);
    record.price = extract_price(&document, selectors);
    record.properties = extract_properties(&document, selectors);
    record.amenities = extract_amenities(&document, selectors);

    let icons = extract_icon_details(&document, selectors);
    record.house_type = icons
        .house_type
        .or_else(|| property_value(&record.properties, &["Subtype", "Type"]));
    record.bedrooms = icons
        .bedrooms
        .or_else(|| property_value(&record.properties, &["Bedrooms"]));
    record.bathrooms = icons
        .bathrooms
        .or_else(|| property_value(&record.properties, &["Bathrooms", "Toilets"]));

    record
}

/// Fetches listing pages and extracts their detail fields
pub struct DetailExtractor<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
    selectors: ListingSelectors,
    concurrency: usize,
    delay: Duration,
}

impl<'a, F: Fetcher + ?Sized> DetailExtractor<'a, F> {
    pub fn new(fetcher: &'a F, selectors: ListingSelectors) -> Self {
        Self {
            fetcher,
            selectors,
            concurrency: 1,
            delay: Duration::ZERO,
        }
    }

    /// Maximum number of listing pages in flight
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Minimum gap between the starts of two requests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn scrape_one(&self, url: &str, done: &AtomicUsize, total: usize) -> Option<ListingRecord> {
        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Skipping listing {}: {:#}", url, e);
                return None;
            }
        };

        let record = extract_listing(url, &html, &self.selectors, Utc::now());
        if record.title.is_none() {
            debug!("No title found on {}", url);
        }

        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Scraped listing {}/{}", n, total);

        Some(record)
    }

    /// Scrape every URL in order. Listings that fail to load are skipped,
    /// listings with missing fields are kept.
    pub async fn extract_all(&self, urls: &[UrlRecord]) -> Vec<ListingRecord> {
        let total = urls.len();
        let done = AtomicUsize::new(0);
        let done = &done;

        let delay = self.delay;

        // Requests are released one delay apart, at most `concurrency` run at once
        let records: Vec<ListingRecord> = stream::iter(urls)
            .then(|record| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                record
            })
            .map(|record| self.scrape_one(&record.url, done, total))
            .buffered(self.concurrency)
            .filter_map(|record| async move { record })
            .collect()
            .await;

        info!("Extracted {} of {} listings", records.len(), total);
        records
    }
}
