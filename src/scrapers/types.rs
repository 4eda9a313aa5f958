use anyhow::{anyhow, Result};
use scraper::Selector;

/// CSS selectors describing the classifieds site markup
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Element to wait for before a search page counts as rendered
    pub search_ready: String,
    /// Listing anchors on a search results page
    pub listing_link: String,
    /// Element to wait for before a listing page counts as rendered
    pub listing_ready: String,
    pub title: String,
    pub location: String,
    /// Tried in order, first non-empty text wins
    pub price: Vec<String>,
    pub icon_attribute: String,
    /// Label/value layouts for the property list
    pub property_rows: Vec<PropertyRowSelectors>,
    pub amenity: String,
}

/// One label/value layout: a row container with a label child and a value child
#[derive(Debug, Clone)]
pub struct PropertyRowSelectors {
    pub row: String,
    pub label: String,
    pub value: String,
}

impl PropertyRowSelectors {
    fn new(row: &str, label: &str, value: &str) -> Self {
        Self {
            row: row.to_string(),
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            search_ready: "div.b-advert-listing".to_string(),
            listing_link: "div.b-advert-listing a[href]".to_string(),
            listing_ready: "h1".to_string(),
            title: "h1 div, .b-advert-title-outer h1".to_string(),
            location: ".b-advert-info-statistics--region".to_string(),
            price: vec![
                ".b-alt-advert-price-wrapper span.qa-advert-price-view-value".to_string(),
                ".b-alt-advert-price-wrapper .qa-advert-price".to_string(),
                ".b-alt-advert-price-wrapper div".to_string(),
            ],
            icon_attribute: ".b-advert-icon-attribute span, .b-advert-icon-attribute__value"
                .to_string(),
            property_rows: vec![
                PropertyRowSelectors::new(
                    ".b-advert-attribute",
                    ".b-advert-attribute__key",
                    ".b-advert-attribute__value",
                ),
                PropertyRowSelectors::new(
                    "div.b-advert-item-details__row",
                    "div.b-advert-item-details__name",
                    "div.b-advert-item-details__value",
                ),
            ],
            amenity: ".b-advert-attributes--tags .b-advert-attributes__tag".to_string(),
        }
    }
}

/// Parsed form of [`PropertyRowSelectors`]
#[derive(Debug, Clone)]
pub struct CompiledRowSelectors {
    pub row: Selector,
    pub label: Selector,
    pub value: Selector,
}

/// Parsed form of the listing page selectors, built once per run
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub title: Selector,
    pub location: Selector,
    pub price: Vec<Selector>,
    pub icon_attribute: Selector,
    pub property_rows: Vec<CompiledRowSelectors>,
    pub amenity: Selector,
}

impl SiteSelectors {
    pub fn listing_link_selector(&self) -> Result<Selector> {
        parse_selector(&self.listing_link)
    }

    pub fn compile_listing(&self) -> Result<ListingSelectors> {
        Ok(ListingSelectors {
            title: parse_selector(&self.title)?,
            location: parse_selector(&self.location)?,
            price: self
                .price
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<_>>()?,
            icon_attribute: parse_selector(&self.icon_attribute)?,
            property_rows: self
                .property_rows
                .iter()
                .map(|r| {
                    Ok(CompiledRowSelectors {
                        row: parse_selector(&r.row)?,
                        label: parse_selector(&r.label)?,
                        value: parse_selector(&r.value)?,
                    })
                })
                .collect::<Result<_>>()?,
            amenity: parse_selector(&self.amenity)?,
        })
    }
}

pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {:?}: {}", css, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selectors_compile() {
        let selectors = SiteSelectors::default();
        assert!(selectors.listing_link_selector().is_ok());
        let compiled = selectors.compile_listing().unwrap();
        assert_eq!(compiled.price.len(), 3);
        assert_eq!(compiled.property_rows.len(), 2);
    }

    #[test]
    fn bad_selector_is_an_error() {
        let selectors = SiteSelectors {
            title: "h1 >>> ???".to_string(),
            ..SiteSelectors::default()
        };
        assert!(selectors.compile_listing().is_err());
    }
}
