use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A listing link found on a search results page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlRecord {
    pub url: String,
    pub page: u32,
    pub fetch_date: DateTime<Utc>,
}

/// Raw detail fields scraped from a single listing page.
///
/// Everything except the URL is optional because the markup is not uniform
/// across adverts. Numeric fields keep the text found on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub url: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub house_type: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    /// Raw `"Label: value"` pairs
    pub properties: Vec<String>,
    pub amenities: BTreeSet<String>,
    pub fetch_date: DateTime<Utc>,
}

impl ListingRecord {
    /// An empty record for `url`, fields are filled in by the extractor
    pub fn new(url: impl Into<String>, fetch_date: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            title: None,
            price: None,
            location: None,
            house_type: None,
            bedrooms: None,
            bathrooms: None,
            properties: Vec::new(),
            amenities: BTreeSet::new(),
            fetch_date,
        }
    }
}

/// A listing after normalization
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedListing {
    pub url: String,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub location: Option<String>,
    pub sub_location: Option<String>,
    pub house_type: String,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    /// Floor area from the `Property Size` label, in the advert's unit
    pub property_size: Option<f64>,
    pub properties: BTreeMap<String, String>,
    pub amenities: BTreeSet<String>,
    pub fetch_date: DateTime<Utc>,
}

/// Final tabular output: rows plus the dynamic column sets observed across them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanedTable {
    pub property_columns: Vec<String>,
    pub amenity_columns: Vec<String>,
    pub rows: Vec<CleanedListing>,
}

impl CleanedTable {
    /// Build the table, taking the union of property names and amenities as columns
    pub fn from_rows(rows: Vec<CleanedListing>) -> Self {
        let property_columns: BTreeSet<&String> =
            rows.iter().flat_map(|row| row.properties.keys()).collect();
        let amenity_columns: BTreeSet<&String> =
            rows.iter().flat_map(|row| row.amenities.iter()).collect();

        let property_columns = property_columns.into_iter().cloned().collect();
        let amenity_columns = amenity_columns.into_iter().cloned().collect();

        Self {
            property_columns,
            amenity_columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(url: &str, amenities: &[&str], properties: &[(&str, &str)]) -> CleanedListing {
        CleanedListing {
            url: url.to_string(),
            title: None,
            price: None,
            location: None,
            sub_location: None,
            house_type: "Bedsitter".to_string(),
            bedrooms: None,
            bathrooms: None,
            property_size: None,
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            amenities: amenities.iter().map(|a| a.to_string()).collect(),
            fetch_date: Utc::now(),
        }
    }

    #[test]
    fn columns_are_sorted_unions() {
        let table = CleanedTable::from_rows(vec![
            row("a", &["Wi-Fi", "Balcony"], &[("Furnishing", "Unfurnished")]),
            row("b", &["Balcony", "TV"], &[("Condition", "Newly-Built")]),
        ]);

        assert_eq!(table.amenity_columns, vec!["Balcony", "TV", "Wi-Fi"]);
        assert_eq!(table.property_columns, vec!["Condition", "Furnishing"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn empty_table_has_no_columns() {
        let table = CleanedTable::from_rows(Vec::new());
        assert!(table.is_empty());
        assert!(table.amenity_columns.is_empty());
        assert!(table.property_columns.is_empty());
    }
}
