pub mod filter;

pub use filter::retain_long_term_rentals;

use crate::config::DEFAULT_HOUSE_TYPE;
use crate::models::{CleanedListing, CleanedTable, ListingRecord};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Property holding a comma-separated list of amenities
const FACILITIES_LABEL: &str = "Facilities";
const PROPERTY_SIZE_LABEL: &str = "Property Size";

/// Normalizes raw listing records into a flat table. No I/O.
#[derive(Debug, Clone)]
pub struct DataCleaner {
    default_house_type: String,
    location_separator: char,
}

impl Default for DataCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_HOUSE_TYPE)
    }
}

impl DataCleaner {
    pub fn new(default_house_type: &str) -> Self {
        Self {
            default_house_type: default_house_type.to_string(),
            location_separator: ',',
        }
    }

    /// Clean scraped records into the final table
    pub fn clean(&self, listings: &[ListingRecord]) -> CleanedTable {
        let rows: Vec<CleanedListing> = listings.iter().map(|l| self.clean_listing(l)).collect();
        let table = CleanedTable::from_rows(rows);
        self.log_summary(listings.len(), &table);
        table
    }

    /// Clean an already cleaned table again. Output equals input for tables
    /// produced by [`DataCleaner::clean`].
    pub fn reclean(&self, table: &CleanedTable) -> CleanedTable {
        let rows = table.rows.iter().map(|row| self.clean_row(row)).collect();
        CleanedTable::from_rows(rows)
    }

    fn clean_listing(&self, listing: &ListingRecord) -> CleanedListing {
        let (location, sub_location) = match listing.location.as_deref() {
            Some(raw) => split_location(raw, self.location_separator),
            None => (None, None),
        };

        let mut properties = parse_properties(&listing.properties);
        let mut amenities: BTreeSet<String> = listing
            .amenities
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
        merge_facilities(&mut properties, &mut amenities);
        let property_size = take_property_size(&mut properties);

        CleanedListing {
            url: listing.url.clone(),
            title: non_blank(listing.title.as_deref()),
            price: listing.price.as_deref().and_then(parse_price),
            location,
            sub_location,
            house_type: self.house_type_or_default(listing.house_type.as_deref()),
            bedrooms: listing.bedrooms.as_deref().and_then(parse_count),
            bathrooms: listing.bathrooms.as_deref().and_then(parse_count),
            property_size,
            properties,
            amenities,
            fetch_date: listing.fetch_date,
        }
    }

    fn clean_row(&self, row: &CleanedListing) -> CleanedListing {
        // A location that still holds the separator is split again, otherwise
        // the sub-location found on the first pass is kept
        let (location, sub_location) = match row.location.as_deref() {
            Some(raw) => match split_location(raw, self.location_separator) {
                (location, None) => (location, row.sub_location.clone()),
                split => split,
            },
            None => (None, row.sub_location.clone()),
        };

        let mut properties = row.properties.clone();
        let mut amenities = row.amenities.clone();
        merge_facilities(&mut properties, &mut amenities);
        let property_size = take_property_size(&mut properties);

        CleanedListing {
            location,
            sub_location,
            title: non_blank(row.title.as_deref()),
            house_type: self.house_type_or_default(Some(&row.house_type)),
            property_size: row.property_size.or(property_size),
            properties,
            amenities,
            ..row.clone()
        }
    }

    fn house_type_or_default(&self, house_type: Option<&str>) -> String {
        non_blank(house_type).unwrap_or_else(|| self.default_house_type.clone())
    }

    fn log_summary(&self, input: usize, table: &CleanedTable) {
        let defaulted = table
            .rows
            .iter()
            .filter(|r| r.house_type == self.default_house_type)
            .count();
        let missing_rooms = table
            .rows
            .iter()
            .filter(|r| r.bedrooms.is_none() || r.bathrooms.is_none())
            .count();

        info!("Cleaned {} listings", input);
        info!("  {} rows with house type '{}'", defaulted, self.default_house_type);
        info!("  {} rows missing bedroom or bathroom counts", missing_rooms);
        info!(
            "  {} property columns, {} amenity columns",
            table.property_columns.len(),
            table.amenity_columns.len()
        );
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Split `"Accra, East Legon"` into `("Accra", "East Legon")`.
/// Parts after the second are dropped and a blank part stays in its position.
pub fn split_location(raw: &str, separator: char) -> (Option<String>, Option<String>) {
    let mut parts = raw.split(separator).map(|p| non_blank(Some(p)));

    let location = parts.next().flatten();
    let sub_location = parts.next().flatten();
    (location, sub_location)
}

/// Leading integer of a count such as `"3 bedrooms"`
pub fn parse_count(raw: &str) -> Option<u32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Numeric value of a price such as `"GH₵ 3,500"`.
/// Text with no number in it, like `"Price on request"`, gives `None`.
pub fn parse_price(raw: &str) -> Option<f64> {
    first_number(raw)
}

/// Numeric value of a size such as `"120 sqm"`
pub fn parse_size(raw: &str) -> Option<f64> {
    first_number(raw)
}

/// First number in `raw`, ignoring thousands separators
fn first_number(raw: &str) -> Option<f64> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let number: String = raw[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == ' ')
        .filter(|c| *c != ',' && *c != ' ')
        .collect();
    number.parse().ok()
}

/// Move the entries of a `Facilities` property into the amenity set
fn merge_facilities(properties: &mut BTreeMap<String, String>, amenities: &mut BTreeSet<String>) {
    if let Some(facilities) = properties.remove(FACILITIES_LABEL) {
        amenities.extend(
            facilities
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        );
    }
}

/// Remove and parse the `Property Size` property. Sizes without a number stay as text.
fn take_property_size(properties: &mut BTreeMap<String, String>) -> Option<f64> {
    let size = properties.get(PROPERTY_SIZE_LABEL).and_then(|v| parse_size(v))?;
    properties.remove(PROPERTY_SIZE_LABEL);
    Some(size)
}

/// `"Label: value"` pairs into a map, entries without a separator are dropped
pub fn parse_properties(pairs: &[String]) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for pair in pairs {
        match pair.split_once(':') {
            Some((label, value)) => {
                let label = label.trim();
                let value = value.trim();
                if !label.is_empty() && !value.is_empty() {
                    properties.insert(label.to_string(), value.to_string());
                }
            }
            None => debug!("Ignoring property without a label: {:?}", pair),
        }
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn listing(url: &str) -> ListingRecord {
        ListingRecord::new(url, Utc::now())
    }

    fn full_listing() -> ListingRecord {
        ListingRecord {
            title: Some("2 Bedroom Apartment".to_string()),
            price: Some("GH₵ 3,500".to_string()),
            location: Some("Accra, East Legon".to_string()),
            house_type: Some("Apartment".to_string()),
            bedrooms: Some("2 bedrooms".to_string()),
            bathrooms: Some("3 bathrooms".to_string()),
            properties: vec![
                "Furnishing: Unfurnished".to_string(),
                "Property Size: 120 sqm".to_string(),
            ],
            amenities: ["Wi-Fi".to_string(), "Balcony".to_string()].into_iter().collect(),
            ..listing("https://jiji.com.gh/a.html")
        }
    }

    #[test]
    fn splits_location_on_comma() {
        assert_eq!(
            split_location("Accra, East Legon", ','),
            (Some("Accra".to_string()), Some("East Legon".to_string()))
        );
        assert_eq!(split_location("Accra", ','), (Some("Accra".to_string()), None));
        assert_eq!(
            split_location("Greater Accra, Osu, 2 days ago", ','),
            (Some("Greater Accra".to_string()), Some("Osu".to_string()))
        );
        assert_eq!(split_location("  ", ','), (None, None));
        assert_eq!(split_location(", East Legon", ','), (None, Some("East Legon".to_string())));
    }

    #[test]
    fn parses_counts() {
        assert_eq!(parse_count("3 bedrooms"), Some(3));
        assert_eq!(parse_count(" 12"), Some(12));
        assert_eq!(parse_count("2bdrm"), Some(2));
        assert_eq!(parse_count("Studio"), None);
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn parses_prices() {
        assert_eq!(parse_price("GH₵ 3,500"), Some(3500.0));
        assert_eq!(parse_price("GH₵ 1,250,000.50"), Some(1_250_000.5));
        assert_eq!(parse_price("4500"), Some(4500.0));
        assert_eq!(parse_price("Price on request"), None);
    }

    #[test]
    fn parses_property_pairs() {
        let properties = parse_properties(&[
            "Furnishing: Unfurnished".to_string(),
            "Opening hours: 8:00-17:00".to_string(),
            "no separator".to_string(),
            "Empty:".to_string(),
        ]);

        assert_eq!(properties.len(), 2);
        assert_eq!(properties["Furnishing"], "Unfurnished");
        assert_eq!(properties["Opening hours"], "8:00-17:00");
    }

    #[test]
    fn cleans_a_full_record() {
        let table = DataCleaner::default().clean(&[full_listing()]);
        let row = &table.rows[0];

        assert_eq!(row.location.as_deref(), Some("Accra"));
        assert_eq!(row.sub_location.as_deref(), Some("East Legon"));
        assert_eq!(row.price, Some(3500.0));
        assert_eq!(row.house_type, "Apartment");
        assert_eq!(row.bedrooms, Some(2));
        assert_eq!(row.bathrooms, Some(3));
        assert_eq!(row.property_size, Some(120.0));
        assert_eq!(table.property_columns, vec!["Furnishing"]);
        assert_eq!(table.amenity_columns, vec!["Balcony", "Wi-Fi"]);
    }

    #[test]
    fn facilities_merge_into_amenities() {
        let record = ListingRecord {
            properties: vec![
                "Facilities: 24-hour Electricity, Wi-Fi, ".to_string(),
                "Parking: Yes".to_string(),
            ],
            amenities: ["Wi-Fi".to_string()].into_iter().collect(),
            ..listing("https://jiji.com.gh/f.html")
        };

        let table = DataCleaner::default().clean(&[record]);

        assert_eq!(table.property_columns, vec!["Parking"]);
        assert_eq!(table.amenity_columns, vec!["24-hour Electricity", "Wi-Fi"]);
        assert_eq!(table.rows[0].amenities.len(), 2);
    }

    #[test]
    fn unparsable_property_size_stays_a_property() {
        let record = ListingRecord {
            properties: vec!["Property Size: Large".to_string()],
            ..listing("https://jiji.com.gh/s.html")
        };

        let table = DataCleaner::default().clean(&[record]);

        assert_eq!(table.rows[0].property_size, None);
        assert_eq!(table.property_columns, vec!["Property Size"]);
        assert_eq!(parse_size("1,200 sqm"), Some(1200.0));
    }

    #[test]
    fn missing_fields_become_none() {
        let table = DataCleaner::default().clean(&[listing("https://jiji.com.gh/b.html")]);
        let row = &table.rows[0];

        assert_eq!(row.bedrooms, None);
        assert_eq!(row.bathrooms, None);
        assert_eq!(row.location, None);
        assert_eq!(row.sub_location, None);
        assert_eq!(row.price, None);
    }

    #[test]
    fn fills_missing_house_type_with_default() {
        let blank = ListingRecord {
            house_type: Some("   ".to_string()),
            ..listing("https://jiji.com.gh/c.html")
        };
        let table = DataCleaner::default().clean(&[listing("https://jiji.com.gh/b.html"), blank]);

        assert!(table.rows.iter().all(|r| r.house_type == "Bedsitter"));
    }

    #[test]
    fn disjoint_amenities_merge_into_union() {
        let a = ListingRecord {
            amenities: ["Parking".to_string()].into_iter().collect(),
            ..listing("https://jiji.com.gh/a.html")
        };
        let b = ListingRecord {
            amenities: ["Pool".to_string(), "TV".to_string()].into_iter().collect(),
            ..listing("https://jiji.com.gh/b.html")
        };

        let table = DataCleaner::default().clean(&[a, b]);

        assert_eq!(table.amenity_columns, vec!["Parking", "Pool", "TV"]);
        assert!(table.rows[0].amenities.contains("Parking"));
        assert!(!table.rows[0].amenities.contains("Pool"));
        assert!(!table.rows[1].amenities.contains("Parking"));
    }

    #[test]
    fn recleaning_is_idempotent() {
        let cleaner = DataCleaner::default();
        let records = vec![
            full_listing(),
            listing("https://jiji.com.gh/b.html"),
            ListingRecord {
                location: Some("Tema".to_string()),
                bedrooms: Some("Studio".to_string()),
                ..listing("https://jiji.com.gh/c.html")
            },
        ];

        let once = cleaner.clean(&records);
        let twice = cleaner.reclean(&once);
        let thrice = cleaner.reclean(&twice);

        assert_eq!(once, twice);
        assert_eq!(twice, thrice);
        assert_eq!(twice.rows[0].sub_location.as_deref(), Some("East Legon"));
        assert_eq!(twice.rows[1].house_type, "Bedsitter");
    }

    #[test]
    fn custom_default_house_type() {
        let table = DataCleaner::new("Room").clean(&[listing("https://jiji.com.gh/b.html")]);
        assert_eq!(table.rows[0].house_type, "Room");
    }
}
