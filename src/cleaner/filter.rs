use crate::models::CleanedTable;
use tracing::info;

/// Phrases marking an advert as a sale rather than a rental
const SALE_PHRASES: &[&str] = &[
    "for sale",
    "on sale",
    "selling",
    "sold",
    "buyer",
    "title deed",
    "down payment",
    "mortgage",
    "financing",
    "cash only",
    "investment",
    "capital gain",
];

/// Phrases marking an advert as a short stay
const SHORT_STAY_PHRASES: &[&str] = &[
    "airbnb",
    "air bnb",
    "booking.com",
    "vrbo",
    "short stay",
    "short term",
    "short-term",
    "holiday rental",
    "vacation rental",
    "guesthouse",
    "guest house",
    "per night",
    "nightly",
    "per day",
    "daily",
    "by the day",
    "per week",
    "weekly",
    "weekend",
];

fn matches_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase))
}

/// Drop rows whose title looks like a sale or a short-stay advert.
/// Returns the number of rows removed.
pub fn retain_long_term_rentals(table: &mut CleanedTable) -> usize {
    let before = table.rows.len();

    table.rows.retain(|row| {
        let title = row.title.as_deref().unwrap_or("").to_lowercase();
        !matches_any(&title, SALE_PHRASES) && !matches_any(&title, SHORT_STAY_PHRASES)
    });

    let removed = before - table.rows.len();
    if removed > 0 {
        // Columns only present on removed rows disappear
        *table = CleanedTable::from_rows(std::mem::take(&mut table.rows));
    }

    info!("Removed {} sale/short-stay listings, {} remaining", removed, table.rows.len());
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::DataCleaner;
    use crate::models::ListingRecord;
    use chrono::Utc;

    fn titled(url: &str, title: &str, amenity: &str) -> ListingRecord {
        ListingRecord {
            title: Some(title.to_string()),
            amenities: [amenity.to_string()].into_iter().collect(),
            ..ListingRecord::new(url, Utc::now())
        }
    }

    #[test]
    fn removes_sales_and_short_stays() {
        let mut table = DataCleaner::default().clean(&[
            titled("a", "2 Bedroom Apartment in Osu", "Wi-Fi"),
            titled("b", "3 Bedroom House FOR SALE", "Pool"),
            titled("c", "Furnished studio, Airbnb ready", "TV"),
            titled("d", "Chamber and Hall, 1 year advance", "Wi-Fi"),
        ]);

        let removed = retain_long_term_rentals(&mut table);

        assert_eq!(removed, 2);
        let urls: Vec<&str> = table.rows.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "d"]);
        assert_eq!(table.amenity_columns, vec!["Wi-Fi"]);
    }

    #[test]
    fn rows_without_titles_are_kept() {
        let mut table = DataCleaner::default().clean(&[ListingRecord::new("a", Utc::now())]);
        assert_eq!(retain_long_term_rentals(&mut table), 0);
        assert_eq!(table.len(), 1);
    }
}
