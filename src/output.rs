use crate::models::{CleanedListing, CleanedTable, ListingRecord, UrlRecord};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.csv`
pub fn timestamped_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{}_{}.csv", prefix, Local::now().format("%Y%m%d_%H%M%S")))
}

/// CSV files in `dir` whose name starts with `prefix`, newest first
pub fn list_csv_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(prefix) && name.ends_with(".csv") {
            let modified = entry.metadata()?.modified()?;
            files.push((modified, path));
        }
    }

    files.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn create_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn open_reader(path: &Path) -> Result<csv::Reader<fs::File>> {
    csv::Reader::from_path(path).with_context(|| format!("Failed to open {}", path.display()))
}

pub fn write_url_records(path: &Path, records: &[UrlRecord]) -> Result<()> {
    let mut writer = create_writer(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!("💾 Saved {} URLs to {}", records.len(), path.display());
    Ok(())
}

pub fn read_url_records(path: &Path) -> Result<Vec<UrlRecord>> {
    let mut reader = open_reader(path)?;
    let mut records = Vec::new();

    for (line, row) in reader.deserialize::<UrlRecord>().enumerate() {
        let record = row.with_context(|| format!("Bad row {} in {}", line + 2, path.display()))?;
        if record.url.trim().is_empty() {
            warn!("Skipping row {} in {}: no URL", line + 2, path.display());
            continue;
        }
        records.push(UrlRecord {
            url: record.url.trim().to_string(),
            ..record
        });
    }

    Ok(records)
}

/// Detail file row. Properties and amenities are stored as JSON arrays.
#[derive(Debug, Serialize, Deserialize)]
struct DetailRow {
    url: String,
    title: Option<String>,
    price: Option<String>,
    location: Option<String>,
    house_type: Option<String>,
    bedrooms: Option<String>,
    bathrooms: Option<String>,
    properties: String,
    amenities: String,
    fetch_date: DateTime<Utc>,
}

impl DetailRow {
    fn from_listing(listing: &ListingRecord) -> Result<Self> {
        Ok(Self {
            url: listing.url.clone(),
            title: listing.title.clone(),
            price: listing.price.clone(),
            location: listing.location.clone(),
            house_type: listing.house_type.clone(),
            bedrooms: listing.bedrooms.clone(),
            bathrooms: listing.bathrooms.clone(),
            properties: serde_json::to_string(&listing.properties)?,
            amenities: serde_json::to_string(&listing.amenities)?,
            fetch_date: listing.fetch_date,
        })
    }

    fn into_listing(self) -> Result<ListingRecord> {
        let properties = decode_list(&self.properties)
            .with_context(|| format!("Bad properties for {}", self.url))?;
        let amenities = decode_list(&self.amenities)
            .with_context(|| format!("Bad amenities for {}", self.url))?;

        Ok(ListingRecord {
            url: self.url,
            title: self.title,
            price: self.price,
            location: self.location,
            house_type: self.house_type,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            properties,
            amenities: amenities.into_iter().collect(),
            fetch_date: self.fetch_date,
        })
    }
}

fn decode_list(raw: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

pub fn write_listings(path: &Path, listings: &[ListingRecord]) -> Result<()> {
    let mut writer = create_writer(path)?;
    for listing in listings {
        writer.serialize(DetailRow::from_listing(listing)?)?;
    }
    writer.flush()?;
    info!("💾 Saved {} listings to {}", listings.len(), path.display());
    Ok(())
}

pub fn read_listings(path: &Path) -> Result<Vec<ListingRecord>> {
    let mut reader = open_reader(path)?;
    let mut listings = Vec::new();

    for (line, row) in reader.deserialize::<DetailRow>().enumerate() {
        let row = row.with_context(|| format!("Bad row {} in {}", line + 2, path.display()))?;
        listings.push(row.into_listing()?);
    }

    Ok(listings)
}

/// Fixed leading columns of the cleaned file
pub const CLEAN_COLUMNS: [&str; 10] = [
    "url",
    "title",
    "price",
    "location",
    "sub_location",
    "house_type",
    "bedrooms",
    "bathrooms",
    "property_size",
    "fetch_date",
];

/// Suffixes for a dynamic column whose name an earlier column already uses
const PROPERTY_SUFFIX: &str = " (property)";
const AMENITY_SUFFIX: &str = " (amenity)";

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn unique_name(taken: &[String], name: &str, suffix: &str) -> String {
    if taken.iter().any(|t| t == name) {
        format!("{}{}", name, suffix)
    } else {
        name.to_string()
    }
}

/// Fixed columns, then property columns, then amenity columns. Names are unique.
pub fn cleaned_header(table: &CleanedTable) -> Vec<String> {
    let mut header: Vec<String> = CLEAN_COLUMNS.iter().map(|c| c.to_string()).collect();
    for column in &table.property_columns {
        let name = unique_name(&header, column, PROPERTY_SUFFIX);
        header.push(name);
    }
    for column in &table.amenity_columns {
        let name = unique_name(&header, column, AMENITY_SUFFIX);
        header.push(name);
    }
    header
}

/// Header plus one string row per listing
pub fn cleaned_rows(table: &CleanedTable) -> Vec<Vec<String>> {
    let mut rows = vec![cleaned_header(table)];
    for row in &table.rows {
        let mut fields = vec![
            row.url.clone(),
            opt(&row.title),
            opt(&row.price),
            opt(&row.location),
            opt(&row.sub_location),
            row.house_type.clone(),
            opt(&row.bedrooms),
            opt(&row.bathrooms),
            opt(&row.property_size),
            row.fetch_date.to_rfc3339(),
        ];
        fields.extend(
            table
                .property_columns
                .iter()
                .map(|column| row.properties.get(column).cloned().unwrap_or_default()),
        );
        fields.extend(
            table
                .amenity_columns
                .iter()
                .map(|column| row.amenities.contains(column).to_string()),
        );
        rows.push(fields);
    }
    rows
}

pub fn write_cleaned(path: &Path, table: &CleanedTable) -> Result<()> {
    let mut writer = create_writer(path)?;
    let rows = cleaned_rows(table);
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    info!(
        "💾 Saved {} cleaned listings ({} columns) to {}",
        table.len(),
        rows[0].len(),
        path.display()
    );
    Ok(())
}

/// Whether `path` holds cleaned listings rather than raw detail rows
pub fn is_cleaned_file(path: &Path) -> Result<bool> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?;
    Ok(headers.iter().any(|h| h == "sub_location"))
}

fn parse_opt<T>(raw: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(Some(raw.parse()?))
}

fn text(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Load a file written by [`write_cleaned`].
///
/// Amenity columns are the trailing run of columns holding only `true`/`false`,
/// everything between the fixed columns and that run is a property column.
pub fn read_cleaned(path: &Path) -> Result<CleanedTable> {
    let mut reader = open_reader(path)?;
    let header: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let fixed = CLEAN_COLUMNS.len();
    if header.len() < fixed || header[..fixed].iter().map(String::as_str).ne(CLEAN_COLUMNS) {
        bail!("{} is not a cleaned listings file", path.display());
    }

    let records: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_flag = |column: usize| {
        records
            .iter()
            .all(|r| matches!(r.get(column).map(str::trim), Some("true" | "false")))
    };
    let mut split = header.len();
    while split > fixed && is_flag(split - 1) {
        split -= 1;
    }

    let property_columns: Vec<String> = header[fixed..split]
        .iter()
        .map(|h| h.strip_suffix(PROPERTY_SUFFIX).unwrap_or(h).to_string())
        .collect();
    let amenity_columns: Vec<String> = header[split..]
        .iter()
        .map(|h| h.strip_suffix(AMENITY_SUFFIX).unwrap_or(h).to_string())
        .collect();

    let mut rows = Vec::with_capacity(records.len());
    for (line, record) in records.iter().enumerate() {
        let field = |i: usize| record.get(i).unwrap_or("").trim();
        let context = || format!("Bad row {} in {}", line + 2, path.display());

        let properties = property_columns
            .iter()
            .enumerate()
            .filter(|(i, _)| !field(fixed + i).is_empty())
            .map(|(i, name)| (name.clone(), field(fixed + i).to_string()))
            .collect();
        let amenities = amenity_columns
            .iter()
            .enumerate()
            .filter(|(i, _)| field(split + i) == "true")
            .map(|(_, name)| name.clone())
            .collect();

        rows.push(CleanedListing {
            url: field(0).to_string(),
            title: text(field(1)),
            price: parse_opt(field(2)).with_context(context)?,
            location: text(field(3)),
            sub_location: text(field(4)),
            house_type: field(5).to_string(),
            bedrooms: parse_opt(field(6)).with_context(context)?,
            bathrooms: parse_opt(field(7)).with_context(context)?,
            property_size: parse_opt(field(8)).with_context(context)?,
            fetch_date: DateTime::parse_from_rfc3339(field(9))
                .with_context(context)?
                .with_timezone(&Utc),
            properties,
            amenities,
        });
    }

    Ok(CleanedTable::from_rows(rows))
}

/// URL records not yet present in a detail file
pub fn remaining_urls(urls: &[UrlRecord], scraped: &[ListingRecord]) -> Vec<UrlRecord> {
    let done: HashSet<&str> = scraped.iter().map(|l| l.url.as_str()).collect();
    urls.iter()
        .filter(|record| !done.contains(record.url.as_str()))
        .cloned()
        .collect()
}
