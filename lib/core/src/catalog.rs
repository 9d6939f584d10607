//! Catalog Store
//!
//! Turns a raw spreadsheet table into cleaned [`ProductRecord`]s and the
//! ordered set of unique descriptions every derived structure is keyed by.
//!
//! Cleaning, in order:
//! 1. rows without a customer id are dropped (only when the column exists)
//! 2. exact duplicate rows are dropped, first occurrence kept
//! 3. rows with an empty description are dropped

use crate::{Error, Result};
use ahash::{AHashMap, AHashSet};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Column names of the Online Retail export
pub mod columns {
    pub const DESCRIPTION: &str = "Description";
    pub const COUNTRY: &str = "Country";
    pub const INVOICE_DATE: &str = "InvoiceDate";
    pub const CUSTOMER_ID: &str = "CustomerID";
    pub const QUANTITY: &str = "Quantity";
    pub const INVOICE_NO: &str = "InvoiceNo";
    pub const STOCK_CODE: &str = "StockCode";
    pub const UNIT_PRICE: &str = "UnitPrice";
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

/// Header row plus string cells, as read from an upload
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Rows shorter than the header are padded, longer ones truncated
    pub fn new(headers: Vec<String>, mut rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        for row in rows.iter_mut() {
            row.resize(width, String::new());
        }
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, ignoring case, spaces and underscores
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = normalize_header(name);
        self.headers
            .iter()
            .position(|header| normalize_header(header) == wanted)
    }

    /// Seeded random subset of `fraction` of the rows, in sampled order
    pub fn sample(&self, fraction: f64, seed: u64) -> Result<RawTable> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "sample fraction must be in (0, 1], got {}",
                fraction
            )));
        }

        let amount = ((self.rows.len() as f64) * fraction).round() as usize;
        let mut rng = StdRng::seed_from_u64(seed);
        let picked = rand::seq::index::sample(&mut rng, self.rows.len(), amount);
        let rows = picked.iter().map(|i| self.rows[i].clone()).collect();

        Ok(RawTable {
            headers: self.headers.clone(),
            rows,
        })
    }
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One cleaned transaction line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub description: String,
    pub country: String,
    /// 1-12, absent when the invoice date is missing or unparseable
    pub month: Option<u8>,
    pub customer_id: Option<String>,
    pub quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDateTime>,
}

impl ProductRecord {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            country: String::new(),
            month: None,
            customer_id: None,
            quantity: 0.0,
            invoice_no: None,
            stock_code: None,
            unit_price: None,
            invoice_date: None,
        }
    }

    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    #[must_use]
    pub fn with_invoice_date(mut self, date: NaiveDateTime) -> Self {
        self.month = Some(date.month() as u8);
        self.invoice_date = Some(date);
        self
    }

    #[must_use]
    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }
}

/// Unique descriptions in first-seen order. The position is the row key
/// of every embedding, reduced vector and neighbor result.
#[derive(Debug, Clone, Default)]
pub struct DescriptionCatalog {
    descriptions: Vec<String>,
    positions: AHashMap<String, usize>,
}

impl DescriptionCatalog {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self::default();
        for item in items {
            let item = item.into();
            if !catalog.positions.contains_key(&item) {
                catalog.positions.insert(item.clone(), catalog.descriptions.len());
                catalog.descriptions.push(item);
            }
        }
        catalog
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.descriptions.get(index).map(String::as_str)
    }

    #[inline]
    pub fn index_of(&self, description: &str) -> Option<usize> {
        self.positions.get(description).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.descriptions
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.descriptions.iter().map(String::as_str)
    }

    /// SHA-256 over the ordered descriptions, hex encoded
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for description in &self.descriptions {
            hasher.update(description.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// What cleaning did to an upload
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CleaningReport {
    pub rows_read: usize,
    pub dropped_missing_customer: usize,
    pub dropped_duplicates: usize,
    pub dropped_empty_description: usize,
    pub unparsed_dates: usize,
    pub records: usize,
    pub unique_descriptions: usize,
    pub warnings: Vec<String>,
}

/// The active, cleaned product catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    records: Vec<ProductRecord>,
    descriptions: DescriptionCatalog,
    content_hash: String,
}

impl Catalog {
    /// Build from already-clean records
    pub fn from_records(records: Vec<ProductRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let descriptions = DescriptionCatalog::new(records.iter().map(|r| r.description.clone()));
        let content_hash = descriptions.content_hash();
        Ok(Self {
            records,
            descriptions,
            content_hash,
        })
    }

    /// One bare record per description
    pub fn from_descriptions<I, S>(descriptions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_records(descriptions.into_iter().map(ProductRecord::new).collect())
    }

    /// Clean a raw table into a catalog
    pub fn from_table(table: &RawTable) -> Result<(Self, CleaningReport)> {
        let description_col = table
            .column_index(columns::DESCRIPTION)
            .ok_or_else(|| Error::MissingColumn(columns::DESCRIPTION.to_string()))?;

        let mut report = CleaningReport {
            rows_read: table.len(),
            ..CleaningReport::default()
        };

        let customer_col = table.column_index(columns::CUSTOMER_ID);
        let country_col = optional_column(table, columns::COUNTRY, &mut report);
        let date_col = optional_column(table, columns::INVOICE_DATE, &mut report);
        let quantity_col = optional_column(table, columns::QUANTITY, &mut report);
        let invoice_col = table.column_index(columns::INVOICE_NO);
        let stock_col = table.column_index(columns::STOCK_CODE);
        let price_col = table.column_index(columns::UNIT_PRICE);

        if customer_col.is_none() {
            let message = format!(
                "Column '{}' not found; keeping rows without a customer id",
                columns::CUSTOMER_ID
            );
            warn!("{}", message);
            report.warnings.push(message);
        }

        let mut seen: AHashSet<&[String]> = AHashSet::with_capacity(table.len());
        let mut records = Vec::with_capacity(table.len());

        for row in table.rows() {
            let cell = |col: Option<usize>| col.map(|c| row[c].trim()).unwrap_or("");

            if customer_col.is_some() && cell(customer_col).is_empty() {
                report.dropped_missing_customer += 1;
                continue;
            }

            if !seen.insert(row.as_slice()) {
                report.dropped_duplicates += 1;
                continue;
            }

            let description = row[description_col].trim();
            if description.is_empty() {
                report.dropped_empty_description += 1;
                continue;
            }

            let raw_date = cell(date_col);
            let invoice_date = parse_datetime(raw_date);
            if invoice_date.is_none() && !raw_date.is_empty() {
                report.unparsed_dates += 1;
            }

            records.push(ProductRecord {
                description: description.to_string(),
                country: cell(country_col).to_string(),
                month: invoice_date.map(|d| d.month() as u8),
                customer_id: non_empty(cell(customer_col)),
                quantity: cell(quantity_col).parse().unwrap_or(0.0),
                invoice_no: non_empty(cell(invoice_col)),
                stock_code: non_empty(cell(stock_col)),
                unit_price: cell(price_col).parse().ok(),
                invoice_date,
            });
        }

        if report.unparsed_dates > 0 {
            let message = format!("{} invoice dates could not be parsed", report.unparsed_dates);
            warn!("{}", message);
            report.warnings.push(message);
        }

        let catalog = Self::from_records(records)?;
        report.records = catalog.records.len();
        report.unique_descriptions = catalog.descriptions.len();

        debug!(
            rows_read = report.rows_read,
            records = report.records,
            unique = report.unique_descriptions,
            "Catalog cleaned"
        );

        Ok((catalog, report))
    }

    #[inline]
    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    #[inline]
    pub fn descriptions(&self) -> &DescriptionCatalog {
        &self.descriptions
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

fn optional_column(table: &RawTable, name: &str, report: &mut CleaningReport) -> Option<usize> {
    let index = table.column_index(name);
    if index.is_none() {
        let message = format!("Column '{}' not found; using defaults", name);
        warn!("{}", message);
        report.warnings.push(message);
    }
    index
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse an invoice timestamp in any of the accepted layouts
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn retail_table() -> RawTable {
        RawTable::new(
            strings(&["InvoiceNo", "Description", "Quantity", "InvoiceDate", "CustomerID", "Country"]),
            vec![
                strings(&["536365", "WHITE HANGING HEART T-LIGHT HOLDER", "6", "2010-12-01 08:26:00", "17850", "United Kingdom"]),
                strings(&["536365", "WHITE METAL LANTERN", "6", "2010-12-01 08:26:00", "17850", "United Kingdom"]),
                strings(&["536365", "WHITE METAL LANTERN", "6", "2010-12-01 08:26:00", "17850", "United Kingdom"]),
                strings(&["536366", "HAND WARMER UNION JACK", "6", "2011-01-04 10:00:00", "", "United Kingdom"]),
                strings(&["536367", "", "2", "2011-01-04 10:00:00", "13047", "France"]),
                strings(&["536368", "RED MUG", "3", "not a date", "13047", "France"]),
            ],
        )
    }

    #[test]
    fn test_cleaning_drops_nulls_duplicates_and_empty() {
        let (catalog, report) = Catalog::from_table(&retail_table()).unwrap();

        assert_eq!(report.rows_read, 6);
        assert_eq!(report.dropped_missing_customer, 1);
        assert_eq!(report.dropped_duplicates, 1);
        assert_eq!(report.dropped_empty_description, 1);
        assert_eq!(report.unparsed_dates, 1);
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.descriptions().as_slice(),
            &strings(&["WHITE HANGING HEART T-LIGHT HOLDER", "WHITE METAL LANTERN", "RED MUG"])[..]
        );

        let first = &catalog.records()[0];
        assert_eq!(first.month, Some(12));
        assert_eq!(first.quantity, 6.0);
        assert_eq!(first.customer_id.as_deref(), Some("17850"));
        assert_eq!(catalog.records()[2].month, None);
    }

    #[test]
    fn test_missing_customer_column_degrades() {
        let table = RawTable::new(
            strings(&["Description", "Country"]),
            vec![strings(&["RED MUG", "France"]), strings(&["BLUE MUG", "France"])],
        );
        let (catalog, report) = Catalog::from_table(&table).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(report.warnings.iter().any(|w| w.contains("CustomerID")));
    }

    #[test]
    fn test_missing_description_column_is_fatal() {
        let table = RawTable::new(strings(&["Country"]), vec![strings(&["France"])]);
        assert!(matches!(Catalog::from_table(&table), Err(Error::MissingColumn(_))));
    }

    #[test]
    fn test_empty_after_cleaning() {
        let table = RawTable::new(
            strings(&["Description", "CustomerID"]),
            vec![strings(&["RED MUG", ""])],
        );
        assert!(matches!(Catalog::from_table(&table), Err(Error::EmptyDataset)));
    }

    #[test]
    fn test_header_matching_is_loose() {
        let table = RawTable::new(strings(&["description", "Customer ID"]), vec![]);
        assert_eq!(table.column_index(columns::DESCRIPTION), Some(0));
        assert_eq!(table.column_index(columns::CUSTOMER_ID), Some(1));
    }

    #[test]
    fn test_description_catalog_first_seen() {
        let catalog = DescriptionCatalog::new(["B", "A", "B", "C", "A"]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.index_of("B"), Some(0));
        assert_eq!(catalog.index_of("C"), Some(2));
        assert_eq!(catalog.get(1), Some("A"));
    }

    #[test]
    fn test_content_hash_tracks_order_and_content() {
        let a = DescriptionCatalog::new(["RED MUG", "BLUE MUG"]);
        let b = DescriptionCatalog::new(["RED MUG", "BLUE MUG"]);
        let c = DescriptionCatalog::new(["BLUE MUG", "RED MUG"]);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_sample_is_seeded() {
        let rows = (0..50).map(|i| vec![format!("ITEM {}", i)]).collect();
        let table = RawTable::new(strings(&["Description"]), rows);

        let a = table.sample(0.2, 42).unwrap();
        let b = table.sample(0.2, 42).unwrap();
        assert_eq!(a.len(), 10);
        assert_eq!(a.rows(), b.rows());
        assert!(table.sample(0.0, 42).is_err());
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(parse_datetime("2011-03-15 12:30:00").map(|d| d.month()), Some(3));
        assert_eq!(parse_datetime("12/1/2010 8:26").map(|d| d.month()), Some(12));
        assert_eq!(parse_datetime("2011-07-04").map(|d| d.month()), Some(7));
        assert_eq!(parse_datetime("yesterday"), None);
    }
}
