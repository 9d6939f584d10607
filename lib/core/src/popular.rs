//! Popularity views over the active catalog.
//!
//! Every view counts records per description. Equal counts keep the order
//! in which the descriptions first appear in the catalog.

use crate::{Catalog, ProductRecord};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_GLOBAL_LIMIT: usize = 10;
pub const DEFAULT_PER_GROUP_LIMIT: usize = 3;
pub const DEFAULT_COUNTRY_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCount {
    pub description: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryTop {
    pub country: String,
    pub products: Vec<ProductCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthTop {
    pub month: u8,
    pub products: Vec<ProductCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryCount {
    pub country: String,
    pub count: usize,
}

/// Most frequent descriptions overall
pub fn top_products(catalog: &Catalog, limit: usize) -> Vec<ProductCount> {
    count_descriptions(catalog.records().iter(), limit)
}

/// Most frequent descriptions within each country, countries by name
pub fn top_products_by_country(catalog: &Catalog, per_country: usize) -> Vec<CountryTop> {
    let mut groups: BTreeMap<&str, Vec<&ProductRecord>> = BTreeMap::new();
    for record in catalog.records() {
        groups.entry(record.country.as_str()).or_default().push(record);
    }
    groups
        .into_iter()
        .map(|(country, records)| CountryTop {
            country: country.to_string(),
            products: count_descriptions(records.into_iter(), per_country),
        })
        .collect()
}

/// Most frequent descriptions within each month; undated records skipped
pub fn top_products_by_month(catalog: &Catalog, per_month: usize) -> Vec<MonthTop> {
    let mut groups: BTreeMap<u8, Vec<&ProductRecord>> = BTreeMap::new();
    for record in catalog.records() {
        if let Some(month) = record.month {
            groups.entry(month).or_default().push(record);
        }
    }
    groups
        .into_iter()
        .map(|(month, records)| MonthTop {
            month,
            products: count_descriptions(records.into_iter(), per_month),
        })
        .collect()
}

/// Most frequent descriptions for one country (exact name match)
pub fn top_products_for_country(catalog: &Catalog, country: &str, limit: usize) -> Vec<ProductCount> {
    count_descriptions(
        catalog.records().iter().filter(|r| r.country == country),
        limit,
    )
}

/// Countries with the most records
pub fn top_countries(catalog: &Catalog, limit: usize) -> Vec<CountryCount> {
    let mut counts: AHashMap<&str, (usize, usize)> = AHashMap::new();
    for (position, record) in catalog.records().iter().enumerate() {
        counts.entry(record.country.as_str()).or_insert((0, position)).0 += 1;
    }
    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(country, (count, _))| CountryCount {
            country: country.to_string(),
            count,
        })
        .collect()
}

fn count_descriptions<'a, I>(records: I, limit: usize) -> Vec<ProductCount>
where
    I: Iterator<Item = &'a ProductRecord>,
{
    // description -> (count, first position)
    let mut counts: AHashMap<&str, (usize, usize)> = AHashMap::new();
    for (position, record) in records.enumerate() {
        counts.entry(record.description.as_str()).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(description, (count, _))| ProductCount {
            description: description.to_string(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(description: &str, country: &str, month: u32) -> ProductRecord {
        let date = NaiveDate::from_ymd_opt(2011, month, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        ProductRecord::new(description)
            .with_country(country)
            .with_invoice_date(date)
    }

    fn sample_catalog() -> Catalog {
        Catalog::from_records(vec![
            record("LANTERN", "United Kingdom", 12),
            record("MUG", "United Kingdom", 12),
            record("MUG", "France", 1),
            record("BAG", "France", 1),
            record("LANTERN", "United Kingdom", 1),
            record("BAG", "United Kingdom", 12),
            record("MUG", "United Kingdom", 12),
            record("CANDLE", "Germany", 1),
        ])
        .unwrap()
    }

    fn names(products: &[ProductCount]) -> Vec<&str> {
        products.iter().map(|p| p.description.as_str()).collect()
    }

    #[test]
    fn test_global_counts_and_tie_order() {
        let top = top_products(&sample_catalog(), 10);
        assert_eq!(names(&top), vec!["MUG", "LANTERN", "BAG", "CANDLE"]);
        assert_eq!(top[0].count, 3);
        assert_eq!(top[1].count, 2);

        assert_eq!(top_products(&sample_catalog(), 2).len(), 2);
    }

    #[test]
    fn test_per_country() {
        let by_country = top_products_by_country(&sample_catalog(), 1);
        let countries: Vec<&str> = by_country.iter().map(|c| c.country.as_str()).collect();
        assert_eq!(countries, vec!["France", "Germany", "United Kingdom"]);
        assert_eq!(names(&by_country[0].products), vec!["MUG"]);
        assert_eq!(names(&by_country[2].products), vec!["LANTERN"]);
    }

    #[test]
    fn test_per_month() {
        let by_month = top_products_by_month(&sample_catalog(), 3);
        assert_eq!(by_month.iter().map(|m| m.month).collect::<Vec<_>>(), vec![1, 12]);
        assert_eq!(names(&by_month[1].products), vec!["MUG", "LANTERN", "BAG"]);
    }

    #[test]
    fn test_undated_records_skipped_in_month_view() {
        let catalog = Catalog::from_descriptions(["MUG", "BAG"]).unwrap();
        assert!(top_products_by_month(&catalog, 3).is_empty());
        assert_eq!(top_products(&catalog, 3).len(), 2);
    }

    #[test]
    fn test_single_country_and_top_countries() {
        let catalog = sample_catalog();
        assert_eq!(names(&top_products_for_country(&catalog, "France", 5)), vec!["MUG", "BAG"]);
        assert!(top_products_for_country(&catalog, "Spain", 5).is_empty());

        let countries = top_countries(&catalog, 2);
        assert_eq!(countries[0].country, "United Kingdom");
        assert_eq!(countries[0].count, 5);
        assert_eq!(countries[1].country, "France");
    }
}
