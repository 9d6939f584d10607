//! # retailrec Session
//!
//! Everything between an uploaded spreadsheet and a recommendation:
//!
//! - [`loader`] - read xlsx/xls/ods/csv uploads into a cleaned catalog
//! - [`DerivedCache`] - lazily built embeddings, reduction and neighbor index
//! - [`Recommender`] - fuzzy match, then nearest descriptions
//! - [`Session`] - the active catalog shared by the API and the CLI

pub mod cache;
pub mod loader;
pub mod manager;
pub mod recommender;

pub use cache::{CacheKey, DerivedCache, DerivedIndex};
pub use loader::{load_bytes, load_path, read_bytes, read_path, LoadOptions, SheetFormat};
pub use manager::{CatalogSummary, Session};
pub use recommender::{Recommendation, RecommendedItem, Recommender, Stage};
