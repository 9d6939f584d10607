//! # retailrec Core
//!
//! Core library for retailrec.
//!
//! This crate provides the data model and the numeric building blocks of the
//! recommendation flow:
//!
//! - [`Catalog`] - cleaned product records and the ordered [`DescriptionCatalog`]
//! - [`TfidfVectorizer`] - description text to sparse TF-IDF rows ([`EmbeddingMatrix`])
//! - [`TruncatedSvd`] - sparse rows to dense [`ReducedMatrix`] coordinates
//! - [`NeighborIndex`] - exact cosine nearest-neighbor lookup
//! - [`popular`] - popularity views (global, per country, per month)
//!
//! ## Example
//!
//! ```rust
//! use retailrec_core::{Catalog, NeighborIndex, SelfMatch, TfidfVectorizer, TruncatedSvd};
//!
//! let catalog = Catalog::from_descriptions(["RED MUG", "BLUE MUG", "RED PLATE"]).unwrap();
//! let descriptions = catalog.descriptions();
//!
//! let embeddings = TfidfVectorizer::default().fit_transform(descriptions.as_slice()).unwrap();
//! let reduced = TruncatedSvd::default().fit_transform(&embeddings).unwrap();
//! let index = NeighborIndex::build(&reduced);
//!
//! let row = descriptions.index_of("RED MUG").unwrap();
//! let neighbors = index.neighbors_of(row, 2, SelfMatch::Exclude).unwrap();
//! assert_eq!(neighbors.len(), 2);
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod popular;
pub mod stopwords;
pub mod svd;
pub mod tfidf;
pub mod vector;

/// SIMD-optimized vector operations
///
/// - AVX2/FMA on x86_64
/// - NEON on ARM64/Apple Silicon
pub mod simd;

pub use catalog::{columns, parse_datetime, Catalog, CleaningReport, DescriptionCatalog, ProductRecord, RawTable};
pub use config::{RecommenderConfig, DEFAULT_MATCH_THRESHOLD, DEFAULT_RECOMMENDATIONS};
pub use error::{Error, Result};
pub use index::{Neighbor, NeighborIndex, SelfMatch};
pub use popular::{CountryCount, CountryTop, MonthTop, ProductCount};
pub use svd::{clamp_rank, ReducedMatrix, ReducerConfig, TruncatedSvd};
pub use tfidf::{EmbeddingMatrix, TfidfConfig, TfidfVectorizer};
pub use vector::{SparseVector, Vector};
