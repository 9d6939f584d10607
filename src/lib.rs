//! # retailrec
//!
//! Product popularity views and "similar products" recommendations over a
//! retail transactions spreadsheet.
//!
//! A free-text product name is fuzzy-matched to a known description; the
//! descriptions closest to it in a TF-IDF + truncated SVD space are returned.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! retailrec serve --file "Online Retail.xlsx" --port 8080
//! curl -X POST localhost:8080/recommend -H 'content-type: application/json' \
//!      -d '{"query": "white hanging heart t-light holder"}'
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use retailrec::prelude::*;
//!
//! let session = Session::new(RecommenderConfig::default()).unwrap();
//! session.install(
//!     Catalog::from_descriptions(["RED MUG", "BLUE MUG", "RED PLATE", "GREEN MUG", "BLUE PLATE"]).unwrap(),
//! );
//!
//! let result = session.recommend("red mug");
//! assert_eq!(result.descriptions(), vec!["RED PLATE", "BLUE MUG", "GREEN MUG", "BLUE PLATE"]);
//! ```
//!
//! ## Crate Structure
//!
//! - `retailrec-core` - Catalog cleaning, TF-IDF, truncated SVD, cosine index, popularity views
//! - `retailrec-similarity` - Weighted fuzzy ratios and the threshold matcher
//! - `retailrec-session` - Spreadsheet loading, derived-index cache, recommendation flow
//! - `retailrec-api` - REST endpoints

// Re-export core types
pub use retailrec_core::{
    popular, Catalog, CleaningReport, DescriptionCatalog, EmbeddingMatrix, Error, Neighbor, NeighborIndex,
    ProductRecord, RawTable, RecommenderConfig, ReducedMatrix, ReducerConfig, Result, SelfMatch, TfidfConfig,
    TfidfVectorizer, TruncatedSvd, Vector,
};

// Re-export matching
pub use retailrec_similarity::{weighted_ratio, MatchOutcome, MatchResult, Matcher};

// Re-export session
pub use retailrec_session::{
    CatalogSummary, DerivedCache, LoadOptions, Recommendation, RecommendedItem, Recommender, Session,
};

// Re-export API
pub use retailrec_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Catalog, CleaningReport, Error, LoadOptions, MatchOutcome, Matcher, Recommendation, RecommenderConfig,
        Recommender, ReducerConfig, Result, Session,
    };
}

/// SIMD-optimized vector operations
pub mod simd {
    pub use retailrec_core::simd::{dot_product_simd, norm_simd};
}
