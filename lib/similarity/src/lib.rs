//! # retailrec Similarity
//!
//! Fuzzy matching of free-text product queries against the known
//! descriptions of a catalog.
//!
//! ## Example
//!
//! ```rust
//! use retailrec_similarity::{MatchOutcome, Matcher};
//!
//! let catalog = ["WHITE METAL LANTERN", "WHITE HANGING HEART T-LIGHT HOLDER"];
//! let matcher = Matcher::default(); // threshold 80
//!
//! match matcher.resolve("wihte hanging heart t-light holder", &catalog) {
//!     MatchOutcome::Matched(m) => assert_eq!(m.candidate, "WHITE HANGING HEART T-LIGHT HOLDER"),
//!     MatchOutcome::Rejected { .. } => unreachable!(),
//! }
//! ```
//!
//! ## Scoring
//!
//! ```text
//! query ──> process ──┬─> ratio ─────────────────────┐
//!                     ├─> token sort / token set ────┼──> max ──> 0..=100
//!                     └─> partial (length gap >=1.5) ┘
//! ```

pub mod matcher;
pub mod ratio;

pub use matcher::{MatchOutcome, MatchResult, Matcher};
pub use ratio::{partial_ratio, process, ratio, token_set_ratio, token_sort_ratio, weighted_ratio};
