//! Recommendation flow
//!
//! ```text
//! AwaitingQuery -> Matching -> NoMatch
//!                           -> Matched -> Indexing -> Recommending -> Done
//! ```
//!
//! Every failure on the way is folded into [`Recommendation::Unavailable`];
//! a rejected match is a normal [`Recommendation::NoMatch`] outcome.

use crate::cache::DerivedCache;
use retailrec_core::{Catalog, RecommenderConfig, Result, SelfMatch};
use retailrec_similarity::{MatchOutcome, MatchResult, Matcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Suggestions offered alongside a rejected query
pub const NO_MATCH_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    AwaitingQuery,
    Matching,
    NoMatch,
    Matched,
    Indexing,
    Recommending,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub description: String,
    /// Cosine distance to the matched description
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Recommendation {
    Found {
        query: String,
        matched: String,
        score: u8,
        items: Vec<RecommendedItem>,
    },
    NoMatch {
        query: String,
        suggestions: Vec<MatchResult>,
    },
    Unavailable {
        reason: String,
    },
}

impl Recommendation {
    pub fn is_found(&self) -> bool {
        matches!(self, Recommendation::Found { .. })
    }

    /// Recommended items; empty unless found
    pub fn items(&self) -> &[RecommendedItem] {
        match self {
            Recommendation::Found { items, .. } => items,
            _ => &[],
        }
    }

    pub fn descriptions(&self) -> Vec<&str> {
        self.items().iter().map(|item| item.description.as_str()).collect()
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Found { matched, score, items, .. } => {
                writeln!(f, "Recommendations for '{}' (match score {}):", matched, score)?;
                for (rank, item) in items.iter().enumerate() {
                    writeln!(f, "{:>2}. {} (distance {:.4})", rank + 1, item.description, item.distance)?;
                }
                Ok(())
            }
            Recommendation::NoMatch { query, suggestions } => {
                write!(f, "No match found for '{}'.", query)?;
                if !suggestions.is_empty() {
                    let names: Vec<&str> = suggestions.iter().map(|s| s.candidate.as_str()).collect();
                    write!(f, " Did you mean: {}?", names.join(", "))?;
                }
                Ok(())
            }
            Recommendation::Unavailable { reason } => {
                write!(f, "No recommendations available: {}", reason)
            }
        }
    }
}

/// Matches a query and looks up its nearest descriptions
#[derive(Debug)]
pub struct Recommender {
    config: RecommenderConfig,
    matcher: Matcher,
    cache: DerivedCache,
}

impl Recommender {
    pub fn new(config: RecommenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            matcher: Matcher::new(config.match_threshold)?,
            config,
            cache: DerivedCache::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    #[inline]
    pub fn cache(&self) -> &DerivedCache {
        &self.cache
    }

    /// Drop derived structures; the next request rebuilds them
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Up to `n_recommendations` descriptions closest to the one `query`
    /// resolves to, never including that description itself
    pub fn recommend(&self, catalog: &Catalog, query: &str) -> Recommendation {
        match self.try_recommend(catalog, query) {
            Ok(recommendation) => recommendation,
            Err(e) => {
                warn!(query, error = %e, "Recommendation failed");
                Recommendation::Unavailable { reason: e.to_string() }
            }
        }
    }

    fn try_recommend(&self, catalog: &Catalog, query: &str) -> Result<Recommendation> {
        enter(Stage::AwaitingQuery);
        let descriptions = catalog.descriptions();

        enter(Stage::Matching);
        let matched = match self.matcher.resolve(query, descriptions.as_slice()) {
            MatchOutcome::Matched(matched) => matched,
            MatchOutcome::Rejected { .. } => {
                enter(Stage::NoMatch);
                return Ok(Recommendation::NoMatch {
                    query: query.to_string(),
                    suggestions: self
                        .matcher
                        .top_matches(query, descriptions.as_slice(), NO_MATCH_SUGGESTIONS),
                });
            }
        };
        enter(Stage::Matched);

        enter(Stage::Indexing);
        let derived = self.cache.get_or_build(catalog, &self.config)?;

        enter(Stage::Recommending);
        let n = self.config.n_recommendations;
        let neighbors = derived
            .index()
            .neighbors_of(matched.index, n.saturating_add(1), SelfMatch::Include)?;

        let items = neighbors
            .into_iter()
            .filter(|neighbor| neighbor.index != matched.index)
            .take(n)
            .filter_map(|neighbor| {
                descriptions.get(neighbor.index).map(|description| RecommendedItem {
                    description: description.to_string(),
                    distance: neighbor.distance,
                })
            })
            .collect();

        enter(Stage::Done);
        Ok(Recommendation::Found {
            query: query.to_string(),
            matched: matched.candidate,
            score: matched.score,
            items,
        })
    }
}

#[inline]
fn enter(stage: Stage) {
    debug!(?stage, "Recommendation stage");
}
