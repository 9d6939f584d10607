//! Resolve a free-text query to one known description.

use crate::ratio::{process, weighted_ratio_processed};
use retailrec_core::{Error, Result, DEFAULT_MATCH_THRESHOLD};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A scored candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Position in the candidate list
    pub index: usize,
    pub candidate: String,
    /// Weighted ratio, 0-100
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Matched(MatchResult),
    /// Best candidate scored below the threshold, or there was nothing to
    /// score at all
    Rejected { best: Option<MatchResult> },
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matcher {
    threshold: u8,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl Matcher {
    pub fn new(threshold: u8) -> Result<Self> {
        if threshold > 100 {
            return Err(Error::InvalidConfig(format!(
                "match threshold must be within 0..=100, got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    #[inline]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Highest-scoring candidate; equal scores keep the earliest one
    pub fn best_match<S: AsRef<str>>(&self, query: &str, candidates: &[S]) -> Option<MatchResult> {
        let query = process(query);
        if query.is_empty() {
            return None;
        }

        let mut best: Option<(usize, u8)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let score = weighted_ratio_processed(&query, &process(candidate.as_ref()));
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
                if score == 100 {
                    break;
                }
            }
        }

        best.map(|(index, score)| MatchResult {
            index,
            candidate: candidates[index].as_ref().to_string(),
            score,
        })
    }

    /// Apply the threshold to [`Matcher::best_match`]
    pub fn resolve<S: AsRef<str>>(&self, query: &str, candidates: &[S]) -> MatchOutcome {
        match self.best_match(query, candidates) {
            Some(best) if best.score >= self.threshold => {
                debug!(query, matched = %best.candidate, score = best.score, "Query matched");
                MatchOutcome::Matched(best)
            }
            best => {
                debug!(
                    query,
                    best_score = best.as_ref().map(|b| b.score),
                    threshold = self.threshold,
                    "Query rejected"
                );
                MatchOutcome::Rejected { best }
            }
        }
    }

    /// The `n` best candidates regardless of threshold, highest score first,
    /// ties in candidate order
    pub fn top_matches<S: AsRef<str>>(&self, query: &str, candidates: &[S], n: usize) -> Vec<MatchResult> {
        let query = process(query);
        if query.is_empty() || n == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, u8)> = candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| (index, weighted_ratio_processed(&query, &process(candidate.as_ref()))))
            .collect();
        // stable: equal scores stay in candidate order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
            .into_iter()
            .take(n)
            .map(|(index, score)| MatchResult {
                index,
                candidate: candidates[index].as_ref().to_string(),
                score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: [&str; 5] = [
        "WHITE METAL LANTERN",
        "CREAM CUPID HEARTS COAT HANGER",
        "WHITE HANGING HEART T-LIGHT HOLDER",
        "RED WOOLLY HOTTIE WHITE HEART.",
        "KNITTED UNION FLAG HOT WATER BOTTLE",
    ];

    #[test]
    fn test_typo_resolves_to_exact_string() {
        let outcome = Matcher::default().resolve("Wihte Hanging Heart T-Light Holder", &CATALOG);
        match outcome {
            MatchOutcome::Matched(result) => {
                assert_eq!(result.candidate, "WHITE HANGING HEART T-LIGHT HOLDER");
                assert_eq!(result.index, 2);
                assert!(result.score >= 80);
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_below_threshold_is_rejected() {
        let outcome = Matcher::default().resolve("xylophone", &["RED MUG", "BLUE MUG", "RED PLATE"]);
        match outcome {
            MatchOutcome::Rejected { best: Some(best) } => assert!(best.score < 80),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        let matcher = Matcher::default();
        assert_eq!(matcher.resolve("", &CATALOG), MatchOutcome::Rejected { best: None });
        assert_eq!(matcher.resolve("  -- ", &CATALOG), MatchOutcome::Rejected { best: None });
        let empty: [&str; 0] = [];
        assert_eq!(matcher.resolve("red mug", &empty), MatchOutcome::Rejected { best: None });
    }

    #[test]
    fn test_ties_prefer_first_candidate() {
        let candidates = ["Red Mug", "RED MUG", "red-mug"];
        let best = Matcher::default().best_match("red mug", &candidates).unwrap();
        assert_eq!(best.index, 0);
        assert_eq!(best.score, 100);
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(Matcher::new(101).is_err());
        assert_eq!(Matcher::new(0).unwrap().threshold(), 0);
        let permissive = Matcher::new(0).unwrap();
        assert!(permissive.resolve("xylophone", &["RED MUG"]).is_matched());
    }

    #[test]
    fn test_top_matches() {
        let top = Matcher::default().top_matches("white heart", &CATALOG, 2);
        assert_eq!(top.len(), 2);
        assert!(top[0].score >= top[1].score);
        assert!(top[0].candidate.contains("HEART"));
        assert!(Matcher::default().top_matches("white heart", &CATALOG, 0).is_empty());
    }
}
