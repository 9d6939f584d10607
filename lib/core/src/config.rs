use crate::{Error, ReducerConfig, Result, TfidfConfig};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;
pub const DEFAULT_RECOMMENDATIONS: usize = 5;

/// Configuration for the recommendation flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommenderConfig {
    pub tfidf: TfidfConfig,
    pub reducer: ReducerConfig,
    /// Fuzzy score (0-100) a query must reach to resolve to a description
    pub match_threshold: u8,
    pub n_recommendations: usize,
    /// Keep derived structures between requests until the catalog changes.
    /// When false every request rebuilds them.
    pub cache_derived: bool,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            tfidf: TfidfConfig::default(),
            reducer: ReducerConfig::default(),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            n_recommendations: DEFAULT_RECOMMENDATIONS,
            cache_derived: true,
        }
    }
}

impl RecommenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.match_threshold > 100 {
            return Err(Error::InvalidConfig(format!(
                "match_threshold must be within 0..=100, got {}",
                self.match_threshold
            )));
        }
        if self.reducer.n_components == 0 {
            return Err(Error::InvalidConfig("n_components must be at least 1".to_string()));
        }
        if self.n_recommendations == 0 {
            return Err(Error::InvalidConfig("n_recommendations must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecommenderConfig::default();
        assert_eq!(config.match_threshold, 80);
        assert_eq!(config.n_recommendations, 5);
        assert_eq!(config.reducer.n_components, 50);
        assert_eq!(config.reducer.seed, 42);
        assert!(config.cache_derived);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut config = RecommenderConfig {
            match_threshold: 101,
            ..RecommenderConfig::default()
        };
        assert!(config.validate().is_err());
        config.match_threshold = 80;
        config.n_recommendations = 0;
        assert!(config.validate().is_err());
    }
}
