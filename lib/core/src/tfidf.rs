// TF-IDF text embedder for product descriptions
use crate::stopwords::is_stop_word;
use crate::{Error, Result, SparseVector};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfidfConfig {
    /// Drop the built-in English stop words
    pub english_stop_words: bool,
    /// Tokens shorter than this (in chars) are discarded
    pub min_token_len: usize,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            english_stop_words: true,
            min_token_len: 2,
        }
    }
}

/// Row-per-document TF-IDF weights over the corpus vocabulary
#[derive(Debug, Clone)]
pub struct EmbeddingMatrix {
    rows: Vec<SparseVector>,
    vocabulary: Vec<String>,
    idf: Vec<f32>,
}

impl EmbeddingMatrix {
    #[inline]
    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    #[inline]
    pub fn row(&self, index: usize) -> Option<&SparseVector> {
        self.rows.get(index)
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Vocabulary size, i.e. column count
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.vocabulary.len()
    }

    /// Terms in column order (lexicographic)
    #[inline]
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    #[inline]
    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.vocabulary
            .binary_search_by(|probe| probe.as_str().cmp(term))
            .ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    config: TfidfConfig,
}

impl TfidfVectorizer {
    pub fn new(config: TfidfConfig) -> Self {
        Self { config }
    }

    /// Lower-case, split on anything that is not a word character,
    /// drop short tokens and (optionally) stop words
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|s| s.chars().count() >= self.config.min_token_len)
            .filter(|s| !(self.config.english_stop_words && is_stop_word(s)))
            .map(str::to_string)
            .collect()
    }

    /// Learn the vocabulary and idf of `documents` and weight each of them.
    ///
    /// `tf` is the raw count, `idf = ln((1 + n) / (1 + df)) + 1`, rows are
    /// L2-normalized. A document with no surviving terms is a zero row.
    pub fn fit_transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<EmbeddingMatrix> {
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| self.tokenize(doc.as_ref()))
            .collect();

        // term -> document frequency, ordered so column ids are stable
        let mut document_frequency: BTreeMap<&str, u32> = BTreeMap::new();
        for tokens in &tokenized {
            let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        if document_frequency.is_empty() {
            return Err(Error::EmptyVocabulary);
        }

        let n_docs = documents.len() as f64;
        let vocabulary: Vec<String> = document_frequency.keys().map(|t| t.to_string()).collect();
        let idf: Vec<f32> = document_frequency
            .values()
            .map(|&df| (((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0) as f32)
            .collect();
        let columns: AHashMap<&str, u32> = document_frequency
            .keys()
            .enumerate()
            .map(|(i, term)| (*term, i as u32))
            .collect();

        let dim = vocabulary.len();
        let rows = tokenized
            .iter()
            .map(|tokens| {
                let mut counts: AHashMap<u32, u32> = AHashMap::new();
                for token in tokens {
                    if let Some(&column) = columns.get(token.as_str()) {
                        *counts.entry(column).or_insert(0) += 1;
                    }
                }
                let pairs = counts
                    .into_iter()
                    .map(|(column, tf)| (column, tf as f32 * idf[column as usize]))
                    .collect();
                let mut row = SparseVector::from_pairs(dim, pairs);
                row.normalize();
                row
            })
            .collect();

        Ok(EmbeddingMatrix {
            rows,
            vocabulary,
            idf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let vectorizer = TfidfVectorizer::default();
        assert_eq!(
            vectorizer.tokenize("WHITE HANGING HEART T-LIGHT HOLDER"),
            vec!["white", "hanging", "heart", "light", "holder"]
        );
        assert_eq!(vectorizer.tokenize("SET OF 3 CAKE TINS"), vec!["set", "cake", "tins"]);
    }

    #[test]
    fn test_tokenize_without_stop_words() {
        let vectorizer = TfidfVectorizer::new(TfidfConfig {
            english_stop_words: false,
            min_token_len: 2,
        });
        assert_eq!(vectorizer.tokenize("set of cake"), vec!["set", "of", "cake"]);
    }

    #[test]
    fn test_row_count_matches_documents() {
        let docs = ["RED MUG", "BLUE MUG", "RED PLATE", "GREEN MUG", "BLUE PLATE"];
        let matrix = TfidfVectorizer::default().fit_transform(&docs).unwrap();
        assert_eq!(matrix.n_rows(), docs.len());
        assert_eq!(matrix.vocabulary(), &["blue", "green", "mug", "plate", "red"]);
    }

    #[test]
    fn test_weights_are_smoothed_idf_and_normalized() {
        let docs = ["RED MUG", "BLUE MUG", "RED PLATE", "GREEN MUG", "BLUE PLATE"];
        let matrix = TfidfVectorizer::default().fit_transform(&docs).unwrap();

        let mug = matrix.term_index("mug").unwrap();
        let green = matrix.term_index("green").unwrap();
        assert!((matrix.idf()[mug] - ((6.0f32 / 4.0).ln() + 1.0)).abs() < 1e-6);
        assert!((matrix.idf()[green] - ((6.0f32 / 2.0).ln() + 1.0)).abs() < 1e-6);

        for row in matrix.rows() {
            assert!((row.norm() - 1.0).abs() < 1e-5);
        }
        // "red mug" vs "blue mug" share only "mug"
        let sim = matrix.rows()[0].dot(&matrix.rows()[1]);
        assert!((sim - 0.4079).abs() < 1e-3, "got {}", sim);
    }

    #[test]
    fn test_stop_word_only_document_is_zero_row() {
        let docs = ["RED MUG", "THE OF AND"];
        let matrix = TfidfVectorizer::default().fit_transform(&docs).unwrap();
        assert_eq!(matrix.n_rows(), 2);
        assert!(matrix.rows()[1].is_zero());
    }

    #[test]
    fn test_empty_vocabulary() {
        let docs = ["the", "a b c"];
        assert!(matches!(
            TfidfVectorizer::default().fit_transform(&docs),
            Err(Error::EmptyVocabulary)
        ));
        let empty: [&str; 0] = [];
        assert!(TfidfVectorizer::default().fit_transform(&empty).is_err());
    }

    #[test]
    fn test_deterministic() {
        let docs = ["PINK HEART MUG", "HEART LANTERN", "PINK LANTERN"];
        let a = TfidfVectorizer::default().fit_transform(&docs).unwrap();
        let b = TfidfVectorizer::default().fit_transform(&docs).unwrap();
        assert_eq!(a.rows(), b.rows());
        assert_eq!(a.vocabulary(), b.vocabulary());
    }
}
