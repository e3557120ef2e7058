use std::collections::HashSet;

use crate::analyzer::TextAnalyzer;
use crate::config::AuditConfig;

/// The distinct n-token fragments of one page's canonical text.
///
/// Only [`ShingleIndexer::index`] builds these, so a `ShingleSet` never exists
/// for a page below the word or shingle thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShingleSet {
    shingles: HashSet<String>,
}

impl ShingleSet {
    pub fn len(&self) -> usize {
        self.shingles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shingles.is_empty()
    }

    pub fn contains(&self, shingle: &str) -> bool {
        self.shingles.contains(shingle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.shingles.iter().map(String::as_str)
    }

    /// `|self ∩ other|`, iterating over the smaller side.
    pub fn intersection_len(&self, other: &ShingleSet) -> usize {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .shingles
            .iter()
            .filter(|s| large.shingles.contains(*s))
            .count()
    }

    /// Sorted contents; used only to break ties between equally sized sets.
    pub(crate) fn sorted(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.iter().collect();
        v.sort_unstable();
        v
    }

    #[cfg(test)]
    pub(crate) fn from_raw<I, S>(shingles: I) -> ShingleSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ShingleSet {
            shingles: shingles.into_iter().map(Into::into).collect(),
        }
    }
}

pub struct ShingleIndexer {
    analyzer: TextAnalyzer,
    shingle_size: usize,
    min_words: usize,
    min_shingles: usize,
}

impl ShingleIndexer {
    pub fn new(shingle_size: usize, min_words: usize, min_shingles: usize) -> Self {
        Self {
            analyzer: TextAnalyzer::canonical(),
            shingle_size: shingle_size.max(1),
            min_words,
            min_shingles,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.shingle_size, config.min_words, config.min_shingles)
    }

    /// Canonical tokens: lowercased, punctuation stripped, whitespace collapsed.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        self.analyzer.terms(text)
    }

    /// Returns `None` when the page has fewer than `min_words` tokens or
    /// yields fewer than `min_shingles` distinct shingles.
    pub fn index(&self, text: &str) -> Option<ShingleSet> {
        let tokens = self.tokens(text);
        if tokens.len() < self.min_words {
            return None;
        }

        let shingles: HashSet<String> = tokens
            .windows(self.shingle_size)
            .map(|window| window.join(" "))
            .collect();

        if shingles.len() < self.min_shingles {
            return None;
        }
        Some(ShingleSet { shingles })
    }
}

impl Default for ShingleIndexer {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{prefix}{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_below_min_words_is_excluded() {
        let indexer = ShingleIndexer::default();
        assert!(indexer.index(&words("w", 49)).is_none());
        assert!(indexer.index(&words("w", 50)).is_some());
    }

    #[test]
    fn test_shingle_count_is_tokens_minus_two() {
        let indexer = ShingleIndexer::default();
        let set = indexer.index(&words("w", 60)).unwrap();
        assert_eq!(set.len(), 58);
        assert!(set.contains("w0 w1 w2"));
        assert!(set.contains("w57 w58 w59"));
    }

    #[test]
    fn test_repeated_text_collapses_below_min_shingles() {
        // 60 words but only 3 distinct shingles
        let text = "buy now cheap ".repeat(20);
        let indexer = ShingleIndexer::default();
        assert!(indexer.index(&text).is_none());
    }

    #[test]
    fn test_canonicalization_ignores_case_and_punctuation() {
        let indexer = ShingleIndexer::new(3, 3, 1);
        let a = indexer.index("Hello, World!  How are   you?").unwrap();
        let b = indexer.index("hello world how are you").unwrap();
        assert_eq!(a, b);
        assert!(a.contains("hello world how"));
    }

    #[test]
    fn test_intersection_len() {
        let a = ShingleSet::from_raw(["x", "y", "z"]);
        let b = ShingleSet::from_raw(["y", "z", "w", "v"]);
        assert_eq!(a.intersection_len(&b), 2);
        assert_eq!(b.intersection_len(&a), 2);
    }
}
