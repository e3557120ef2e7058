use std::cmp::Ordering;

use crate::config::AuditConfig;
use crate::data_models::{DuplicateMethod, DuplicatePair, DuplicateReport, Page};
use crate::shingles::{ShingleIndexer, ShingleSet};

/// Upper bound of the similarity reported for a subset match.
pub const SUBSET_SIMILARITY_CEILING: f64 = 0.95;
/// Below this size ratio a subset match is never considered, whatever
/// `min_size_ratio` is configured to.
pub const MIN_SIZE_RATIO_FLOOR: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatch {
    /// Fraction in `[0, 1]`.
    pub similarity: f64,
    pub method: DuplicateMethod,
}

impl SimilarityMatch {
    pub fn percent(&self) -> u8 {
        (self.similarity * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// `|A∩B| / |A∪B|`; 1.0 when both sets are empty, 0.0 when only one is.
pub fn jaccard(a: &ShingleSet, b: &ShingleSet) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    let intersection = a.intersection_len(b);
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Fraction of `small` also present in `large`.
pub fn containment(small: &ShingleSet, large: &ShingleSet) -> f64 {
    if small.is_empty() {
        return 0.0;
    }
    small.intersection_len(large) as f64 / small.len() as f64
}

#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    threshold: f64,
    min_shingles: usize,
    min_size_ratio: f64,
}

impl SimilarityEngine {
    pub fn new(threshold: f64, min_shingles: usize, min_size_ratio: f64) -> Self {
        Self {
            threshold,
            min_shingles,
            min_size_ratio,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(
            config.duplicate_threshold,
            config.min_shingles,
            config.min_size_ratio,
        )
    }

    /// Classifies one pair. Jaccard above the threshold always wins; subset
    /// containment is only tried otherwise.
    pub fn compare(&self, a: &ShingleSet, b: &ShingleSet) -> Option<SimilarityMatch> {
        let j = jaccard(a, b);
        if j > self.threshold {
            return Some(SimilarityMatch {
                similarity: j,
                method: DuplicateMethod::Jaccard,
            });
        }
        self.compare_subset(a, b)
    }

    fn compare_subset(&self, a: &ShingleSet, b: &ShingleSet) -> Option<SimilarityMatch> {
        let a_is_small = match a.len().cmp(&b.len()) {
            Ordering::Less => true,
            Ordering::Greater => false,
            // equal sizes: order on content so compare(a, b) mirrors compare(b, a)
            Ordering::Equal => a.sorted() <= b.sorted(),
        };
        let (small, large) = if a_is_small { (a, b) } else { (b, a) };

        if small.len() < self.min_shingles || large.is_empty() {
            return None;
        }
        let ratio = small.len() as f64 / large.len() as f64;
        if ratio < self.min_size_ratio || ratio < MIN_SIZE_RATIO_FLOOR {
            return None;
        }

        let c = containment(small, large);
        if c < self.threshold {
            return None;
        }

        let method = if a_is_small {
            DuplicateMethod::SubsetAInB
        } else {
            DuplicateMethod::SubsetBInA
        };
        Some(SimilarityMatch {
            similarity: self.map_containment(c),
            method,
        })
    }

    /// Linear map of `[threshold, 1]` onto `[threshold, 0.95]`.
    fn map_containment(&self, c: f64) -> f64 {
        let span = 1.0 - self.threshold;
        if span <= f64::EPSILON {
            return self.threshold.min(SUBSET_SIMILARITY_CEILING);
        }
        let mapped = self.threshold
            + (c - self.threshold) * ((SUBSET_SIMILARITY_CEILING - self.threshold) / span);
        mapped.min(SUBSET_SIMILARITY_CEILING)
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

/// Indexes every page and compares each surviving pair exhaustively.
pub struct DuplicateDetector {
    indexer: ShingleIndexer,
    engine: SimilarityEngine,
}

impl DuplicateDetector {
    pub fn new(indexer: ShingleIndexer, engine: SimilarityEngine) -> Self {
        Self { indexer, engine }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(
            ShingleIndexer::from_config(config),
            SimilarityEngine::from_config(config),
        )
    }

    pub fn find_duplicates(&self, pages: &[Page]) -> DuplicateReport {
        let indexed: Vec<(&Page, ShingleSet)> = pages
            .iter()
            .filter_map(|page| match self.indexer.index(&page.text) {
                Some(set) => Some((page, set)),
                None => {
                    log::debug!("skipping {} for duplicate detection: too little content", page.url);
                    None
                }
            })
            .collect();

        log::debug!(
            "comparing {} of {} pages for near-duplicate content",
            indexed.len(),
            pages.len()
        );

        let mut results = Vec::new();
        for i in 0..indexed.len() {
            for j in (i + 1)..indexed.len() {
                let (page_a, set_a) = &indexed[i];
                let (page_b, set_b) = &indexed[j];
                if let Some(m) = self.engine.compare(set_a, set_b) {
                    results.push(DuplicatePair {
                        url_a: page_a.url.clone(),
                        url_b: page_b.url.clone(),
                        similarity: m.percent(),
                        method: m.method,
                        title_a: page_a.title.clone(),
                        title_b: page_b.title.clone(),
                    });
                }
            }
        }

        DuplicateReport {
            pages_scanned: pages.len(),
            duplicates_found: results.len(),
            results,
        }
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(prefix: &str, range: std::ops::Range<usize>) -> ShingleSet {
        ShingleSet::from_raw(range.map(|i| format!("{prefix}{i}")))
    }

    fn union(a: &[&ShingleSet]) -> ShingleSet {
        ShingleSet::from_raw(a.iter().flat_map(|s| s.iter().map(str::to_string)).collect::<Vec<_>>())
    }

    #[test]
    fn test_jaccard_edge_cases() {
        let empty = ShingleSet::from_raw(Vec::<String>::new());
        let some = set("s", 0..5);
        assert_eq!(jaccard(&empty, &empty), 1.0);
        assert_eq!(jaccard(&empty, &some), 0.0);
        assert_eq!(jaccard(&some, &empty), 0.0);
        assert_eq!(jaccard(&some, &some), 1.0);
    }

    #[test]
    fn test_jaccard_partial_overlap() {
        let a = set("s", 0..10);
        let b = set("s", 5..15);
        // 5 shared, 15 total
        assert!((jaccard(&a, &b) - 5.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_sets_match_by_jaccard() {
        let engine = SimilarityEngine::default();
        let a = set("s", 0..100);
        let m = engine.compare(&a, &a.clone()).unwrap();
        assert_eq!(m.method, DuplicateMethod::Jaccard);
        assert_eq!(m.percent(), 100);
    }

    #[test]
    fn test_jaccard_exactly_at_threshold_is_not_jaccard_match() {
        // 85 shared out of 100 union: jaccard == 0.85, not strictly above
        let a = set("s", 0..100);
        let b = set("s", 15..100);
        let engine = SimilarityEngine::default();
        let m = engine.compare(&a, &b).unwrap();
        // falls through to subset: b (85) fully inside a (100), ratio 0.85
        assert_eq!(m.method, DuplicateMethod::SubsetBInA);
        assert!((m.similarity - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_subset_blocked_by_size_ratio() {
        let large = set("s", 0..2000);
        let small = set("s", 0..20);
        let engine = SimilarityEngine::default();
        assert!(engine.compare(&small, &large).is_none());
        assert!(engine.compare(&large, &small).is_none());
    }

    #[test]
    fn test_subset_blocked_when_small_side_too_small() {
        let engine = SimilarityEngine::new(0.85, 10, 0.6);
        let large = set("s", 0..12);
        let small = set("s", 0..9);
        assert!(engine.compare(&small, &large).is_none());
    }

    #[test]
    fn test_subset_mapping_range() {
        let engine = SimilarityEngine::default();
        let large = set("c", 0..1000);
        // 900 of 980 inside large: containment ~0.918, jaccard 900/1080
        let small = union(&[&set("c", 0..900), &set("x", 0..80)]);
        let m = engine.compare(&small, &large).unwrap();
        assert_eq!(m.method, DuplicateMethod::SubsetAInB);
        let c = 900.0 / 980.0;
        let expected = 0.85 + (c - 0.85) * (0.10 / 0.15);
        assert!((m.similarity - expected).abs() < 1e-9);
        assert!((85..=95).contains(&m.percent()));
    }

    #[test]
    fn test_mirrored_labels_on_equal_sizes() {
        let engine = SimilarityEngine::default();
        let a = union(&[&set("s", 0..90), &set("a", 0..10)]);
        let b = union(&[&set("s", 0..90), &set("b", 0..10)]);
        let ab = engine.compare(&a, &b).unwrap();
        let ba = engine.compare(&b, &a).unwrap();
        assert_eq!(ab.similarity, ba.similarity);
        assert_eq!(ab.method, ba.method.mirrored());
        assert_ne!(ab.method, DuplicateMethod::Jaccard);
    }

    #[test]
    fn test_disjoint_sets_never_match() {
        let engine = SimilarityEngine::default();
        let a = set("a", 0..50);
        let b = set("b", 0..50);
        assert_eq!(jaccard(&a, &b), 0.0);
        assert!(engine.compare(&a, &b).is_none());
    }

    #[test]
    fn test_map_containment_caps_at_ceiling() {
        let engine = SimilarityEngine::default();
        assert!((engine.map_containment(1.0) - 0.95).abs() < 1e-9);
        assert!((engine.map_containment(0.85) - 0.85).abs() < 1e-9);
    }
}
