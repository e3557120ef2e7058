use siteaudit::data_models::{DuplicateMethod, Page};
use siteaudit::shingles::ShingleIndexer;
use siteaudit::similarity::{DuplicateDetector, SimilarityEngine, jaccard};

mod test_helpers {
    use super::*;

    /// `prefix0 prefix1 ... prefix{n-1}`: every word distinct, so an n-word
    /// text yields n - 2 distinct 3-shingles.
    pub fn words(prefix: &str, range: std::ops::Range<usize>) -> String {
        range
            .map(|i| format!("{prefix}{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn page(url: &str, title: &str, text: String) -> Page {
        Page::new(url.to_string(), title.to_string(), text)
    }
}

use test_helpers::*;

#[test]
fn test_identical_bodies_are_exact_duplicates() {
    let body = words("lorem", 0..400);
    let pages = vec![
        page("https://shop.example/red-widget", "Red widget", body.clone()),
        page("https://shop.example/red-widget?ref=nav", "Red widget", body),
    ];

    let report = DuplicateDetector::default().find_duplicates(&pages);
    assert_eq!(report.pages_scanned, 2);
    assert_eq!(report.duplicates_found, 1);
    let pair = &report.results[0];
    assert_eq!(pair.similarity, 100);
    assert_eq!(pair.method, DuplicateMethod::Jaccard);
    assert_eq!(pair.url_a, "https://shop.example/red-widget");
    assert_eq!(pair.title_b, "Red widget");
}

#[test]
fn test_unrelated_pages_have_no_duplicates() {
    let pages = vec![
        page("https://example.com/a", "A", words("alpha", 0..500)),
        page("https://example.com/b", "B", words("beta", 0..500)),
        page("https://example.com/c", "C", words("gamma", 0..500)),
    ];
    let report = DuplicateDetector::default().find_duplicates(&pages);
    assert_eq!(report.pages_scanned, 3);
    assert_eq!(report.duplicates_found, 0);
    assert!(report.results.is_empty());
}

#[test]
fn test_short_quote_inside_long_page_is_not_a_duplicate() {
    let long = words("w", 0..2000);
    let quote = words("w", 500..530);
    let pages = vec![
        page("https://example.com/guide", "Guide", long),
        page("https://example.com/news", "News", quote),
    ];
    let report = DuplicateDetector::default().find_duplicates(&pages);
    assert_eq!(report.pages_scanned, 2);
    assert_eq!(report.duplicates_found, 0);
}

#[test]
fn test_archive_contained_in_category_is_subset_duplicate() {
    // 830 shared words plus 70 of its own: ~92% of the archive's shingles
    // appear in the category page, while Jaccard stays near 0.78.
    let category = words("c", 0..1000);
    let archive = format!("{} {}", words("c", 0..830), words("a", 0..70));
    let pages = vec![
        page("https://blog.example/2023/", "2023 archive", archive),
        page("https://blog.example/category/rust/", "Rust", category),
    ];

    let report = DuplicateDetector::default().find_duplicates(&pages);
    assert_eq!(report.duplicates_found, 1);
    let pair = &report.results[0];
    assert_eq!(pair.method, DuplicateMethod::SubsetAInB);
    assert_eq!(pair.url_a, "https://blog.example/2023/");
    assert!((85..=95).contains(&pair.similarity), "got {}", pair.similarity);
    assert_eq!(pair.similarity, 90);
}

#[test]
fn test_pages_below_min_words_are_skipped() {
    let body = words("x", 0..49);
    let pages = vec![
        page("https://example.com/a", "A", body.clone()),
        page("https://example.com/b", "B", body),
    ];
    let report = DuplicateDetector::default().find_duplicates(&pages);
    assert_eq!(report.pages_scanned, 2);
    assert_eq!(report.duplicates_found, 0);
    assert!(ShingleIndexer::default().index(&words("x", 0..49)).is_none());
}

#[test]
fn test_jaccard_bounds_and_identity() {
    let indexer = ShingleIndexer::default();
    let a = indexer.index(&words("t", 0..300)).unwrap();
    let b = indexer.index(&words("t", 150..450)).unwrap();

    assert_eq!(jaccard(&a, &a), 1.0);
    let j = jaccard(&a, &b);
    assert!((0.0..=1.0).contains(&j));
    assert!(j > 0.0 && j < 1.0);
    assert_eq!(j, jaccard(&b, &a));
}

#[test]
fn test_disjoint_sets_never_match() {
    let indexer = ShingleIndexer::default();
    let a = indexer.index(&words("left", 0..200)).unwrap();
    let b = indexer.index(&words("right", 0..200)).unwrap();
    assert_eq!(jaccard(&a, &b), 0.0);
    assert!(SimilarityEngine::default().compare(&a, &b).is_none());
    assert!(SimilarityEngine::default().compare(&b, &a).is_none());
}

#[test]
fn test_full_containment_below_size_ratio_never_flags() {
    // 20 shingles fully inside 1,998: containment 1.0, ratio ~0.01
    let indexer = ShingleIndexer::new(3, 10, 10);
    let small = indexer.index(&words("w", 0..22)).unwrap();
    let large = indexer.index(&words("w", 0..2000)).unwrap();
    assert_eq!(small.len(), 20);

    let engine = SimilarityEngine::default();
    assert!(engine.compare(&small, &large).is_none());
    assert!(engine.compare(&large, &small).is_none());
}

#[test]
fn test_compare_is_symmetric_with_mirrored_method() {
    let indexer = ShingleIndexer::default();
    let large = indexer.index(&words("c", 0..1000)).unwrap();
    let small = indexer
        .index(&format!("{} {}", words("c", 0..830), words("a", 0..70)))
        .unwrap();
    let engine = SimilarityEngine::default();

    let forward = engine.compare(&small, &large).unwrap();
    let backward = engine.compare(&large, &small).unwrap();
    assert_eq!(forward.similarity, backward.similarity);
    assert_eq!(forward.method, DuplicateMethod::SubsetAInB);
    assert_eq!(backward.method, forward.method.mirrored());
}

#[test]
fn test_threshold_is_configurable() {
    let indexer = ShingleIndexer::default();
    let a = indexer.index(&words("t", 0..300)).unwrap();
    let b = indexer.index(&words("t", 30..330)).unwrap();
    // 268 shared of 328 distinct: jaccard ~0.82, containment ~0.90
    assert!(SimilarityEngine::new(0.95, 10, 0.6).compare(&a, &b).is_none());
    let m = SimilarityEngine::new(0.8, 10, 0.6).compare(&a, &b).unwrap();
    assert_eq!(m.method, DuplicateMethod::Jaccard);
    assert_eq!(m.percent(), 82);
}
