use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Probe, ProbeContext};
use crate::analyzer::TextAnalyzer;
use crate::data_models::{AnalysisSource, ContentQuality, ProbeKind, ProbeValue};
use crate::error::ProbeError;
use crate::fetcher::FetchedPage;
use crate::llm::TextAnalysisClient;

/// Characters of page text sent along with the prompt.
const PROMPT_TEXT_LIMIT: usize = 6000;

/// Outcome of reading a completion as a content analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAnalysis {
    Parsed(ContentQuality),
    Unparsable(String),
}

#[derive(Deserialize)]
struct RawAnalysis {
    score: Option<f64>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Reads the first JSON object in `raw`. Models often wrap the object in prose
/// or code fences, so everything outside the outermost braces is ignored.
pub fn parse_analysis(raw: &str) -> ParsedAnalysis {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return ParsedAnalysis::Unparsable("no JSON object in completion".to_string());
    };
    if end < start {
        return ParsedAnalysis::Unparsable("no JSON object in completion".to_string());
    }

    let parsed: RawAnalysis = match serde_json::from_str(&raw[start..=end]) {
        Ok(parsed) => parsed,
        Err(e) => return ParsedAnalysis::Unparsable(format!("invalid analysis JSON: {e}")),
    };
    let Some(score) = parsed.score.filter(|s| s.is_finite()) else {
        return ParsedAnalysis::Unparsable("analysis has no score".to_string());
    };

    ParsedAnalysis::Parsed(ContentQuality {
        score: Some(score.round().clamp(0.0, 100.0) as u8),
        summary: parsed.summary.filter(|s| !s.trim().is_empty()),
        issues: parsed.issues,
        recommendations: parsed.recommendations,
        source: AnalysisSource::Llm,
    })
}

fn build_prompt(page: &FetchedPage) -> String {
    let text: String = page.text.chars().take(PROMPT_TEXT_LIMIT).collect();
    format!(
        r#"You are reviewing a web page for content quality and search readiness.

URL: {url}
Title: {title}
Meta description: {description}
Headings: {headings}
Word count: {words}

Page text:
{text}

Respond with a single JSON object and nothing else:
{{"score": <0-100>, "summary": "<one or two sentences>", "issues": ["..."], "recommendations": ["..."]}}"#,
        url = page.final_url,
        title = page.title.as_deref().unwrap_or("(none)"),
        description = page.meta_description.as_deref().unwrap_or("(none)"),
        headings = page.headings.join(" | "),
        words = page.word_count,
    )
}

fn average_sentence_length(text: &str) -> f64 {
    let sentences: Vec<usize> = text
        .split(['.', '!', '?'])
        .map(|s| s.split_whitespace().count())
        .filter(|&n| n > 0)
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }
    sentences.iter().sum::<usize>() as f64 / sentences.len() as f64
}

/// Most frequent stemmed keyword and its share of all keywords.
fn top_keyword(text: &str) -> Option<(String, f64, usize)> {
    let terms = TextAnalyzer::keywords().terms(text);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for term in &terms {
        *counts.entry(term.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(term, count)| (term.to_string(), count as f64 / terms.len() as f64, terms.len()))
}

/// Local scoring used when no model analysis is available. Starts from 100
/// and deducts for each problem found.
pub fn heuristic_analysis(page: &FetchedPage) -> ContentQuality {
    let mut score: i32 = 100;
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();
    let mut deduct = |points: i32, issue: String, recommendation: &str| {
        score -= points;
        issues.push(issue);
        recommendations.push(recommendation.to_string());
    };

    let words = page.word_count;
    if words < 300 {
        deduct(
            25,
            format!("thin content ({words} words)"),
            "Expand the page to at least 300 words of substantive content.",
        );
    } else if words < 600 {
        deduct(
            10,
            format!("short content ({words} words)"),
            "Consider covering the topic in more depth.",
        );
    }

    match page.title.as_deref().map(|t| t.chars().count()) {
        None => deduct(15, "missing title".into(), "Add a descriptive <title>."),
        Some(len) if !(30..=60).contains(&len) => deduct(
            5,
            format!("title length {len} outside 30-60 characters"),
            "Keep the title between 30 and 60 characters.",
        ),
        _ => {}
    }

    match page.meta_description.as_deref().map(|d| d.chars().count()) {
        None => deduct(
            10,
            "missing meta description".into(),
            "Add a meta description summarizing the page.",
        ),
        Some(len) if !(70..=160).contains(&len) => deduct(
            5,
            format!("meta description length {len} outside 70-160 characters"),
            "Keep the meta description between 70 and 160 characters.",
        ),
        _ => {}
    }

    match page.h1_count {
        0 => deduct(10, "missing H1".into(), "Add exactly one H1 heading."),
        1 => {}
        n => deduct(5, format!("{n} H1 headings"), "Use a single H1 heading."),
    }

    if words >= 300 && page.headings.len() < 2 {
        deduct(
            5,
            "few headings for the amount of text".into(),
            "Break the text up with descriptive subheadings.",
        );
    }

    let avg = average_sentence_length(&page.text);
    if avg > 25.0 {
        deduct(
            10,
            format!("long sentences (average {avg:.0} words)"),
            "Shorten sentences to improve readability.",
        );
    }

    if let Some((term, density, total)) = top_keyword(&page.text) {
        if total >= 50 && density > 0.05 {
            deduct(
                10,
                format!("keyword \"{term}\" makes up {:.0}% of the text", density * 100.0),
                "Vary the wording to avoid keyword stuffing.",
            );
        }
    }

    let score = score.clamp(0, 100) as u8;
    let summary = match issues.len() {
        0 => "No content issues found by the local checks.".to_string(),
        n => format!("Local checks found {n} content issue(s)."),
    };
    ContentQuality {
        score: Some(score),
        summary: Some(summary),
        issues,
        recommendations,
        source: AnalysisSource::Heuristic,
    }
}

/// Rates the primary page with a text analysis model when one is configured,
/// falling back to [`heuristic_analysis`] on any error or unusable output.
pub struct ContentQualityProbe {
    client: Option<Arc<dyn TextAnalysisClient>>,
}

impl ContentQualityProbe {
    pub fn new(client: Option<Arc<dyn TextAnalysisClient>>) -> Self {
        Self { client }
    }

    pub fn heuristic_only() -> Self {
        Self { client: None }
    }
}

#[async_trait]
impl Probe for ContentQualityProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::ContentQuality
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeValue, ProbeError> {
        let Some(client) = &self.client else {
            return Ok(ProbeValue::ContentQuality(heuristic_analysis(&ctx.page)));
        };

        let quality = match client.complete(&build_prompt(&ctx.page)).await {
            Ok(raw) => match parse_analysis(&raw) {
                ParsedAnalysis::Parsed(quality) => quality,
                ParsedAnalysis::Unparsable(reason) => {
                    log::warn!("content analysis unparsable ({reason}), using heuristic");
                    heuristic_analysis(&ctx.page)
                }
            },
            Err(e) => {
                log::warn!("content analysis failed ({e}), using heuristic");
                heuristic_analysis(&ctx.page)
            }
        };
        Ok(ProbeValue::ContentQuality(quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::probes::test_support::context;

    struct CannedClient(Result<&'static str, ()>);

    #[async_trait]
    impl TextAnalysisClient for CannedClient {
        async fn complete(&self, _prompt: &str) -> Result<String, AnalysisError> {
            self.0.map(str::to_string).map_err(|_| AnalysisError::Empty)
        }
    }

    fn quality(value: ProbeValue) -> ContentQuality {
        match value {
            ProbeValue::ContentQuality(q) => q,
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_parse_analysis_in_code_fence() {
        let raw = "Sure!\n```json\n{\"score\": 81.6, \"summary\": \"Solid.\", \"issues\": [\"thin intro\"]}\n```";
        match parse_analysis(raw) {
            ParsedAnalysis::Parsed(q) => {
                assert_eq!(q.score, Some(82));
                assert_eq!(q.summary.as_deref(), Some("Solid."));
                assert_eq!(q.issues, vec!["thin intro"]);
                assert!(q.recommendations.is_empty());
                assert_eq!(q.source, AnalysisSource::Llm);
            }
            other => panic!("expected parsed, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_analysis_rejects_garbage() {
        assert!(matches!(parse_analysis("I cannot help"), ParsedAnalysis::Unparsable(_)));
        assert!(matches!(parse_analysis("} nope {"), ParsedAnalysis::Unparsable(_)));
        assert!(matches!(
            parse_analysis(r#"{"summary": "no score"}"#),
            ParsedAnalysis::Unparsable(_)
        ));
        assert!(matches!(
            parse_analysis(r#"{"score": "high"}"#),
            ParsedAnalysis::Unparsable(_)
        ));
    }

    #[test]
    fn test_parse_analysis_clamps_score() {
        match parse_analysis(r#"{"score": 140}"#) {
            ParsedAnalysis::Parsed(q) => assert_eq!(q.score, Some(100)),
            other => panic!("expected parsed, got {other:?}"),
        }
    }

    #[test]
    fn test_heuristic_flags_bare_page() {
        let ctx = context("https://example.com/", "<p>Just a few words here.</p>");
        let q = heuristic_analysis(&ctx.page);
        assert_eq!(q.source, AnalysisSource::Heuristic);
        // thin content, missing title, description and H1
        assert_eq!(q.score, Some(40));
        assert_eq!(q.issues.len(), 4);
        assert_eq!(q.recommendations.len(), 4);
    }

    #[test]
    fn test_heuristic_detects_keyword_stuffing() {
        let body = "Widgets are great. ".repeat(40);
        let ctx = context("https://example.com/", &format!("<p>{body}</p>"));
        let q = heuristic_analysis(&ctx.page);
        assert!(q.issues.iter().any(|i| i.contains("widget")));
    }

    #[test]
    fn test_average_sentence_length() {
        assert_eq!(average_sentence_length("One two three. Four five!"), 2.5);
        assert_eq!(average_sentence_length(""), 0.0);
    }

    #[tokio::test]
    async fn test_probe_uses_model_output() {
        let probe = ContentQualityProbe::new(Some(Arc::new(CannedClient(Ok(
            r#"{"score": 90, "summary": "Great page"}"#,
        )))));
        let ctx = context("https://example.com/", "<p>hello</p>");
        let q = quality(probe.run(&ctx).await.unwrap());
        assert_eq!(q.source, AnalysisSource::Llm);
        assert_eq!(q.score, Some(90));
    }

    #[tokio::test]
    async fn test_probe_falls_back_on_unparsable_output() {
        let probe = ContentQualityProbe::new(Some(Arc::new(CannedClient(Ok("no json here")))));
        let ctx = context("https://example.com/", "<p>hello</p>");
        let q = quality(probe.run(&ctx).await.unwrap());
        assert_eq!(q.source, AnalysisSource::Heuristic);
    }

    #[tokio::test]
    async fn test_probe_falls_back_on_client_error() {
        let probe = ContentQualityProbe::new(Some(Arc::new(CannedClient(Err(())))));
        let ctx = context("https://example.com/", "<p>hello</p>");
        let q = quality(probe.run(&ctx).await.unwrap());
        assert_eq!(q.source, AnalysisSource::Heuristic);

        let q = quality(ContentQualityProbe::heuristic_only().run(&ctx).await.unwrap());
        assert_eq!(q.source, AnalysisSource::Heuristic);
    }
}
