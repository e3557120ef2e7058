use serde::{Deserialize, Serialize};

/// One page of harvested content, the unit the shingle indexer works on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub url: String,
    pub title: String,
    pub text: String,
    pub word_count: usize,
}

impl Page {
    pub fn new(url: String, title: String, text: String) -> Page {
        let word_count = text.split_whitespace().count();
        Page {
            url,
            title,
            text,
            word_count,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateMethod {
    #[serde(rename = "jaccard")]
    Jaccard,
    #[serde(rename = "subset-A-in-B")]
    SubsetAInB,
    #[serde(rename = "subset-B-in-A")]
    SubsetBInA,
}

impl DuplicateMethod {
    /// The same relation seen with the two pages swapped.
    pub fn mirrored(self) -> DuplicateMethod {
        match self {
            DuplicateMethod::Jaccard => DuplicateMethod::Jaccard,
            DuplicateMethod::SubsetAInB => DuplicateMethod::SubsetBInA,
            DuplicateMethod::SubsetBInA => DuplicateMethod::SubsetAInB,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DuplicateMethod::Jaccard => "jaccard",
            DuplicateMethod::SubsetAInB => "subset-A-in-B",
            DuplicateMethod::SubsetBInA => "subset-B-in-A",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePair {
    pub url_a: String,
    pub url_b: String,
    /// Rounded percentage, 0-100.
    pub similarity: u8,
    pub method: DuplicateMethod,
    pub title_a: String,
    pub title_b: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    pub pages_scanned: usize,
    pub duplicates_found: usize,
    pub results: Vec<DuplicatePair>,
}

// =============================================================================
// Probe sections
// =============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Lighthouse performance score, 0-100.
    pub score: Option<u8>,
    pub first_contentful_paint_ms: Option<f64>,
    pub largest_contentful_paint_ms: Option<f64>,
    pub total_blocking_time_ms: Option<f64>,
    pub cumulative_layout_shift: Option<f64>,
    pub speed_index_ms: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileChecks {
    pub robots_txt: bool,
    pub sitemap_xml: bool,
    pub llms_txt: bool,
    pub sitemap_in_robots: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredData {
    pub json_ld_blocks: usize,
    pub invalid_json_ld_blocks: usize,
    pub schema_types: Vec<String>,
    pub microdata_types: Vec<String>,
    pub has_open_graph: bool,
    pub has_twitter_card: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlVariant {
    pub url: String,
    pub final_url: Option<String>,
    pub status: Option<u16>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlConsistency {
    pub variants: Vec<UrlVariant>,
    pub redirects_to_https: Option<bool>,
    pub consistent_host: Option<bool>,
    pub canonical_url: Option<String>,
    pub canonical_matches: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Llm,
    Heuristic,
    #[default]
    None,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuality {
    pub score: Option<u8>,
    pub summary: Option<String>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: AnalysisSource,
}

/// Derived from the primary fetch; not a probe.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityHeaders {
    pub https: bool,
    pub hsts: bool,
    pub content_security_policy: bool,
    pub x_frame_options: bool,
    pub x_content_type_options: bool,
    pub referrer_policy: bool,
}

// =============================================================================
// Probe outcomes
// =============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ProbeKind {
    Performance,
    Files,
    StructuredData,
    UrlConsistency,
    ContentQuality,
    Duplicates,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 6] = [
        ProbeKind::Performance,
        ProbeKind::Files,
        ProbeKind::StructuredData,
        ProbeKind::UrlConsistency,
        ProbeKind::ContentQuality,
        ProbeKind::Duplicates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProbeKind::Performance => "performance",
            ProbeKind::Files => "files",
            ProbeKind::StructuredData => "structuredData",
            ProbeKind::UrlConsistency => "urlConsistency",
            ProbeKind::ContentQuality => "contentQuality",
            ProbeKind::Duplicates => "duplicates",
        }
    }

    /// The documented value a failed or timed-out probe contributes.
    pub fn default_value(self) -> ProbeValue {
        match self {
            ProbeKind::Performance => ProbeValue::Performance(PerformanceMetrics::default()),
            ProbeKind::Files => ProbeValue::Files(FileChecks::default()),
            ProbeKind::StructuredData => ProbeValue::StructuredData(StructuredData::default()),
            ProbeKind::UrlConsistency => ProbeValue::UrlConsistency(UrlConsistency::default()),
            ProbeKind::ContentQuality => ProbeValue::ContentQuality(ContentQuality::default()),
            ProbeKind::Duplicates => ProbeValue::Duplicates(DuplicateReport::default()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ProbeValue {
    Performance(PerformanceMetrics),
    Files(FileChecks),
    StructuredData(StructuredData),
    UrlConsistency(UrlConsistency),
    ContentQuality(ContentQuality),
    Duplicates(DuplicateReport),
}

impl ProbeValue {
    pub fn kind(&self) -> ProbeKind {
        match self {
            ProbeValue::Performance(_) => ProbeKind::Performance,
            ProbeValue::Files(_) => ProbeKind::Files,
            ProbeValue::StructuredData(_) => ProbeKind::StructuredData,
            ProbeValue::UrlConsistency(_) => ProbeKind::UrlConsistency,
            ProbeValue::ContentQuality(_) => ProbeKind::ContentQuality,
            ProbeValue::Duplicates(_) => ProbeKind::Duplicates,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Failed,
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub kind: ProbeKind,
    pub status: ProbeStatus,
    pub value: ProbeValue,
    pub failure_reason: Option<String>,
}

impl ProbeResult {
    pub fn ok(value: ProbeValue) -> ProbeResult {
        ProbeResult {
            kind: value.kind(),
            status: ProbeStatus::Ok,
            value,
            failure_reason: None,
        }
    }

    pub fn failed(kind: ProbeKind, reason: impl Into<String>) -> ProbeResult {
        ProbeResult {
            kind,
            status: ProbeStatus::Failed,
            value: kind.default_value(),
            failure_reason: Some(reason.into()),
        }
    }

    pub fn timeout(kind: ProbeKind, reason: impl Into<String>) -> ProbeResult {
        ProbeResult {
            kind,
            status: ProbeStatus::Timeout,
            value: kind.default_value(),
            failure_reason: Some(reason.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ProbeStatus::Ok
    }
}

/// Per-probe line in the report: what ran and how it ended, without the value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    pub kind: ProbeKind,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<&ProbeResult> for ProbeOutcome {
    fn from(result: &ProbeResult) -> Self {
        ProbeOutcome {
            kind: result.kind,
            status: result.status,
            failure_reason: result.failure_reason.clone(),
        }
    }
}
