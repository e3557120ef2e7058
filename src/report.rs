use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data_models::{
    ContentQuality, DuplicateReport, FileChecks, PerformanceMetrics, ProbeKind, ProbeOutcome,
    ProbeResult, ProbeStatus, ProbeValue, SecurityHeaders, StructuredData, UrlConsistency,
};
use crate::fetcher::FetchedPage;

/// What the primary fetch saw.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub status: u16,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical: Option<String>,
    pub h1_count: usize,
    pub heading_count: usize,
    pub word_count: usize,
    pub internal_links: usize,
    pub external_links: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub probes_run: usize,
    pub probes_succeeded: usize,
    pub failed_probes: Vec<ProbeKind>,
    pub has_duplicate_content: bool,
}

/// The full result of one audit. Every section is always present; a section
/// whose probe failed holds that probe's default value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub url: String,
    pub final_url: String,
    pub audited_at: DateTime<Utc>,
    pub page: PageSummary,
    pub performance: PerformanceMetrics,
    pub files: FileChecks,
    pub structured_data: StructuredData,
    pub url_consistency: UrlConsistency,
    pub content_quality: ContentQuality,
    pub security: SecurityHeaders,
    pub duplicates: DuplicateReport,
    pub probes: Vec<ProbeOutcome>,
    pub summary: AuditSummary,
}

pub struct ReportAssembler;

impl ReportAssembler {
    /// Merges probe results into a report. The first result of each kind
    /// wins; kinds with no result keep their default section.
    pub fn assemble(
        url: &str,
        page: &FetchedPage,
        results: &[ProbeResult],
        audited_at: DateTime<Utc>,
    ) -> AuditReport {
        let mut report = AuditReport {
            url: url.to_string(),
            final_url: page.final_url.clone(),
            audited_at,
            page: page_summary(page),
            performance: PerformanceMetrics::default(),
            files: FileChecks::default(),
            structured_data: StructuredData::default(),
            url_consistency: UrlConsistency::default(),
            content_quality: ContentQuality::default(),
            security: security_headers(page),
            duplicates: DuplicateReport::default(),
            probes: Vec::with_capacity(results.len()),
            summary: AuditSummary::default(),
        };

        let mut seen = Vec::with_capacity(ProbeKind::ALL.len());
        for result in results {
            if seen.contains(&result.kind) {
                log::warn!("ignoring extra {} result", result.kind.as_str());
                continue;
            }
            seen.push(result.kind);
            report.probes.push(ProbeOutcome::from(result));

            match result.value.clone() {
                ProbeValue::Performance(v) => report.performance = v,
                ProbeValue::Files(v) => report.files = v,
                ProbeValue::StructuredData(v) => report.structured_data = v,
                ProbeValue::UrlConsistency(v) => report.url_consistency = v,
                ProbeValue::ContentQuality(v) => report.content_quality = v,
                ProbeValue::Duplicates(v) => report.duplicates = v,
            }
        }

        report.summary = AuditSummary {
            probes_run: report.probes.len(),
            probes_succeeded: report
                .probes
                .iter()
                .filter(|p| p.status == ProbeStatus::Ok)
                .count(),
            failed_probes: report
                .probes
                .iter()
                .filter(|p| p.status != ProbeStatus::Ok)
                .map(|p| p.kind)
                .collect(),
            has_duplicate_content: report.duplicates.duplicates_found > 0,
        };
        report
    }
}

fn page_summary(page: &FetchedPage) -> PageSummary {
    let host = reqwest::Url::parse(&page.final_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    let internal_links = page
        .links
        .iter()
        .filter(|link| {
            reqwest::Url::parse(link)
                .ok()
                .is_some_and(|u| u.host_str().map(str::to_string) == host)
        })
        .count();

    PageSummary {
        status: page.status,
        title: page.title.clone(),
        meta_description: page.meta_description.clone(),
        canonical: page.canonical.clone(),
        h1_count: page.h1_count,
        heading_count: page.headings.len(),
        word_count: page.word_count,
        internal_links,
        external_links: page.links.len() - internal_links,
    }
}

fn security_headers(page: &FetchedPage) -> SecurityHeaders {
    SecurityHeaders {
        https: page.final_url.starts_with("https://"),
        hsts: page.header("strict-transport-security").is_some(),
        content_security_policy: page.header("content-security-policy").is_some(),
        x_frame_options: page.header("x-frame-options").is_some(),
        x_content_type_options: page
            .header("x-content-type-options")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("nosniff")),
        referrer_policy: page.header("referrer-policy").is_some(),
    }
}
