//! Independent audit checks. Each probe owns exactly one section of the
//! report and is run, timeboxed and guarded by the orchestrator.

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

use crate::config::AuditConfig;
use crate::data_models::{ProbeKind, ProbeValue};
use crate::error::ProbeError;
use crate::fetcher::FetchedPage;

pub mod content_quality;
pub mod duplicates;
pub mod files;
pub mod performance;
pub mod structured_data;
pub mod url_consistency;

pub use content_quality::ContentQualityProbe;
pub use duplicates::DuplicateContentProbe;
pub use files::FilesProbe;
pub use performance::PerformanceProbe;
pub use structured_data::StructuredDataProbe;
pub use url_consistency::UrlConsistencyProbe;

/// Read-only input shared by every probe of one audit.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    /// The normalized audit URL.
    pub url: Url,
    /// The primary page, already fetched.
    pub page: FetchedPage,
    pub config: AuditConfig,
}

impl ProbeContext {
    /// `scheme://host[:port]` of the page that was actually served.
    pub fn origin(&self) -> Url {
        let served = Url::parse(&self.page.final_url).unwrap_or_else(|_| self.url.clone());
        let mut origin = served;
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        origin
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    fn kind(&self) -> ProbeKind;

    /// Deadline for one run. Exceeding it yields a `timeout` result.
    fn timeout(&self, config: &AuditConfig) -> Duration {
        config.probe_timeout
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeValue, ProbeError>;
}

/// Body of a 2xx response that looks like the requested file rather than an
/// HTML error page served with a success status.
pub(crate) fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(256).collect::<String>().to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<head")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_uses_served_url() {
        let mut ctx = test_support::context("https://example.com/blog/post?x=1", "<p>hi</p>");
        ctx.page.final_url = "https://www.example.com/blog/post?x=1".to_string();
        assert_eq!(ctx.origin().as_str(), "https://www.example.com/");
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("  <!DOCTYPE html><html>"));
        assert!(looks_like_html("<html lang=en>"));
        assert!(!looks_like_html("User-agent: *\nDisallow:"));
        assert!(!looks_like_html("<?xml version=\"1.0\"?><urlset>"));
    }
}
