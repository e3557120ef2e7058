use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{Probe, ProbeContext};
use crate::config::AuditConfig;
use crate::crawler::{CrawlService, crawl_pages};
use crate::data_models::{ProbeKind, ProbeValue};
use crate::error::ProbeError;
use crate::similarity::DuplicateDetector;

/// Crawls the site and reports page pairs whose content is near-identical or
/// contained in one another.
pub struct DuplicateContentProbe {
    crawler: Arc<dyn CrawlService>,
}

impl DuplicateContentProbe {
    pub fn new(crawler: Arc<dyn CrawlService>) -> Self {
        Self { crawler }
    }
}

#[async_trait]
impl Probe for DuplicateContentProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Duplicates
    }

    /// The crawl poll loop owns `crawl_timeout`; the probe deadline sits on
    /// top of it so the loop can return its partial pages first.
    fn timeout(&self, config: &AuditConfig) -> Duration {
        config.probe_timeout + config.crawl_timeout
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeValue, ProbeError> {
        let pages = crawl_pages(self.crawler.as_ref(), &ctx.page.final_url, &ctx.config).await;
        let detector = DuplicateDetector::from_config(&ctx.config);
        let report = tokio::task::spawn_blocking(move || detector.find_duplicates(&pages))
            .await
            .map_err(|e| ProbeError::Panicked(e.to_string()))?;
        log::info!(
            "{} duplicate pair(s) across {} page(s) for {}",
            report.duplicates_found,
            report.pages_scanned,
            ctx.url
        );
        Ok(ProbeValue::Duplicates(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{CrawlJobId, CrawlStatus};
    use crate::data_models::Page;
    use crate::error::CrawlError;
    use crate::probes::test_support::context;

    struct FixedCrawl(Vec<Page>);

    #[async_trait]
    impl CrawlService for FixedCrawl {
        async fn submit(&self, _url: &str, _limit: usize) -> Result<CrawlJobId, CrawlError> {
            Ok("job".to_string())
        }

        async fn status(&self, _job: &CrawlJobId) -> Result<CrawlStatus, CrawlError> {
            Ok(CrawlStatus::Completed {
                pages: self.0.clone(),
            })
        }
    }

    /// Remembers which URL the crawl was started from.
    #[derive(Default)]
    struct RecordingCrawl(std::sync::Mutex<Option<String>>);

    #[async_trait]
    impl CrawlService for RecordingCrawl {
        async fn submit(&self, url: &str, _limit: usize) -> Result<CrawlJobId, CrawlError> {
            *self.0.lock().unwrap() = Some(url.to_string());
            Ok("job".to_string())
        }

        async fn status(&self, _job: &CrawlJobId) -> Result<CrawlStatus, CrawlError> {
            Ok(CrawlStatus::Completed { pages: Vec::new() })
        }
    }

    struct RejectingCrawl;

    #[async_trait]
    impl CrawlService for RejectingCrawl {
        async fn submit(&self, _url: &str, _limit: usize) -> Result<CrawlJobId, CrawlError> {
            Err(CrawlError::Rejected("quota".into()))
        }

        async fn status(&self, job: &CrawlJobId) -> Result<CrawlStatus, CrawlError> {
            Err(CrawlError::UnknownJob(job.clone()))
        }
    }

    fn words(prefix: &str, n: usize) -> String {
        (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn test_reports_identical_pages() {
        let body = words("w", 200);
        let pages = vec![
            Page::new("https://example.com/a".into(), "A".into(), body.clone()),
            Page::new("https://example.com/b".into(), "B".into(), body),
            Page::new("https://example.com/c".into(), "C".into(), words("z", 200)),
        ];
        let probe = DuplicateContentProbe::new(Arc::new(FixedCrawl(pages)));
        let ctx = context("https://example.com/", "<p>x</p>");
        let ProbeValue::Duplicates(report) = probe.run(&ctx).await.unwrap() else {
            panic!("unexpected value");
        };
        assert_eq!(report.pages_scanned, 3);
        assert_eq!(report.duplicates_found, 1);
        assert_eq!(report.results[0].similarity, 100);
        assert_eq!(report.results[0].url_a, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_rejected_crawl_reports_nothing() {
        let probe = DuplicateContentProbe::new(Arc::new(RejectingCrawl));
        let ctx = context("https://example.com/", "<p>x</p>");
        let value = probe.run(&ctx).await.unwrap();
        assert_eq!(value, ProbeKind::Duplicates.default_value());
    }

    #[tokio::test]
    async fn test_crawl_starts_from_served_url() {
        let crawl = Arc::new(RecordingCrawl::default());
        let probe = DuplicateContentProbe::new(crawl.clone());
        let mut ctx = context("https://example.com/", "<p>x</p>");
        ctx.page.final_url = "https://www.example.com/".to_string();
        probe.run(&ctx).await.unwrap();
        assert_eq!(
            crawl.0.lock().unwrap().as_deref(),
            Some("https://www.example.com/")
        );
    }

    #[test]
    fn test_timeout_includes_crawl_budget() {
        let probe = DuplicateContentProbe::new(Arc::new(RejectingCrawl));
        let config = AuditConfig::default();
        assert_eq!(
            probe.timeout(&config),
            config.probe_timeout + config.crawl_timeout
        );
    }
}
