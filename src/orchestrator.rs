use chrono::Utc;
use futures::FutureExt;
use reqwest::Url;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;

use crate::combinators::settle_all;
use crate::config::{AuditConfig, Settings};
use crate::crawler::{CrawlService, LocalCrawler, RemoteCrawlService};
use crate::data_models::{ProbeKind, ProbeResult, ProbeValue};
use crate::error::{AuditError, ProbeError};
use crate::fetcher::{HttpPageFetcher, PageFetcher, build_http_client};
use crate::llm::{OpenAiTextAnalysis, TextAnalysisClient};
use crate::probes::{
    ContentQualityProbe, DuplicateContentProbe, FilesProbe, PerformanceProbe, Probe, ProbeContext,
    StructuredDataProbe, UrlConsistencyProbe,
};
use crate::report::{AuditReport, ReportAssembler};

/// Link depth explored by the in-process crawler.
const LOCAL_CRAWL_DEPTH: usize = 3;
const LOCAL_CRAWL_CONCURRENCY: usize = 4;

/// Adds `https://` to scheme-less input and rejects anything that is not an
/// absolute http(s) URL with a host.
pub fn normalize_url(input: &str) -> Result<Url, AuditError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AuditError::InvalidUrl(input.to_string()));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|_| AuditError::InvalidUrl(input.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(AuditError::InvalidUrl(input.to_string()));
    }
    Ok(url)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs one probe under its deadline. Errors, panics, elapsed deadlines and
/// values of the wrong kind all come back as `Err`.
async fn run_guarded(probe: &dyn Probe, ctx: &ProbeContext) -> Result<ProbeValue, ProbeError> {
    let kind = probe.kind();
    let limit = probe.timeout(&ctx.config);

    let guarded = AssertUnwindSafe(probe.run(ctx)).catch_unwind();
    let value = match tokio::time::timeout(limit, guarded).await {
        Err(_) => return Err(ProbeError::Timeout(limit)),
        Ok(Err(payload)) => return Err(ProbeError::Panicked(panic_message(payload))),
        Ok(Ok(result)) => result?,
    };

    if value.kind() != kind {
        return Err(ProbeError::WrongKind {
            expected: kind.as_str(),
            got: value.kind().as_str(),
        });
    }
    Ok(value)
}

fn to_probe_result(kind: ProbeKind, outcome: Result<ProbeValue, ProbeError>) -> ProbeResult {
    match outcome {
        Ok(value) => {
            log::debug!("probe {} ok", kind.as_str());
            ProbeResult::ok(value)
        }
        Err(e @ ProbeError::Timeout(_)) => {
            log::warn!("probe {} timed out: {e}", kind.as_str());
            ProbeResult::timeout(kind, e.to_string())
        }
        Err(e) => {
            log::warn!("probe {} failed: {e}", kind.as_str());
            ProbeResult::failed(kind, e.to_string())
        }
    }
}

/// Fetches the primary page, fans out to every probe and assembles the
/// report. Only the primary fetch can fail an audit.
pub struct AuditOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    probes: Vec<Arc<dyn Probe>>,
}

impl AuditOrchestrator {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            probes: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Standard wiring: HTTP fetcher, every probe, the remote crawl API when
    /// one is configured and the in-process crawler otherwise.
    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = build_http_client(settings)?;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(client.clone()));

        let crawler: Arc<dyn CrawlService> = match &settings.crawl_api_url {
            Some(base_url) => Arc::new(RemoteCrawlService::new(
                client.clone(),
                base_url,
                settings.crawl_api_key.clone(),
            )),
            None => Arc::new(LocalCrawler::new(
                fetcher.clone(),
                LOCAL_CRAWL_DEPTH,
                LOCAL_CRAWL_CONCURRENCY,
            )),
        };
        let analysis = settings.llm_api_key.as_deref().map(|key| {
            Arc::new(OpenAiTextAnalysis::new(
                client.clone(),
                &settings.llm_api_url,
                key,
                &settings.llm_model,
            )) as Arc<dyn TextAnalysisClient>
        });
        if analysis.is_none() {
            log::info!("no LLM_API_KEY set, content quality uses local heuristics");
        }

        Ok(Self::new(fetcher.clone())
            .with_probe(Arc::new(PerformanceProbe::new(
                client.clone(),
                &settings.pagespeed_api_url,
                settings.pagespeed_api_key.clone(),
            )))
            .with_probe(Arc::new(FilesProbe::new(client.clone())))
            .with_probe(Arc::new(StructuredDataProbe::new()))
            .with_probe(Arc::new(UrlConsistencyProbe::new(client)))
            .with_probe(Arc::new(ContentQualityProbe::new(analysis)))
            .with_probe(Arc::new(DuplicateContentProbe::new(crawler))))
    }

    pub fn probe_kinds(&self) -> Vec<ProbeKind> {
        self.probes.iter().map(|p| p.kind()).collect()
    }

    pub async fn run_audit(&self, url: &str, config: &AuditConfig) -> Result<AuditReport, AuditError> {
        let url = normalize_url(url)?;
        let span = tracing::info_span!("audit", url = %url);
        self.audit(url, config).instrument(span).await
    }

    async fn audit(&self, url: Url, config: &AuditConfig) -> Result<AuditReport, AuditError> {
        log::info!("starting audit of {url} with {} probes", self.probes.len());

        let page = self
            .fetcher
            .fetch(url.as_str())
            .await
            .map_err(|source| AuditError::FatalFetch {
                url: url.to_string(),
                source,
            })?;
        log::info!(
            "fetched primary page {} ({} words)",
            page.final_url,
            page.word_count
        );

        let ctx = ProbeContext {
            url: url.clone(),
            page,
            config: config.clone(),
        };
        let outcomes = settle_all(self.probes.iter().map(|probe| {
            let span = tracing::info_span!("probe", kind = probe.kind().as_str());
            run_guarded(probe.as_ref(), &ctx).instrument(span)
        }))
        .await;

        let results: Vec<ProbeResult> = self
            .probes
            .iter()
            .zip(outcomes)
            .map(|(probe, outcome)| to_probe_result(probe.kind(), outcome))
            .collect();

        let report = ReportAssembler::assemble(url.as_str(), &ctx.page, &results, Utc::now());
        log::info!(
            "audit of {url} finished: {}/{} probes ok, {} duplicate pair(s)",
            report.summary.probes_succeeded,
            report.summary.probes_run,
            report.duplicates.duplicates_found
        );
        Ok(report)
    }
}
