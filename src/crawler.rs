use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use nanoid::nanoid;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::combinators::{PollPolicy, PollStatus, poll_bounded};
use crate::config::AuditConfig;
use crate::data_models::Page;
use crate::error::CrawlError;
use crate::fetcher::PageFetcher;

pub type CrawlJobId = String;

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlStatus {
    Running { pages: Vec<Page> },
    Completed { pages: Vec<Page> },
    Failed { reason: String, pages: Vec<Page> },
}

/// Multi-page crawl collaborator: a job is submitted once and then polled.
#[async_trait]
pub trait CrawlService: Send + Sync {
    async fn submit(&self, url: &str, page_limit: usize) -> Result<CrawlJobId, CrawlError>;
    async fn status(&self, job: &CrawlJobId) -> Result<CrawlStatus, CrawlError>;

    /// Stops a job nobody is waiting on any more. Best effort.
    async fn cancel(&self, _job: &CrawlJobId) -> Result<(), CrawlError> {
        Ok(())
    }
}

/// Submits a crawl and polls it under the configured interval, deadline and
/// error budget. Never fails: whatever pages were seen last are returned,
/// possibly none.
pub async fn crawl_pages(service: &dyn CrawlService, url: &str, config: &AuditConfig) -> Vec<Page> {
    let job_id = match service.submit(url, config.crawl_page_limit).await {
        Ok(id) => id,
        Err(e) => {
            log::warn!("could not submit crawl for {url}: {e}");
            return Vec::new();
        }
    };
    log::info!("crawl job {job_id} submitted for {url}");

    let policy = PollPolicy::new(
        config.crawl_poll_interval,
        config.crawl_timeout,
        config.crawl_max_consecutive_errors,
    );
    let job = &job_id;
    let result = poll_bounded(policy, move || async move {
        let status = service.status(job).await?;
        Ok::<_, CrawlError>(match status {
            CrawlStatus::Running { pages } => PollStatus::Pending(Some(pages)),
            CrawlStatus::Completed { pages } => PollStatus::Ready(pages),
            CrawlStatus::Failed { reason, pages } => {
                log::warn!("crawl job {job} failed: {reason}");
                PollStatus::Ready(pages)
            }
        })
    })
    .await;

    match result {
        Ok(pages) => {
            log::info!("crawl job {job_id} finished with {} pages", pages.len());
            pages
        }
        Err(e) => {
            log::warn!("crawl job {job_id} abandoned: {e}");
            if let Err(cancel_err) = service.cancel(&job_id).await {
                log::debug!("could not cancel crawl job {job_id}: {cancel_err}");
            }
            e.into_partial().unwrap_or_default()
        }
    }
}

// =============================================================================
// In-process crawler
// =============================================================================

#[derive(Debug, Default)]
struct JobState {
    pages: Vec<Page>,
    done: bool,
    error: Option<String>,
    task: Option<JoinHandle<()>>,
}

/// Breadth-first, same-host crawler running inside the process. Each
/// submitted job runs on its own task; `status` reads the shared job table.
/// A job leaves the table once `status` has reported it finished, or when
/// it is cancelled.
pub struct LocalCrawler {
    fetcher: Arc<dyn PageFetcher>,
    max_depth: usize,
    concurrency: usize,
    jobs: Arc<DashMap<CrawlJobId, JobState>>,
}

impl LocalCrawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_depth: usize, concurrency: usize) -> LocalCrawler {
        LocalCrawler {
            fetcher,
            max_depth,
            concurrency: concurrency.max(1),
            jobs: Arc::new(DashMap::new()),
        }
    }

    async fn crawl(
        fetcher: Arc<dyn PageFetcher>,
        jobs: Arc<DashMap<CrawlJobId, JobState>>,
        job_id: CrawlJobId,
        seed: Url,
        page_limit: usize,
        max_depth: usize,
        concurrency: usize,
    ) {
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier = vec![seed.to_string()];
        // Follows the seed through redirects: links on the landing page are
        // resolved against where it was actually served from.
        let mut host = seed.host_str().map(str::to_string);
        let mut collected = 0usize;
        let mut last_error: Option<String> = None;

        for depth in 0..=max_depth {
            let remaining = page_limit.saturating_sub(collected);
            if frontier.is_empty() || remaining == 0 {
                break;
            }
            let batch: Vec<String> = frontier
                .drain(..)
                .filter(|url| visited.insert(url.clone()))
                .take(remaining)
                .collect();
            log::debug!("crawl job {job_id}: depth {depth}, {} urls", batch.len());

            let fetched = futures::stream::iter(batch)
                .map(|url| {
                    let fetcher = fetcher.clone();
                    async move {
                        let res = fetcher.fetch(&url).await;
                        (url, res)
                    }
                })
                .buffer_unordered(concurrency)
                .collect::<Vec<_>>()
                .await;

            let mut next = HashSet::new();
            for (url, res) in fetched {
                match res {
                    Ok(page) => {
                        if depth == 0 {
                            if let Some(served) = Url::parse(&page.final_url)
                                .ok()
                                .and_then(|u| u.host_str().map(str::to_string))
                            {
                                host = Some(served);
                            }
                            visited.insert(page.final_url.clone());
                        }
                        for link in &page.links {
                            if same_host(host.as_deref(), link) && !visited.contains(link) {
                                next.insert(link.clone());
                            }
                        }
                        collected += 1;
                        if let Some(mut state) = jobs.get_mut(&job_id) {
                            state.pages.push(page.to_page());
                        }
                    }
                    Err(e) => {
                        log::debug!("crawl job {job_id}: error fetching {url}: {e}");
                        last_error = Some(format!("{url}: {e}"));
                    }
                }
            }
            let mut next: Vec<String> = next.into_iter().collect();
            next.sort();
            frontier = next;
        }

        if let Some(mut state) = jobs.get_mut(&job_id) {
            state.done = true;
            if state.pages.is_empty() {
                state.error = last_error.or_else(|| Some("no pages could be fetched".to_string()));
            }
        }
        log::info!("crawl job {job_id} done: {collected} pages");
    }
}

fn same_host(host: Option<&str>, link: &str) -> bool {
    match Url::parse(link) {
        Ok(url) => host.is_some() && url.host_str() == host,
        Err(_) => false,
    }
}

#[async_trait]
impl CrawlService for LocalCrawler {
    async fn submit(&self, url: &str, page_limit: usize) -> Result<CrawlJobId, CrawlError> {
        let seed = Url::parse(url).map_err(|e| CrawlError::Rejected(format!("{url}: {e}")))?;
        let job_id: CrawlJobId = nanoid!(10);
        self.jobs.insert(job_id.clone(), JobState::default());

        let task = tokio::spawn(Self::crawl(
            self.fetcher.clone(),
            self.jobs.clone(),
            job_id.clone(),
            seed,
            page_limit,
            self.max_depth,
            self.concurrency,
        ));
        if let Some(mut state) = self.jobs.get_mut(&job_id) {
            state.task = Some(task);
        }
        Ok(job_id)
    }

    async fn status(&self, job: &CrawlJobId) -> Result<CrawlStatus, CrawlError> {
        let status = {
            let state = self
                .jobs
                .get(job)
                .ok_or_else(|| CrawlError::UnknownJob(job.clone()))?;
            if !state.done {
                return Ok(CrawlStatus::Running {
                    pages: state.pages.clone(),
                });
            }
            state.error.clone()
        };
        let pages = self
            .jobs
            .remove(job)
            .map(|(_, state)| state.pages)
            .unwrap_or_default();
        Ok(match status {
            None => CrawlStatus::Completed { pages },
            Some(reason) => CrawlStatus::Failed { reason, pages },
        })
    }

    async fn cancel(&self, job: &CrawlJobId) -> Result<(), CrawlError> {
        if let Some((_, state)) = self.jobs.remove(job) {
            if let Some(task) = state.task {
                task.abort();
            }
            log::debug!("crawl job {job} cancelled");
        }
        Ok(())
    }
}

// =============================================================================
// Remote crawl API
// =============================================================================

/// Client for a hosted crawl API (`POST /v1/crawl`, `GET /v1/crawl/{id}`).
pub struct RemoteCrawlService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    data: Vec<RemotePage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemotePage {
    markdown: Option<String>,
    text: Option<String>,
    #[serde(default)]
    metadata: RemoteMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteMetadata {
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
    url: Option<String>,
    title: Option<String>,
}

impl RemotePage {
    fn into_page(self) -> Option<Page> {
        let url = self.metadata.source_url.or(self.metadata.url)?;
        let text = self.text.or(self.markdown).unwrap_or_default();
        Some(Page::new(url, self.metadata.title.unwrap_or_default(), text))
    }
}

impl RemoteCrawlService {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

#[async_trait]
impl CrawlService for RemoteCrawlService {
    async fn submit(&self, url: &str, page_limit: usize) -> Result<CrawlJobId, CrawlError> {
        let req = self.client.post(format!("{}/v1/crawl", self.base_url)).json(&json!({
            "url": url,
            "limit": page_limit,
            "scrapeOptions": { "formats": ["markdown"], "onlyMainContent": true },
        }));
        let res = self.authorize(req).send().await?;
        if !res.status().is_success() {
            return Err(CrawlError::Status(res.status().as_u16()));
        }
        let body: SubmitResponse = res.json().await?;
        match body.id {
            Some(id) if body.success || body.error.is_none() => Ok(id),
            _ => Err(CrawlError::Rejected(
                body.error.unwrap_or_else(|| "no job id returned".to_string()),
            )),
        }
    }

    async fn status(&self, job: &CrawlJobId) -> Result<CrawlStatus, CrawlError> {
        let req = self.client.get(format!("{}/v1/crawl/{}", self.base_url, job));
        let res = self.authorize(req).send().await?;
        if !res.status().is_success() {
            return Err(CrawlError::Status(res.status().as_u16()));
        }
        let body: StatusResponse = res.json().await?;
        let pages = body
            .data
            .into_iter()
            .filter_map(RemotePage::into_page)
            .collect();
        Ok(match body.status.as_str() {
            "completed" => CrawlStatus::Completed { pages },
            "failed" | "cancelled" => CrawlStatus::Failed {
                reason: body.error.unwrap_or_else(|| body.status.clone()),
                pages,
            },
            _ => CrawlStatus::Running { pages },
        })
    }

    async fn cancel(&self, job: &CrawlJobId) -> Result<(), CrawlError> {
        let req = self.client.delete(format!("{}/v1/crawl/{}", self.base_url, job));
        let res = self.authorize(req).send().await?;
        if !res.status().is_success() {
            return Err(CrawlError::Status(res.status().as_u16()));
        }
        Ok(())
    }
}
