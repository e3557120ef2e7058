use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a [`crate::fetcher::PageFetcher`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch timed out")]
    Timeout,
}

/// A single probe failed. Never escapes the orchestrator; it is turned into a
/// failed `ProbeResult` at the probe boundary.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("unusable response: {0}")]
    Unusable(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe panicked: {0}")]
    Panicked(String),
    #[error("probe returned a {got} value, expected {expected}")]
    WrongKind {
        expected: &'static str,
        got: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("crawl api returned status {0}")]
    Status(u16),
    #[error("unknown crawl job {0}")]
    UnknownJob(String),
    #[error("crawl api rejected the job: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("text analysis service returned status {0}")]
    Status(u16),
    #[error("text analysis service returned no content")]
    Empty,
}

/// Terminal states of [`crate::combinators::poll_bounded`]. Both variants
/// carry the most recent partial value reported by the polled operation.
#[derive(Debug, Error)]
pub enum PollError<T, E> {
    #[error("polling timed out after {elapsed:?} ({attempts} attempts)")]
    TimedOut {
        elapsed: Duration,
        attempts: u32,
        partial: Option<T>,
    },
    #[error("gave up after {consecutive} consecutive errors: {last_error}")]
    TooManyErrors {
        consecutive: u32,
        last_error: E,
        partial: Option<T>,
    },
}

impl<T, E> PollError<T, E> {
    pub fn into_partial(self) -> Option<T> {
        match self {
            PollError::TimedOut { partial, .. } => partial,
            PollError::TooManyErrors { partial, .. } => partial,
        }
    }
}

/// The only errors `run_audit` can return.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("invalid audit url: {0}")]
    InvalidUrl(String),
    #[error("failed to fetch primary page {url}: {source}")]
    FatalFetch {
        url: String,
        #[source]
        source: FetchError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{key} must be a fraction between 0 and 1, got {value:?}")]
    OutOfRange { key: &'static str, value: String },
}
