use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::analyzer::HTMLTagFilter;
use crate::config::Settings;
use crate::data_models::Page;
use crate::error::FetchError;

/// A fetched and parsed HTML page.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// The URL that was requested.
    pub url: String,
    /// Where the request ended up after redirects.
    pub final_url: String,
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: BTreeMap<String, String>,
    pub html: String,
    pub text: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical: Option<String>,
    pub headings: Vec<String>,
    pub h1_count: usize,
    /// Absolute http(s) links found on the page, fragment stripped.
    pub links: Vec<String>,
    pub word_count: usize,
}

impl FetchedPage {
    /// Parses `html` and fills every derived field.
    pub fn from_html(
        url: &str,
        final_url: &str,
        status: u16,
        headers: BTreeMap<String, String>,
        html: String,
    ) -> FetchedPage {
        let extracted = HTMLTagFilter::extract(&html);
        let (meta_description, canonical, links, head_title) = parse_head_and_links(final_url, &html);

        let title = if extracted.title.trim().is_empty() {
            head_title
        } else {
            Some(extracted.title.trim().to_string())
        };
        let word_count = extracted.body.split_whitespace().count();

        FetchedPage {
            url: url.to_string(),
            final_url: final_url.to_string(),
            status,
            headers,
            text: extracted.body,
            title,
            meta_description,
            canonical,
            headings: extracted.headings,
            h1_count: extracted.h1_count,
            links,
            word_count,
            html,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn to_page(&self) -> Page {
        Page::new(
            self.final_url.clone(),
            self.title.clone().unwrap_or_default(),
            self.text.clone(),
        )
    }
}

fn parse_head_and_links(
    base_url: &str,
    html: &str,
) -> (Option<String>, Option<String>, Vec<String>, Option<String>) {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    let meta_description = Selector::parse(r#"meta[name="description"]"#)
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(|c| c.trim().to_string())
        })
        .filter(|c| !c.is_empty());

    let canonical = Selector::parse(r#"link[rel="canonical"]"#)
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("href"))
                .map(|href| match &base {
                    Some(base) => base
                        .join(href)
                        .map(|u| u.to_string())
                        .unwrap_or_else(|_| href.to_string()),
                    None => href.to_string(),
                })
        });

    let title = Selector::parse("title").ok().and_then(|sel| {
        document
            .select(&sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let mut links = Vec::new();
    if let (Some(base), Ok(href_selector)) = (&base, Selector::parse("a[href]")) {
        let mut seen = HashSet::new();
        for element in document.select(&href_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Ok(mut resolved) = base.join(href) {
                    if resolved.scheme() == "http" || resolved.scheme() == "https" {
                        resolved.set_fragment(None);
                        let s = resolved.to_string();
                        if seen.insert(s.clone()) {
                            links.push(s);
                        }
                    }
                }
            }
        }
    }

    (meta_description, canonical, links, title)
}

/// Resolves a URL to page content. Implementations decide their own retry
/// policy; callers never retry.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

pub fn build_http_client(settings: &Settings) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(&settings.user_agent)
        .timeout(settings.request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let res = self.client.get(parsed).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = res.url().to_string();
        let headers = res
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect::<BTreeMap<String, String>>();
        let body = res.text().await?;

        log::debug!("fetched {url} ({} bytes, final url {final_url})", body.len());
        Ok(FetchedPage::from_html(
            url,
            &final_url,
            status.as_u16(),
            headers,
            body,
        ))
    }
}
