use async_trait::async_trait;
use reqwest::Url;

use super::{Probe, ProbeContext, looks_like_html};
use crate::data_models::{FileChecks, ProbeKind, ProbeValue};
use crate::error::ProbeError;

const ROBOTS_PATH: &str = "/robots.txt";
const SITEMAP_PATH: &str = "/sitemap.xml";
const LLMS_PATH: &str = "/llms.txt";

/// Checks for the well-known crawler files at the site origin.
pub struct FilesProbe {
    client: reqwest::Client,
}

impl FilesProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Body of `path` under `origin` if it exists. Network errors, non-2xx
    /// responses, empty bodies and HTML error pages all count as absent.
    async fn fetch_file(&self, origin: &Url, path: &str) -> Option<String> {
        let url = origin.join(path).ok()?;
        let res = match self.client.get(url.clone()).send().await {
            Ok(res) => res,
            Err(e) => {
                log::debug!("file check {url} failed: {e}");
                return None;
            }
        };
        if !res.status().is_success() {
            return None;
        }
        let body = res.text().await.ok()?;
        if body.trim().is_empty() || looks_like_html(&body) {
            return None;
        }
        Some(body)
    }
}

/// True if any `Sitemap:` directive appears in a robots.txt body.
pub fn robots_declares_sitemap(robots: &str) -> bool {
    robots.lines().any(|line| {
        let line = line.trim();
        match (line.get(..8), line.get(8..)) {
            (Some(key), Some(rest)) => {
                key.eq_ignore_ascii_case("sitemap:") && !rest.trim().is_empty()
            }
            _ => false,
        }
    })
}

#[async_trait]
impl Probe for FilesProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Files
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeValue, ProbeError> {
        let origin = ctx.origin();
        let (robots, sitemap, llms) = tokio::join!(
            self.fetch_file(&origin, ROBOTS_PATH),
            self.fetch_file(&origin, SITEMAP_PATH),
            self.fetch_file(&origin, LLMS_PATH),
        );

        Ok(ProbeValue::Files(FileChecks {
            sitemap_in_robots: robots.as_deref().is_some_and(robots_declares_sitemap),
            robots_txt: robots.is_some(),
            sitemap_xml: sitemap.is_some(),
            llms_txt: llms.is_some(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::test_support::context;

    #[test]
    fn test_robots_declares_sitemap() {
        assert!(robots_declares_sitemap(
            "User-agent: *\nDisallow:\nSitemap: https://example.com/sitemap.xml\n"
        ));
        assert!(robots_declares_sitemap("SITEMAP: /s.xml"));
        assert!(!robots_declares_sitemap("User-agent: *\n# Sitemap: later\n"));
        assert!(!robots_declares_sitemap("Sitemap:   "));
    }

    #[tokio::test]
    async fn test_files_probe() {
        let mut server = mockito::Server::new_async().await;
        let _robots = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body("User-agent: *\nSitemap: /sitemap.xml\n")
            .create_async()
            .await;
        // Soft 404: success status with an HTML page
        let _sitemap = server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body("<!DOCTYPE html><html><body>Not found</body></html>")
            .create_async()
            .await;
        let _llms = server
            .mock("GET", "/llms.txt")
            .with_status(404)
            .create_async()
            .await;

        let probe = FilesProbe::new(reqwest::Client::new());
        let ctx = context(&format!("{}/some/page", server.url()), "<p>x</p>");
        let value = probe.run(&ctx).await.unwrap();
        assert_eq!(
            value,
            ProbeValue::Files(FileChecks {
                robots_txt: true,
                sitemap_xml: false,
                llms_txt: false,
                sitemap_in_robots: true,
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_origin_reports_absent() {
        let probe = FilesProbe::new(reqwest::Client::new());
        let ctx = context("http://127.0.0.1:1/", "<p>x</p>");
        let value = probe.run(&ctx).await.unwrap();
        assert_eq!(value, ProbeValue::Files(FileChecks::default()));
    }
}
