use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Url;
use std::collections::HashSet;
use std::net::IpAddr;

use super::{Probe, ProbeContext};
use crate::data_models::{ProbeKind, ProbeValue, UrlConsistency, UrlVariant};
use crate::error::ProbeError;

/// Requests every scheme and `www` variant of the site root and checks that
/// they all settle on one https host.
pub struct UrlConsistencyProbe {
    client: reqwest::Client,
}

impl UrlConsistencyProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn resolve(&self, url: String) -> UrlVariant {
        match self.client.get(&url).send().await {
            Ok(res) => UrlVariant {
                final_url: Some(res.url().to_string()),
                status: Some(res.status().as_u16()),
                url,
            },
            Err(e) => {
                log::debug!("url variant {url} unreachable: {e}");
                UrlVariant {
                    url,
                    final_url: None,
                    status: None,
                }
            }
        }
    }
}

/// `http/https × apex/www` roots for the host of `url`. IP addresses and
/// single-label hosts only get the scheme variants.
pub fn url_variants(url: &Url) -> Vec<String> {
    let Some(host) = url.host_str() else {
        return Vec::new();
    };
    let apex = host.strip_prefix("www.").unwrap_or(host);
    let mut hosts = vec![apex.to_string()];
    let is_domain = apex.parse::<IpAddr>().is_err() && apex.contains('.');
    if is_domain {
        hosts.push(format!("www.{apex}"));
    }

    let mut variants = Vec::new();
    for scheme in ["http", "https"] {
        for host in &hosts {
            let mut variant = url.clone();
            variant.set_path("/");
            variant.set_query(None);
            variant.set_fragment(None);
            if variant.set_scheme(scheme).is_err() || variant.set_host(Some(host)).is_err() {
                continue;
            }
            variants.push(variant.to_string());
        }
    }
    variants
}

fn same_page(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme()
                && a.host_str() == b.host_str()
                && a.port_or_known_default() == b.port_or_known_default()
                && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
                && a.query() == b.query()
        }
        _ => a == b,
    }
}

/// Derives the consistency flags from the resolved variants. Fails when no
/// variant could be reached at all.
pub fn evaluate(
    variants: Vec<UrlVariant>,
    canonical: Option<&str>,
    served_url: &str,
) -> Result<UrlConsistency, ProbeError> {
    let finals: Vec<Url> = variants
        .iter()
        .filter_map(|v| v.final_url.as_deref())
        .filter_map(|u| Url::parse(u).ok())
        .collect();
    if finals.is_empty() {
        return Err(ProbeError::Unusable(
            "no url variant could be reached".to_string(),
        ));
    }

    let redirects_to_https = finals.iter().all(|u| u.scheme() == "https");
    let hosts: HashSet<&str> = finals.iter().filter_map(|u| u.host_str()).collect();

    Ok(UrlConsistency {
        redirects_to_https: Some(redirects_to_https),
        consistent_host: Some(hosts.len() == 1),
        canonical_url: canonical.map(str::to_string),
        canonical_matches: canonical.map(|c| same_page(c, served_url)),
        variants,
    })
}

#[async_trait]
impl Probe for UrlConsistencyProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::UrlConsistency
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeValue, ProbeError> {
        let variants = join_all(url_variants(&ctx.url).into_iter().map(|v| self.resolve(v))).await;
        evaluate(
            variants,
            ctx.page.canonical.as_deref(),
            &ctx.page.final_url,
        )
        .map(ProbeValue::UrlConsistency)
    }
}
