use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::BTreeSet;

use super::{Probe, ProbeContext};
use crate::data_models::{ProbeKind, ProbeValue, StructuredData};
use crate::error::ProbeError;

/// Inspects the primary page markup for schema.org and social metadata.
/// Pure; works from the already fetched HTML.
#[derive(Default)]
pub struct StructuredDataProbe;

impl StructuredDataProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Probe for StructuredDataProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::StructuredData
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeValue, ProbeError> {
        Ok(ProbeValue::StructuredData(extract_structured_data(
            &ctx.page.html,
        )?))
    }
}

fn selector(css: &str) -> Result<Selector, ProbeError> {
    Selector::parse(css).map_err(|e| ProbeError::Unusable(format!("bad selector {css}: {e}")))
}

/// Collects `@type` values from a JSON-LD node, descending into arrays and
/// `@graph` containers.
fn collect_types(node: &Value, types: &mut BTreeSet<String>) {
    match node {
        Value::Array(items) => items.iter().for_each(|item| collect_types(item, types)),
        Value::Object(map) => {
            match map.get("@type") {
                Some(Value::String(t)) => {
                    types.insert(t.clone());
                }
                Some(Value::Array(ts)) => {
                    types.extend(ts.iter().filter_map(Value::as_str).map(str::to_string));
                }
                _ => {}
            }
            if let Some(graph) = map.get("@graph") {
                collect_types(graph, types);
            }
        }
        _ => {}
    }
}

/// Last path segment of a microdata `itemtype` URL, e.g. `Product` for
/// `https://schema.org/Product`.
fn microdata_type(itemtype: &str) -> Option<String> {
    itemtype
        .split_whitespace()
        .next()
        .map(|t| t.trim_end_matches('/'))
        .and_then(|t| t.rsplit('/').next())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn extract_structured_data(html: &str) -> Result<StructuredData, ProbeError> {
    let document = Html::parse_document(html);
    let json_ld = selector(r#"script[type="application/ld+json"]"#)?;
    let itemtype = selector("[itemtype]")?;
    let og = selector(r#"meta[property^="og:"]"#)?;
    let twitter = selector(r#"meta[name^="twitter:"], meta[property^="twitter:"]"#)?;

    let mut data = StructuredData::default();
    let mut schema_types = BTreeSet::new();
    for script in document.select(&json_ld) {
        data.json_ld_blocks += 1;
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => collect_types(&value, &mut schema_types),
            Err(e) => {
                log::debug!("invalid JSON-LD block: {e}");
                data.invalid_json_ld_blocks += 1;
            }
        }
    }
    data.schema_types = schema_types.into_iter().collect();

    let microdata: BTreeSet<String> = document
        .select(&itemtype)
        .filter_map(|el| el.value().attr("itemtype"))
        .filter_map(microdata_type)
        .collect();
    data.microdata_types = microdata.into_iter().collect();

    data.has_open_graph = document.select(&og).next().is_some();
    data.has_twitter_card = document.select(&twitter).next().is_some();
    Ok(data)
}
