use async_trait::async_trait;
use serde_json::Value;

use super::{Probe, ProbeContext};
use crate::data_models::{PerformanceMetrics, ProbeKind, ProbeValue};
use crate::error::ProbeError;

/// Looks up lab performance metrics from the PageSpeed Insights API.
pub struct PerformanceProbe {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl PerformanceProbe {
    pub fn new(client: reqwest::Client, api_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl Probe for PerformanceProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Performance
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeValue, ProbeError> {
        let mut query = vec![
            ("url", ctx.url.to_string()),
            ("strategy", "mobile".to_string()),
            ("category", "performance".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        let res = self.client.get(&self.api_url).query(&query).send().await?;
        if !res.status().is_success() {
            return Err(ProbeError::Status(res.status().as_u16()));
        }
        let body: Value = res.json().await?;
        parse_pagespeed(&body).map(ProbeValue::Performance)
    }
}

fn audit_value(audits: &Value, id: &str) -> Option<f64> {
    audits.get(id)?.get("numericValue")?.as_f64()
}

pub fn parse_pagespeed(body: &Value) -> Result<PerformanceMetrics, ProbeError> {
    let lighthouse = body
        .get("lighthouseResult")
        .ok_or_else(|| ProbeError::Unusable("response has no lighthouseResult".to_string()))?;

    let score = lighthouse
        .pointer("/categories/performance/score")
        .and_then(Value::as_f64)
        .map(|s| (s * 100.0).round().clamp(0.0, 100.0) as u8);

    let audits = lighthouse.get("audits").cloned().unwrap_or(Value::Null);
    Ok(PerformanceMetrics {
        score,
        first_contentful_paint_ms: audit_value(&audits, "first-contentful-paint"),
        largest_contentful_paint_ms: audit_value(&audits, "largest-contentful-paint"),
        total_blocking_time_ms: audit_value(&audits, "total-blocking-time"),
        cumulative_layout_shift: audit_value(&audits, "cumulative-layout-shift"),
        speed_index_ms: audit_value(&audits, "speed-index"),
    })
}
