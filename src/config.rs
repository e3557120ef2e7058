use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_USER_AGENT: &str = "siteaudit/0.1";
pub const DEFAULT_PAGESPEED_API_URL: &str =
    "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";
pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Tunables for a single audit run. Threaded into `run_audit` and read by
/// every probe through its `ProbeContext`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditConfig {
    #[serde(with = "millis")]
    pub probe_timeout: Duration,
    pub min_words: usize,
    pub min_shingles: usize,
    pub min_size_ratio: f64,
    pub duplicate_threshold: f64,
    pub shingle_size: usize,
    pub crawl_page_limit: usize,
    #[serde(with = "millis")]
    pub crawl_poll_interval: Duration,
    #[serde(with = "millis")]
    pub crawl_timeout: Duration,
    pub crawl_max_consecutive_errors: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(15),
            min_words: 50,
            min_shingles: 10,
            min_size_ratio: 0.6,
            duplicate_threshold: 0.85,
            shingle_size: 3,
            crawl_page_limit: 25,
            crawl_poll_interval: Duration::from_secs(2),
            crawl_timeout: Duration::from_secs(60),
            crawl_max_consecutive_errors: 3,
        }
    }
}

/// Everything read from the environment: audit tunables plus the endpoints
/// and credentials of the external collaborators.
#[derive(Debug, Clone)]
pub struct Settings {
    pub audit: AuditConfig,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub pagespeed_api_url: String,
    pub pagespeed_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub crawl_api_url: Option<String>,
    pub crawl_api_key: Option<String>,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            audit: AuditConfig::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(20),
            pagespeed_api_url: DEFAULT_PAGESPEED_API_URL.to_string(),
            pagespeed_api_key: None,
            llm_api_url: DEFAULT_LLM_API_URL.to_string(),
            llm_api_key: None,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            crawl_api_url: None,
            crawl_api_key: None,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Settings, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Unset keys keep their
    /// defaults; malformed numbers are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let d = &defaults.audit;
        let audit = AuditConfig {
            probe_timeout: get_millis(&lookup, "AUDIT_PROBE_TIMEOUT_MS", d.probe_timeout)?,
            min_words: get_parsed(&lookup, "AUDIT_MIN_WORDS", d.min_words)?,
            min_shingles: get_parsed(&lookup, "AUDIT_MIN_SHINGLES", d.min_shingles)?,
            min_size_ratio: get_fraction(&lookup, "AUDIT_MIN_SIZE_RATIO", d.min_size_ratio)?,
            duplicate_threshold: get_fraction(
                &lookup,
                "AUDIT_DUPLICATE_THRESHOLD",
                d.duplicate_threshold,
            )?,
            shingle_size: get_parsed(&lookup, "AUDIT_SHINGLE_SIZE", d.shingle_size)?,
            crawl_page_limit: get_parsed(&lookup, "AUDIT_CRAWL_PAGE_LIMIT", d.crawl_page_limit)?,
            crawl_poll_interval: get_millis(
                &lookup,
                "AUDIT_CRAWL_POLL_INTERVAL_MS",
                d.crawl_poll_interval,
            )?,
            crawl_timeout: get_millis(&lookup, "AUDIT_CRAWL_TIMEOUT_MS", d.crawl_timeout)?,
            crawl_max_consecutive_errors: get_parsed(
                &lookup,
                "AUDIT_CRAWL_MAX_ERRORS",
                d.crawl_max_consecutive_errors,
            )?,
        };

        Ok(Settings {
            audit,
            user_agent: get_or_default(&lookup, "AUDIT_USER_AGENT", &defaults.user_agent),
            request_timeout: get_millis(
                &lookup,
                "AUDIT_REQUEST_TIMEOUT_MS",
                defaults.request_timeout,
            )?,
            pagespeed_api_url: get_or_default(
                &lookup,
                "PAGESPEED_API_URL",
                &defaults.pagespeed_api_url,
            ),
            pagespeed_api_key: get_optional(&lookup, "PAGESPEED_API_KEY"),
            llm_api_url: get_or_default(&lookup, "LLM_API_URL", &defaults.llm_api_url),
            llm_api_key: get_optional(&lookup, "LLM_API_KEY"),
            llm_model: get_or_default(&lookup, "LLM_MODEL", &defaults.llm_model),
            crawl_api_url: get_optional(&lookup, "CRAWL_API_URL"),
            crawl_api_key: get_optional(&lookup, "CRAWL_API_KEY"),
            bind_addr: get_or_default(&lookup, "AUDIT_BIND_ADDR", &defaults.bind_addr),
        })
    }
}

fn get_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn get_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    get_optional(lookup, key).unwrap_or_else(|| default.to_string())
}

fn get_parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get_optional(lookup, key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

/// A ratio in `[0, 1]`. NaN and infinities are rejected along with
/// anything outside the range.
fn get_fraction<F>(lookup: &F, key: &'static str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: f64 = get_parsed(lookup, key, default)?;
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value: value.to_string(),
        })
    }
}

fn get_millis<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let ms = get_parsed(lookup, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.audit, AuditConfig::default());
        assert_eq!(settings.audit.min_words, 50);
        assert_eq!(settings.audit.shingle_size, 3);
        assert!(settings.llm_api_key.is_none());
        assert!(settings.crawl_api_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("AUDIT_PROBE_TIMEOUT_MS", "500"),
            ("AUDIT_DUPLICATE_THRESHOLD", "0.9"),
            ("LLM_API_KEY", "sk-test"),
            ("CRAWL_API_URL", "http://localhost:3002"),
        ]))
        .unwrap();
        assert_eq!(settings.audit.probe_timeout, Duration::from_millis(500));
        assert_eq!(settings.audit.duplicate_threshold, 0.9);
        assert_eq!(settings.llm_api_key.as_deref(), Some("sk-test"));
        assert_eq!(
            settings.crawl_api_url.as_deref(),
            Some("http://localhost:3002")
        );
    }

    #[test]
    fn test_blank_values_are_unset() {
        let settings = Settings::from_lookup(lookup_from(&[("LLM_API_KEY", "  ")])).unwrap();
        assert!(settings.llm_api_key.is_none());
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = Settings::from_lookup(lookup_from(&[("AUDIT_MIN_WORDS", "lots")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "AUDIT_MIN_WORDS",
                ..
            }
        ));
    }

    #[test]
    fn test_ratios_must_be_finite_fractions() {
        for bad in ["NaN", "inf", "-0.1", "1.5"] {
            let err = Settings::from_lookup(lookup_from(&[("AUDIT_DUPLICATE_THRESHOLD", bad)]))
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    ConfigError::OutOfRange {
                        key: "AUDIT_DUPLICATE_THRESHOLD",
                        ..
                    }
                ),
                "{bad} was accepted"
            );
        }
        let err = Settings::from_lookup(lookup_from(&[("AUDIT_MIN_SIZE_RATIO", "nan")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                key: "AUDIT_MIN_SIZE_RATIO",
                ..
            }
        ));

        let settings = Settings::from_lookup(lookup_from(&[
            ("AUDIT_DUPLICATE_THRESHOLD", "1"),
            ("AUDIT_MIN_SIZE_RATIO", "0"),
        ]))
        .unwrap();
        assert_eq!(settings.audit.duplicate_threshold, 1.0);
        assert_eq!(settings.audit.min_size_ratio, 0.0);
    }

    #[test]
    fn test_audit_config_json_uses_millis() {
        let json = serde_json::to_value(AuditConfig::default()).unwrap();
        assert_eq!(json["probeTimeout"], 15_000);
        let parsed: AuditConfig =
            serde_json::from_str(r#"{"minWords": 20, "crawlTimeout": 1000}"#).unwrap();
        assert_eq!(parsed.min_words, 20);
        assert_eq!(parsed.crawl_timeout, Duration::from_millis(1000));
        assert_eq!(parsed.min_shingles, 10);
    }
}
