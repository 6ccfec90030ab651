//! Orchestrator configuration.
//!
//! Values come from (later wins): [`Default`], a YAML document, then
//! `ANALYSIS_*` environment variables. Builder-style `with_*` setters are
//! available for programmatic use. Call [`OrchestratorConfig::validate`]
//! before building; the builder does this for you.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ANALYSIS_MODEL` | `model` |
//! | `ANALYSIS_TEMPERATURE` | `temperature` |
//! | `ANALYSIS_MAX_TOKENS` | `max_tokens` |
//! | `ANALYSIS_ENABLE_CACHE` | `enable_cache` (`1`/`true`/`0`/`false`) |
//! | `ANALYSIS_CACHE_TTL_SECS` | `cache_ttl` |
//! | `ANALYSIS_MAX_CONCURRENCY` | `max_concurrency` |
//! | `ANALYSIS_RATE_LIMIT_CAPACITY` | `rate_limit_capacity` |
//! | `ANALYSIS_RATE_LIMIT_REFILL_RATE` | `rate_limit_refill_rate` |
//! | `ANALYSIS_MAX_RETRIES` | `max_retries` |
//! | `ANALYSIS_BASE_URL` | `base_url` |
//! | `ANALYSIS_REQUEST_TIMEOUT_MS` | `request_timeout` |

use crate::cache::CacheConfig;
use crate::queue::QueueConfig;
use crate::resilience::rate_limiter::RateLimiterConfig;
use crate::resilience::retry::RetryConfig;
use crate::types::ModelParams;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    pub enable_cache: bool,
    #[serde(rename = "cache_ttl_ms", with = "duration_ms")]
    pub cache_ttl: Duration,
    #[serde(rename = "cache_sweep_interval_ms", with = "duration_ms")]
    pub cache_sweep_interval: Duration,
    pub cache_max_entries: usize,

    pub max_concurrency: usize,
    pub rate_limit_capacity: u32,
    /// Tokens per second. Zero or negative disables rate limiting.
    pub rate_limit_refill_rate: f64,

    pub max_retries: u32,
    #[serde(rename = "base_delay_ms", with = "duration_ms")]
    pub base_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,

    /// Explicit credential. When absent the backend falls back to the OS
    /// keyring, then `ANTHROPIC_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let model = ModelParams::default();
        Self {
            model: model.model,
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            enable_cache: true,
            cache_ttl: Duration::from_secs(3600),
            cache_sweep_interval: Duration::from_secs(300),
            cache_max_entries: 10_000,
            max_concurrency: 5,
            rate_limit_capacity: 50,
            rate_limit_refill_rate: 5.0,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with `ANALYSIS_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                "invalid configuration document",
                ErrorContext::new()
                    .with_source("config")
                    .with_details(e.to_string()),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read configuration file {}", path.display()),
                ErrorContext::new()
                    .with_source("config")
                    .with_details(e.to_string()),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply `ANALYSIS_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("ANALYSIS_MODEL").filter(|v| !v.trim().is_empty()) {
            self.model = v;
        }
        if let Some(v) = parse_var(&lookup, "ANALYSIS_TEMPERATURE") {
            self.temperature = v;
        }
        if let Some(v) = parse_var(&lookup, "ANALYSIS_MAX_TOKENS") {
            self.max_tokens = v;
        }
        if let Some(v) = lookup("ANALYSIS_ENABLE_CACHE") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.enable_cache = true,
                "0" | "false" | "no" => self.enable_cache = false,
                other => warn!(variable = "ANALYSIS_ENABLE_CACHE", value = other, "ignoring override"),
            }
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "ANALYSIS_CACHE_TTL_SECS") {
            self.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = parse_var(&lookup, "ANALYSIS_MAX_CONCURRENCY") {
            self.max_concurrency = v;
        }
        if let Some(v) = parse_var(&lookup, "ANALYSIS_RATE_LIMIT_CAPACITY") {
            self.rate_limit_capacity = v;
        }
        if let Some(v) = parse_var(&lookup, "ANALYSIS_RATE_LIMIT_REFILL_RATE") {
            self.rate_limit_refill_rate = v;
        }
        if let Some(v) = parse_var(&lookup, "ANALYSIS_MAX_RETRIES") {
            self.max_retries = v;
        }
        if let Some(v) = lookup("ANALYSIS_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.base_url = v;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "ANALYSIS_REQUEST_TIMEOUT_MS") {
            self.request_timeout = Duration::from_millis(ms);
        }
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_sweep_interval(mut self, interval: Duration) -> Self {
        self.cache_sweep_interval = interval;
        self
    }

    pub fn with_cache_max_entries(mut self, n: usize) -> Self {
        self.cache_max_entries = n;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_rate_limit(mut self, capacity: u32, refill_per_sec: f64) -> Self {
        self.rate_limit_capacity = capacity;
        self.rate_limit_refill_rate = refill_per_sec;
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration, multiplier: f64) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reject values no component could run with.
    pub fn validate(&self) -> Result<()> {
        let fail = |field: &str, msg: String| {
            Err(Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_source("config")
                    .with_details(format!("field: {}", field)),
            ))
        };

        if self.model.trim().is_empty() {
            return fail("model", "model must not be empty".into());
        }
        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return fail(
                "temperature",
                format!("temperature must be within [0, 1], got {}", self.temperature),
            );
        }
        if self.max_tokens == 0 {
            return fail("max_tokens", "max_tokens must be positive".into());
        }
        if self.enable_cache {
            if self.cache_ttl.is_zero() {
                return fail("cache_ttl", "cache_ttl must be positive".into());
            }
            if self.cache_sweep_interval.is_zero() {
                return fail(
                    "cache_sweep_interval",
                    "cache_sweep_interval must be positive".into(),
                );
            }
            if self.cache_max_entries == 0 {
                return fail("cache_max_entries", "cache_max_entries must be positive".into());
            }
        }
        if self.max_concurrency == 0 {
            return fail("max_concurrency", "max_concurrency must be at least 1".into());
        }
        if self.rate_limit_capacity == 0 {
            return fail(
                "rate_limit_capacity",
                "rate_limit_capacity must be at least 1".into(),
            );
        }
        if !self.rate_limit_refill_rate.is_finite() {
            return fail(
                "rate_limit_refill_rate",
                "rate_limit_refill_rate must be finite".into(),
            );
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return fail(
                "backoff_multiplier",
                format!("backoff_multiplier must be >= 1, got {}", self.backoff_multiplier),
            );
        }
        if self.base_delay > self.max_delay {
            return fail("base_delay", "base_delay must not exceed max_delay".into());
        }
        if self.base_url.trim().is_empty() {
            return fail("base_url", "base_url must not be empty".into());
        }
        if self.request_timeout.is_zero() {
            return fail("request_timeout", "request_timeout must be positive".into());
        }
        Ok(())
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig::new()
            .with_max_tokens(self.rate_limit_capacity)
            .with_refill_rate(self.rate_limit_refill_rate)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_retries)
            .with_base_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_backoff_multiplier(self.backoff_multiplier)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_enabled(self.enable_cache)
            .with_ttl(self.cache_ttl)
            .with_sweep_interval(self.cache_sweep_interval)
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new().with_max_concurrency(self.max_concurrency)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = raw.as_str(), "ignoring unparseable override");
            None
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
