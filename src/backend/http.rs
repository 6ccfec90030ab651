//! HTTP backend for an Anthropic-style Messages API.

use super::AnalysisBackend;
use crate::config::OrchestratorConfig;
use crate::error::NetworkErrorKind;
use crate::error_code::StandardErrorCode;
use crate::types::ModelParams;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use keyring::Entry;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const KEYRING_SERVICE: &str = "analysis-orchestrator";
const KEYRING_USER: &str = "anthropic";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpBackend {
    /// Build a client from the orchestrator configuration.
    ///
    /// The API key is taken from the config, then the OS keyring, then
    /// `ANTHROPIC_API_KEY`; none of them present is a configuration error.
    pub fn new(config: &OrchestratorConfig) -> Result<Self> {
        Self::with_key_lookup(config, stored_api_key)
    }

    /// Like [`HttpBackend::new`], with `lookup` standing in for the keyring
    /// and environment when the config carries no key.
    pub fn with_key_lookup(
        config: &OrchestratorConfig,
        lookup: impl FnOnce() -> Option<String>,
    ) -> Result<Self> {
        let explicit = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        let api_key = explicit
            .or_else(lookup)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "no API key configured",
                    ErrorContext::new().with_source("http_backend").with_details(format!(
                        "set api_key, store it in the keyring ({}/{}), or export {}",
                        KEYRING_SERVICE, KEYRING_USER, API_KEY_ENV
                    )),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(
                env::var("ANALYSIS_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(16),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| {
                Error::configuration_with_context(
                    "cannot build HTTP client",
                    ErrorContext::new()
                        .with_source("http_backend")
                        .with_details(e.to_string()),
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

/// Stored credential: the OS keyring first, then `ANTHROPIC_API_KEY`.
pub fn stored_api_key() -> Option<String> {
    if let Ok(entry) = Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        if let Ok(key) = entry.get_password() {
            return Some(key);
        }
    }

    env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn call(&self, system_prompt: &str, user_prompt: &str, params: &ModelParams) -> Result<String> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let body = MessagesRequest {
            model: &params.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system: system_prompt,
            messages: [UserMessage {
                role: "user",
                content: user_prompt,
            }],
        };

        let start = Instant::now();
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("x-request-id", &request_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(&e, &request_id))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let retry_after_ms = retry_after_ms(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            let err = remote_error(status, &text, retry_after_ms, &request_id);
            info!(
                http_status = status,
                standard_code = err.standard_code().code(),
                request_id = request_id.as_str(),
                duration_ms = start.elapsed().as_millis() as u64,
                "analysis request rejected"
            );
            return Err(err);
        }

        let raw = resp
            .bytes()
            .await
            .map_err(|e| network_error(&e, &request_id))?;
        let parsed: MessagesResponse = serde_json::from_slice(&raw).map_err(|e| {
            Error::malformed(format!("response body is not a messages payload: {}", e))
                .with_context(
                    ErrorContext::new()
                        .with_source("http_backend")
                        .with_request_id(request_id.clone()),
                )
        })?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        if text.is_empty() {
            return Err(Error::malformed("response contained no text content").with_context(
                ErrorContext::new()
                    .with_source("http_backend")
                    .with_request_id(request_id),
            ));
        }

        debug!(
            http_status = status,
            request_id = request_id.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            bytes = raw.len(),
            "analysis request succeeded"
        );
        Ok(text)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Map a non-success answer onto `Error::Remote`.
///
/// A provider error type in the body (`{"error": {"type": ...}}`) wins over
/// the HTTP status when deriving the standard code.
fn remote_error(status: u16, body: &str, retry_after_ms: Option<u32>, request_id: &str) -> Error {
    let payload: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error_obj = payload.as_ref().and_then(|v| v.get("error"));
    let provider_code = error_obj
        .and_then(|e| e.get("type").or_else(|| e.get("code")))
        .and_then(|v| v.as_str());
    let message = error_obj
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());

    let code = provider_code
        .and_then(StandardErrorCode::from_provider_code)
        .unwrap_or_else(|| StandardErrorCode::from_http_status(status));

    let mut context = ErrorContext::new()
        .with_source("http_backend")
        .with_request_id(request_id.to_string());
    if let Some(pc) = provider_code {
        context = context.with_details(format!("provider_code: {}", pc));
    }

    Error::Remote {
        status,
        code,
        message,
        retry_after_ms,
        context,
    }
}

/// `Retry-After: <seconds>` only; the HTTP-date form is ignored.
fn retry_after_ms(headers: &HeaderMap) -> Option<u32> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    let secs: u32 = raw.parse().ok()?;
    Some(secs.saturating_mul(1000))
}

fn network_error(err: &reqwest::Error, request_id: &str) -> Error {
    let kind = classify_network_error(err);
    Error::network(kind, err.to_string()).with_context(
        ErrorContext::new()
            .with_source("http_backend")
            .with_request_id(request_id.to_string()),
    )
}

fn classify_network_error(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        return NetworkErrorKind::TimedOut;
    }

    let mut chain = String::new();
    let mut current: Option<&dyn std::error::Error> = Some(err);
    while let Some(e) = current {
        chain.push_str(&e.to_string().to_lowercase());
        chain.push('\n');
        current = e.source();
    }

    if chain.contains("dns error") || chain.contains("failed to lookup address") {
        NetworkErrorKind::DnsFailure
    } else if chain.contains("connection refused") {
        NetworkErrorKind::ConnectionRefused
    } else if chain.contains("connection reset") || chain.contains("broken pipe") {
        NetworkErrorKind::ConnectionReset
    } else if chain.contains("timed out") {
        NetworkErrorKind::TimedOut
    } else if err.is_connect() {
        NetworkErrorKind::ConnectionRefused
    } else {
        NetworkErrorKind::Other
    }
}
