//! Retry policy with exponential backoff and additive jitter.
//!
//! Retries happen at the request execution level: the policy wraps a closure
//! that produces a fresh future per attempt, so every retry re-issues the
//! remote call from scratch.

use crate::error::NetworkErrorKind;
use crate::error_code::StandardErrorCode;
use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Add up to 10% uniform random delay on top of the exponential value.
    pub jitter: bool,
    /// HTTP statuses treated as transient by [`TransientErrorClassifier`].
    pub retry_on_status: Vec<u16>,
    /// Network failure kinds treated as transient by [`TransientErrorClassifier`].
    pub retry_on_network: Vec<NetworkErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
            retry_on_status: vec![408, 429, 500, 502, 503, 504, 529],
            retry_on_network: vec![
                NetworkErrorKind::ConnectionReset,
                NetworkErrorKind::ConnectionRefused,
                NetworkErrorKind::TimedOut,
                NetworkErrorKind::DnsFailure,
            ],
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }

    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    pub fn with_backoff_multiplier(mut self, m: f64) -> Self {
        self.backoff_multiplier = m;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retry_on_status(mut self, statuses: Vec<u16>) -> Self {
        self.retry_on_status = statuses;
        self
    }

    pub fn with_retry_on_network(mut self, kinds: Vec<NetworkErrorKind>) -> Self {
        self.retry_on_network = kinds;
        self
    }
}

/// Decides whether a failed attempt is worth repeating.
pub trait RetryClassifier: Send + Sync {
    fn is_retryable(&self, error: &Error) -> bool;
}

impl<F> RetryClassifier for F
where
    F: Fn(&Error) -> bool + Send + Sync,
{
    fn is_retryable(&self, error: &Error) -> bool {
        self(error)
    }
}

/// Matches rate limits, timeouts, designated 5xx statuses and network
/// reset/refused/timeout/DNS failures. Everything else fails fast.
#[derive(Debug, Clone)]
pub struct TransientErrorClassifier {
    retry_on_status: Vec<u16>,
    retry_on_network: Vec<NetworkErrorKind>,
}

impl TransientErrorClassifier {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            retry_on_status: config.retry_on_status.clone(),
            retry_on_network: config.retry_on_network.clone(),
        }
    }
}

impl Default for TransientErrorClassifier {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryClassifier for TransientErrorClassifier {
    fn is_retryable(&self, error: &Error) -> bool {
        match error {
            Error::Remote { status, code, .. } => {
                // A 429 carrying a quota or auth code will not clear on its own.
                if matches!(
                    code,
                    StandardErrorCode::QuotaExhausted
                        | StandardErrorCode::Authentication
                        | StandardErrorCode::PermissionDenied
                ) {
                    return false;
                }
                self.retry_on_status.contains(status)
            }
            Error::Network { kind, .. } => self.retry_on_network.contains(kind),
            _ => false,
        }
    }
}

/// Emitted once per scheduled retry.
#[derive(Debug, Clone)]
pub struct RetryEvent {
    /// 1-based number of the attempt that just failed.
    pub attempt: u32,
    pub delay: Duration,
    pub code: StandardErrorCode,
    pub message: String,
}

pub type RetryListener = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: Arc<dyn RetryClassifier>,
    listener: Option<RetryListener>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        let classifier = Arc::new(TransientErrorClassifier::from_config(&config));
        Self {
            config,
            classifier,
            listener: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_listener(mut self, listener: RetryListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn is_retryable(&self, error: &Error) -> bool {
        self.classifier.is_retryable(error)
    }

    /// Exponential delay without jitter: `min(base * multiplier^attempt, max)`.
    ///
    /// `attempt` is 0-based (first failure => attempt=0).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let cap = self.config.max_delay;
        let factor = self
            .config
            .backoff_multiplier
            .max(0.0)
            .powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.config.base_delay.as_secs_f64() * factor;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        if secs >= cap.as_secs_f64() {
            return cap;
        }
        Duration::from_nanos((secs * 1e9).round() as u64)
    }

    /// Backoff plus up to 10% additive jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if !self.config.jitter || delay.is_zero() {
            return delay;
        }
        let fraction: f64 = rand::thread_rng().gen_range(0.0..=0.1);
        let jitter = Duration::try_from_secs_f64(delay.as_secs_f64() * fraction)
            .unwrap_or(Duration::ZERO);
        delay.saturating_add(jitter)
    }

    /// Run `action` until it succeeds, fails with a non-retryable error, or
    /// exhausts `max_retries`. The terminal error carries the attempt count.
    pub async fn run<T, F, Fut>(&self, mut action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // 0-based index of the attempt in progress
        let mut attempt: u32 = 0;
        loop {
            match action().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let attempts = attempt + 1;
                    if !self.is_retryable(&err) {
                        return Err(err.with_attempts(attempts));
                    }
                    if attempt >= self.config.max_retries {
                        warn!(
                            attempts,
                            standard_code = err.standard_code().code(),
                            "retries exhausted"
                        );
                        return Err(err.with_attempts(attempts));
                    }

                    let delay = self.delay_for(attempt);
                    let event = RetryEvent {
                        attempt: attempts,
                        delay,
                        code: err.standard_code(),
                        message: err.to_string(),
                    };
                    warn!(
                        attempt = event.attempt,
                        delay_ms = delay.as_millis() as u64,
                        standard_code = event.code.code(),
                        error = event.message.as_str(),
                        "retrying analysis request"
                    );
                    if let Some(listener) = &self.listener {
                        listener(&event);
                    }

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Wrap `action` so every invocation of the returned closure runs under `policy`.
pub fn with_retry<T, F, Fut>(
    action: F,
    policy: RetryPolicy,
) -> impl Fn() -> futures::future::BoxFuture<'static, Result<T>>
where
    T: Send + 'static,
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    move || {
        let action = action.clone();
        let policy = policy.clone();
        Box::pin(async move { policy.run(action).await })
    }
}
