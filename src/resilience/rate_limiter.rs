use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub refill_rate: f64,
    pub max_tokens: f64,
    pub tokens: f64,
    /// Estimated wait time until a single token is available (ms), if currently short.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum burst size (tokens).
    pub max_tokens: f64,
    /// Tokens per second.
    pub refill_rate: f64,
}

impl RateLimiterConfig {
    /// Create a new config with default values (50 tokens, 5 tokens/sec).
    pub fn new() -> Self {
        Self {
            max_tokens: 50.0,
            refill_rate: 5.0,
        }
    }

    pub fn from_rps(rps: f64) -> Option<Self> {
        if !rps.is_finite() || rps < 0.0 {
            return None;
        }
        Some(Self {
            max_tokens: rps.max(1.0),
            refill_rate: rps,
        })
    }

    /// Set the maximum tokens (burst size)
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens as f64;
        self
    }

    /// Set the refill rate (tokens per second)
    pub fn with_refill_rate(mut self, rate: f64) -> Self {
        self.refill_rate = rate;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct State {
    tokens: f64,
    last_refill_at: Instant,
}

/// Token-bucket admission control.
///
/// - Refill is lazy: computed on every call, no background timer
/// - `tokens` stays within `[0, max_tokens]` at every observation point
/// - A non-positive or non-finite refill rate disables limiting entirely
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    /// Non-finite or negative settings are normalized: a NaN or infinite
    /// refill rate disables limiting, a bad burst size becomes zero.
    pub fn new(mut cfg: RateLimiterConfig) -> Self {
        if !cfg.refill_rate.is_finite() {
            warn!(refill_rate = cfg.refill_rate, "non-finite refill rate, limiting disabled");
            cfg.refill_rate = 0.0;
        }
        if !cfg.max_tokens.is_finite() || cfg.max_tokens < 0.0 {
            warn!(max_tokens = cfg.max_tokens, "invalid burst size, using 0");
            cfg.max_tokens = 0.0;
        }
        let state = Mutex::new(State {
            tokens: cfg.max_tokens.max(0.0),
            last_refill_at: Instant::now(),
        });
        Self { cfg, state }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn unlimited(&self) -> bool {
        self.cfg.refill_rate <= 0.0
    }

    fn refill_locked(cfg: &RateLimiterConfig, st: &mut State) {
        let now = Instant::now();
        let elapsed = now.duration_since(st.last_refill_at).as_secs_f64();
        if elapsed > 0.0 {
            st.tokens = (st.tokens + elapsed * cfg.refill_rate).min(cfg.max_tokens);
            st.last_refill_at = now;
        }
    }

    /// Consume `n` tokens if available, without waiting.
    pub async fn try_consume(&self, n: f64) -> bool {
        if self.unlimited() {
            return true;
        }
        let mut st = self.state.lock().await;
        Self::refill_locked(&self.cfg, &mut st);
        if st.tokens >= n {
            st.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Suspend until `n` tokens can be granted, then consume them.
    ///
    /// When the bucket is short, the caller sleeps for the computed deficit and
    /// the bucket is left fully drained afterwards rather than credited with the
    /// fractional remainder. Concurrent waiters therefore each drain the bucket
    /// on wake-up, which under-uses capacity under contention.
    pub async fn wait_for_token(&self, n: f64) {
        // NaN or non-positive requests need no tokens
        if self.unlimited() || n.is_nan() || n <= 0.0 {
            return;
        }

        let wait = {
            let mut st = self.state.lock().await;
            Self::refill_locked(&self.cfg, &mut st);
            if st.tokens >= n {
                st.tokens -= n;
                return;
            }
            Duration::try_from_secs_f64((n - st.tokens) / self.cfg.refill_rate)
                .unwrap_or(Duration::MAX)
        };

        debug!(
            wait_ms = wait.as_millis() as u64,
            requested = n,
            "rate limiter waiting for tokens"
        );
        tokio::time::sleep(wait).await;

        let mut st = self.state.lock().await;
        st.tokens = 0.0;
        st.last_refill_at = Instant::now();
    }

    /// Current token count after lazy refill.
    pub async fn tokens_available(&self) -> f64 {
        let mut st = self.state.lock().await;
        Self::refill_locked(&self.cfg, &mut st);
        st.tokens
    }

    /// Refill the bucket to capacity and restart the refill clock.
    pub async fn reset(&self) {
        let mut st = self.state.lock().await;
        st.tokens = self.cfg.max_tokens.max(0.0);
        st.last_refill_at = Instant::now();
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let cfg = &self.cfg;
        let mut st = self.state.lock().await;

        let mut estimated_wait_ms = None;
        if cfg.refill_rate > 0.0 {
            Self::refill_locked(cfg, &mut st);
            if st.tokens < 1.0 {
                let missing = 1.0 - st.tokens;
                estimated_wait_ms = Some((missing / cfg.refill_rate * 1000.0).ceil() as u64);
            }
        }

        RateLimiterSnapshot {
            refill_rate: cfg.refill_rate,
            max_tokens: cfg.max_tokens,
            tokens: st.tokens,
            estimated_wait_ms,
        }
    }
}
