//! # Resilience Primitives Module
//!
//! Admission control and failure recovery for calls to the analysis backend.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Token bucket limiting request issuance |
//! | [`retry`] | Exponential backoff with jitter and a retryability classifier |
//!
//! ## Rate Limiter
//!
//! ```rust
//! use analysis_orchestrator::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//!
//! # async fn demo() {
//! let config = RateLimiterConfig::new()
//!     .with_max_tokens(50)
//!     .with_refill_rate(5.0); // 5 tokens per second
//! let limiter = RateLimiter::new(config);
//!
//! if limiter.try_consume(1.0).await {
//!     // Proceed with request...
//! }
//! # }
//! ```
//!
//! ## Retry
//!
//! ```rust
//! use analysis_orchestrator::resilience::retry::{RetryConfig, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(
//!     RetryConfig::new()
//!         .with_max_retries(3)
//!         .with_base_delay(Duration::from_secs(1)),
//! );
//! assert_eq!(policy.backoff(2), Duration::from_secs(4));
//! ```

pub mod rate_limiter;
pub mod retry;
