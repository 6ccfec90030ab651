//! # Response Caching Module
//!
//! Content-addressed response caching so that repeated identical analysis
//! requests never consume concurrency slots, rate-limit budget, or backend calls.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResponseCache`] | Typed cache keyed by request fingerprint, with TTL and statistics |
//! | [`CacheConfig`] | Default TTL, sweep interval, entry size limit |
//! | [`CacheBackend`] | Trait for implementing custom cache backends |
//! | [`MemoryCache`] | In-memory backend with TTL and least-recently-accessed eviction |
//! | [`CacheKeyGenerator`] | SHA-256 fingerprint of content plus canonical options |
//! | [`SweepHandle`] | Owner of the periodic expiry sweep |
//!
//! ## Example
//!
//! ```rust
//! use analysis_orchestrator::cache::{CacheConfig, MemoryCache, ResponseCache};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let cache: ResponseCache<serde_json::Value> = ResponseCache::new(
//!     CacheConfig::new().with_ttl(Duration::from_secs(3600)),
//!     Box::new(MemoryCache::new(1000)),
//! );
//! let options = json!({"language": "rust", "rules": ["security"]});
//! cache.set("fn main() {}", &json!({"issues": []}), &options, None).await;
//! assert!(cache.has("fn main() {}", &options).await);
//! # }
//! ```
//!
//! ## Fingerprints
//!
//! Keys are derived from the request content and a canonical JSON rendering
//! of the options (object keys sorted at every depth), so two logically
//! identical requests always share an entry.

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, MemoryCache};
pub use key::{CacheKey, CacheKeyGenerator};
pub use manager::{CacheConfig, CacheStats, ResponseCache, SweepHandle};
