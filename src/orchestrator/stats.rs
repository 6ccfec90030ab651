//! Orchestrator statistics.

use crate::cache::CacheStats;
use crate::queue::QueueStats;
use crate::resilience::rate_limiter::RateLimiterSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view across every component.
#[derive(Debug, Clone)]
pub struct OrchestratorStats {
    pub cache_enabled: bool,
    /// All zero when caching is disabled.
    pub cache: CacheStats,
    pub queue: QueueStats,
    pub rate_limiter: RateLimiterSnapshot,
    pub requests: RequestCounts,
    pub destroyed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    /// Calls to `analyze`, including batch items.
    pub requests: u64,
    pub cache_hits: u64,
    /// Backend invocations, retries included.
    pub backend_calls: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct RequestCounters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    backend_calls: AtomicU64,
    failures: AtomicU64,
}

impl RequestCounters {
    pub(crate) fn on_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_backend_call(&self) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RequestCounts {
        RequestCounts {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
