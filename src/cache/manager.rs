//! Cache manager.

use super::backend::CacheBackend;
use super::key::{CacheKey, CacheKeyGenerator};
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub enabled: bool,
    pub max_entry_size: usize,
    /// Interval of the eager expiry sweep.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            enabled: true,
            max_entry_size: 10 * 1024 * 1024,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Live entries at the time of the snapshot.
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    errors: AtomicU64,
}

/// Content-addressed, TTL-expiring store of typed values.
///
/// Every fault (unserializable options, undecodable entry, backend error)
/// is logged and counted, then treated as a miss. Callers never see a cache error.
pub struct ResponseCache<T> {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    keys: CacheKeyGenerator,
    stats: AtomicStats,
    _value: PhantomData<fn() -> T>,
}

impl<T> ResponseCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            keys: CacheKeyGenerator::new(),
            stats: AtomicStats::default(),
            _value: PhantomData,
        }
    }

    pub fn with_key_generator(mut self, keys: CacheKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn fault(&self, op: &'static str, err: &crate::Error) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            operation = op,
            backend = self.backend.name(),
            error = %err,
            "cache fault treated as miss"
        );
    }

    fn key_for<O: Serialize + ?Sized>(&self, content: &str, options: &O) -> Result<CacheKey> {
        self.keys.fingerprint(content, options)
    }

    pub async fn get<O: Serialize + ?Sized>(&self, content: &str, options: &O) -> Option<T> {
        if !self.config.enabled {
            return None;
        }
        let key = match self.key_for(content, options) {
            Ok(k) => k,
            Err(e) => {
                self.fault("get", &e);
                return None;
            }
        };
        match self.backend.get(&key).await {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(value) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    self.fault("decode", &crate::Error::from(e));
                    None
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.fault("get", &e);
                None
            }
        }
    }

    /// Store `value`; `ttl` falls back to the configured default.
    pub async fn set<O: Serialize + ?Sized>(
        &self,
        content: &str,
        value: &T,
        options: &O,
        ttl: Option<Duration>,
    ) {
        if !self.config.enabled {
            return;
        }
        let result = async {
            let key = self.key_for(content, options)?;
            let data = serde_json::to_vec(value)?;
            if data.len() > self.config.max_entry_size {
                debug!(size = data.len(), "entry exceeds max_entry_size, not cached");
                return Ok(false);
            }
            self.backend
                .set(&key, &data, ttl.unwrap_or(self.config.default_ttl))
                .await?;
            Ok::<_, crate::Error>(true)
        }
        .await;
        match result {
            Ok(true) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {}
            Err(e) => self.fault("set", &e),
        }
    }

    pub async fn has<O: Serialize + ?Sized>(&self, content: &str, options: &O) -> bool {
        if !self.config.enabled {
            return false;
        }
        let key = match self.key_for(content, options) {
            Ok(k) => k,
            Err(e) => {
                self.fault("has", &e);
                return false;
            }
        };
        match self.backend.exists(&key).await {
            Ok(found) => found,
            Err(e) => {
                self.fault("has", &e);
                false
            }
        }
    }

    /// Sweep expired entries, returning how many were removed.
    pub async fn cleanup(&self) -> usize {
        match self.backend.purge_expired().await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "cache sweep removed expired entries");
                }
                removed
            }
            Err(e) => {
                self.fault("cleanup", &e);
                0
            }
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.backend.clear().await {
            self.fault("clear", &e);
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let size = match self.backend.len().await {
            Ok(n) => n,
            Err(e) => {
                self.fault("len", &e);
                0
            }
        };
        CacheStats {
            size,
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            sets: self.stats.sets.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl<T> ResponseCache<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// Start the periodic eager sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference: it ends by itself once the cache
    /// is dropped, or immediately when the returned handle is stopped/dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweepHandle {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                cache.cleanup().await;
            }
        });
        SweepHandle {
            handle: Some(handle),
        }
    }
}

/// Owner of the periodic sweep task. Dropping it stops the sweep.
#[derive(Debug)]
pub struct SweepHandle {
    handle: Option<JoinHandle<()>>,
}

impl SweepHandle {
    pub fn stop(&mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
