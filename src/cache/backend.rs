//! Cache backend implementations.

use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry {
    data: Vec<u8>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            created_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    async fn exists(&self, key: &CacheKey) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    /// Number of live (unexpired) entries.
    async fn len(&self) -> Result<usize>;
    /// Remove every expired entry, returning how many were dropped.
    async fn purge_expired(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-process LRU map with TTL expiry.
///
/// Reads and writes are O(1); a full cache drops its least recently read or
/// written entry. Expired entries linger until read, evicted or purged.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<String, CacheEntry>>> {
        self.entries.lock().map_err(|_| {
            Error::runtime_with_context(
                "cache lock poisoned",
                ErrorContext::new().with_source("memory_cache"),
            )
        })
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let mut entries = self.lock()?;
        match entries.get(&key.hash) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.data.clone())),
            Some(_) => {}
        }
        entries.pop(&key.hash);
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        self.lock()?
            .put(key.hash.clone(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.pop(&key.hash).is_some())
    }

    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        // peek: a presence check does not count as use
        Ok(self
            .lock()?
            .peek(&key.hash)
            .map(|e| !e.is_expired())
            .unwrap_or(false))
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.lock()?.iter().filter(|(_, e)| !e.is_expired()).count())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.lock()?;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            entries.pop(k);
        }
        Ok(expired.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
