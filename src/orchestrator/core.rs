//! Core orchestrator implementation.

use super::stats::{OrchestratorStats, RequestCounters};
use crate::backend::AnalysisBackend;
use crate::cache::{CacheStats, ResponseCache, SweepHandle};
use crate::prompt::PromptBuilder;
use crate::queue::RequestQueue;
use crate::resilience::rate_limiter::RateLimiter;
use crate::resilience::retry::RetryPolicy;
use crate::response::parse_analysis;
use crate::types::{AnalysisOptions, AnalysisRequest, AnalysisResult, ModelParams};
use crate::{Error, ErrorContext, Result};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// State shared between the public handle and queued tasks.
pub(crate) struct Shared {
    pub(crate) backend: Arc<dyn AnalysisBackend>,
    pub(crate) prompts: Arc<dyn PromptBuilder>,
    pub(crate) params: ModelParams,
    pub(crate) cache: Option<Arc<ResponseCache<AnalysisResult>>>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) retry: RetryPolicy,
    pub(crate) counters: RequestCounters,
}

impl Shared {
    /// Runs inside a queue slot: token, then retried call+parse, then write-through.
    async fn execute(self: Arc<Self>, request: AnalysisRequest) -> Result<AnalysisResult> {
        self.limiter.wait_for_token(1.0).await;

        let prompt = self.prompts.build(&request);
        let shared = &*self;
        let prompt = &prompt;
        let result = self
            .retry
            .run(|| async move {
                shared.counters.on_backend_call();
                let text = shared
                    .backend
                    .call(&prompt.system, &prompt.user, &shared.params)
                    .await?;
                parse_analysis(&text)
            })
            .await?;

        if let Some(cache) = &self.cache {
            cache
                .set(&request.content, &result, &request.options, None)
                .await;
        }
        Ok(result)
    }
}

/// Single entry point for cached, throttled, bounded and retried analysis.
///
/// Build one with [`crate::OrchestratorBuilder`]. All methods take `&self`;
/// wrap the orchestrator in an `Arc` to share it across tasks.
pub struct AnalysisOrchestrator {
    pub(crate) shared: Arc<Shared>,
    pub(crate) queue: RequestQueue,
    pub(crate) sweeper: Mutex<Option<SweepHandle>>,
    pub(crate) destroyed: AtomicBool,
}

impl AnalysisOrchestrator {
    /// Analyze one piece of content.
    ///
    /// A cache hit returns immediately without touching the queue, the rate
    /// limiter or the backend. Failures are never cached.
    pub async fn analyze(
        &self,
        content: impl Into<String>,
        options: AnalysisOptions,
    ) -> Result<AnalysisResult> {
        self.analyze_request(AnalysisRequest::new(content, options))
            .await
    }

    pub async fn analyze_request(&self, request: AnalysisRequest) -> Result<AnalysisResult> {
        if self.is_destroyed() {
            return Err(Self::destroyed_error());
        }
        let shared = &self.shared;
        shared.counters.on_request();

        if let Some(cache) = &shared.cache {
            if let Some(hit) = cache.get(&request.content, &request.options).await {
                shared.counters.on_cache_hit();
                debug!(language = request.options.language.as_str(), "analysis served from cache");
                return Ok(hit);
            }
        }

        let start = Instant::now();
        let language = request.options.language.clone();
        let task = Arc::clone(shared).execute(request);
        match self.queue.enqueue(task).await {
            Ok(result) => {
                info!(
                    language = language.as_str(),
                    issues = result.issues.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "analysis completed"
                );
                Ok(result)
            }
            Err(err) => {
                shared.counters.on_failure();
                warn!(
                    language = language.as_str(),
                    standard_code = err.standard_code().code(),
                    attempts = err.attempts().unwrap_or(0),
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %err,
                    "analysis failed"
                );
                Err(err)
            }
        }
    }

    /// Fan out every item at once; results line up with the input order.
    ///
    /// Items settle independently, so one failure never hides another's result.
    pub async fn analyze_batch<I>(&self, items: I) -> Vec<Result<AnalysisResult>>
    where
        I: IntoIterator<Item = AnalysisRequest>,
    {
        join_all(items.into_iter().map(|req| self.analyze_request(req))).await
    }

    pub async fn stats(&self) -> OrchestratorStats {
        let cache = match &self.shared.cache {
            Some(c) => c.stats().await,
            None => CacheStats::default(),
        };
        OrchestratorStats {
            cache_enabled: self.shared.cache.is_some(),
            cache,
            queue: self.queue.stats(),
            rate_limiter: self.shared.limiter.snapshot().await,
            requests: self.shared.counters.snapshot(),
            destroyed: self.is_destroyed(),
        }
    }

    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.shared.cache {
            cache.clear().await;
            debug!("response cache cleared");
        }
    }

    pub async fn reset_rate_limiter(&self) {
        self.shared.limiter.reset().await;
        debug!("rate limiter reset");
    }

    /// Stop the cache sweep and drop queued work. Safe to call repeatedly.
    ///
    /// Requests already running finish normally; their callers still get results.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut handle) = sweeper.take() {
            handle.stop();
        }
        let dropped = self.queue.close();
        info!(dropped, "orchestrator destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn backend_name(&self) -> &str {
        self.shared.backend.name()
    }

    fn destroyed_error() -> Error {
        Error::cancelled("orchestrator has been destroyed")
            .with_context(ErrorContext::new().with_source("orchestrator"))
    }
}
