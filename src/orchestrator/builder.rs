use super::core::{AnalysisOrchestrator, Shared};
use super::stats::RequestCounters;
use crate::backend::{stored_api_key, AnalysisBackend, HttpBackend};
use crate::cache::{CacheBackend, CacheKeyGenerator, MemoryCache, ResponseCache};
use crate::config::OrchestratorConfig;
use crate::prompt::{PromptBuilder, RulePromptBuilder};
use crate::queue::RequestQueue;
use crate::resilience::rate_limiter::RateLimiter;
use crate::resilience::retry::{RetryClassifier, RetryListener, RetryPolicy};
use crate::Result;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Builder for [`AnalysisOrchestrator`].
///
/// Everything except the configuration is optional: the HTTP backend, the
/// rule prompt builder and an in-memory cache are used when nothing else is
/// injected.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    backend: Option<Arc<dyn AnalysisBackend>>,
    prompts: Option<Arc<dyn PromptBuilder>>,
    cache_backend: Option<Box<dyn CacheBackend>>,
    retry_classifier: Option<Arc<dyn RetryClassifier>>,
    retry_listener: Option<RetryListener>,
    key_lookup: Option<KeyLookup>,
}

/// Fallback credential source for the default HTTP backend.
pub type KeyLookup = Box<dyn FnOnce() -> Option<String> + Send>;

impl OrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            backend: None,
            prompts: None,
            cache_backend: None,
            retry_classifier: None,
            retry_listener: None,
            key_lookup: None,
        }
    }

    /// Start from defaults with `ANALYSIS_*` environment overrides.
    pub fn from_env() -> Self {
        Self::new(OrchestratorConfig::from_env())
    }

    pub fn backend(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn prompt_builder(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Replace the in-memory cache store.
    pub fn cache_backend(mut self, backend: Box<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn retry_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.retry_classifier = Some(classifier);
        self
    }

    /// Observe scheduled retries. The listener cannot change the outcome.
    pub fn retry_listener(mut self, listener: RetryListener) -> Self {
        self.retry_listener = Some(listener);
        self
    }

    /// Replace the keyring and environment lookup used when the config has
    /// no API key. Ignored when a backend is injected.
    pub fn api_key_lookup(mut self, lookup: KeyLookup) -> Self {
        self.key_lookup = Some(lookup);
        self
    }

    /// Validate the configuration and assemble the components.
    ///
    /// Must run inside a tokio runtime: the cache sweep is spawned here.
    pub async fn build(self) -> Result<AnalysisOrchestrator> {
        let config = self.config;
        config.validate()?;

        let backend: Arc<dyn AnalysisBackend> = match self.backend {
            Some(b) => b,
            None => {
                let lookup: KeyLookup = match self.key_lookup {
                    Some(lookup) => lookup,
                    None => Box::new(stored_api_key),
                };
                Arc::new(HttpBackend::with_key_lookup(&config, lookup)?)
            }
        };
        let prompts: Arc<dyn PromptBuilder> = match self.prompts {
            Some(p) => p,
            None => Arc::new(RulePromptBuilder::new()),
        };

        let cache = if config.enable_cache {
            let store: Box<dyn CacheBackend> = match self.cache_backend {
                Some(store) => store,
                None => Box::new(MemoryCache::new(config.cache_max_entries)),
            };
            Some(Arc::new(
                ResponseCache::new(config.cache_config(), store)
                    .with_key_generator(CacheKeyGenerator::new().with_salt(config.model.clone())),
            ))
        } else {
            None
        };
        let sweeper = cache
            .as_ref()
            .map(|c| c.spawn_sweeper(config.cache_sweep_interval));

        let mut retry = RetryPolicy::new(config.retry_config());
        if let Some(classifier) = self.retry_classifier {
            retry = retry.with_classifier(classifier);
        }
        if let Some(listener) = self.retry_listener {
            retry = retry.with_listener(listener);
        }

        debug!(
            backend = backend.name(),
            model = config.model.as_str(),
            cache = config.enable_cache,
            max_concurrency = config.max_concurrency,
            "orchestrator built"
        );

        Ok(AnalysisOrchestrator {
            shared: Arc::new(Shared {
                backend,
                prompts,
                params: config.model_params(),
                cache,
                limiter: Arc::new(RateLimiter::new(config.rate_limiter_config())),
                retry,
                counters: RequestCounters::default(),
            }),
            queue: RequestQueue::new(config.queue_config()),
            sweeper: Mutex::new(sweeper),
            destroyed: AtomicBool::new(false),
        })
    }
}
