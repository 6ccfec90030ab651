//! End-to-end orchestrator behaviour against an in-process stub backend.

use analysis_orchestrator::resilience::retry::RetryEvent;
use analysis_orchestrator::{
    AnalysisBackend, AnalysisOptions, AnalysisOrchestrator, AnalysisRequest, AnalysisResult, Error,
    ModelParams, OrchestratorBuilder, OrchestratorConfig, Prompt, StandardErrorCode,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

const CLEAN_RESPONSE: &str = r#"```json
{"issues": [], "suggestions": [], "metrics": {"complexity": 1, "maintainability": 100, "linesOfCode": 1, "duplicateLines": 0}}
```"#;

/// Counts calls and peak parallelism; fails according to a script, then succeeds.
struct StubBackend {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    latency: Duration,
    failures: Mutex<VecDeque<Error>>,
    gate: Option<Arc<Semaphore>>,
    reply: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl StubBackend {
    fn new(reply: &'static str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            latency: Duration::ZERO,
            failures: Mutex::new(VecDeque::new()),
            gate: None,
            reply: Box::new(move |_: &str| reply.to_string()),
        }
    }

    fn echoing() -> Self {
        let mut stub = Self::new("");
        stub.reply = Box::new(|user: &str| {
            json!({"issues": [], "suggestions": [], "metrics": {"echo": user}}).to_string()
        });
        stub
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn fail_with(self, errors: impl IntoIterator<Item = Error>) -> Self {
        self.failures.lock().unwrap().extend(errors);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisBackend for StubBackend {
    async fn call(&self, _system: &str, user: &str, _params: &ModelParams) -> analysis_orchestrator::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let scripted = self.failures.lock().unwrap().pop_front();
        match scripted {
            Some(err) => Err(err),
            None => Ok((self.reply)(user)),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

async fn build(config: OrchestratorConfig, backend: Arc<StubBackend>) -> AnalysisOrchestrator {
    OrchestratorBuilder::new(config)
        .backend(backend)
        .build()
        .await
        .expect("orchestrator should build")
}

fn js_security() -> AnalysisOptions {
    AnalysisOptions::new("javascript").with_rule("security")
}

#[tokio::test]
async fn test_repeat_request_is_served_from_cache() {
    let backend = Arc::new(StubBackend::new(CLEAN_RESPONSE));
    let orch = build(OrchestratorConfig::new(), backend.clone()).await;

    let expected = AnalysisResult {
        issues: vec![],
        suggestions: vec![],
        metrics: json!({"complexity": 1, "maintainability": 100, "linesOfCode": 1, "duplicateLines": 0})
            .as_object()
            .cloned()
            .unwrap(),
    };

    let first = orch.analyze("const x=1;", js_security()).await.unwrap();
    assert_eq!(first, expected);
    let second = orch.analyze("const x=1;", js_security()).await.unwrap();
    assert_eq!(second, expected);
    assert_eq!(backend.calls(), 1);

    let stats = orch.stats().await;
    assert_eq!(stats.requests.requests, 2);
    assert_eq!(stats.requests.cache_hits, 1);
    assert_eq!(stats.requests.backend_calls, 1);
    assert_eq!(stats.cache.size, 1);
    assert_eq!(stats.queue.completed, 1);
    orch.destroy();
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_calls_back_off_then_succeed() {
    let backend = Arc::new(
        StubBackend::new(CLEAN_RESPONSE)
            .fail_with([Error::remote(429, "slow down"), Error::remote(429, "slow down")]),
    );
    let delays = Arc::new(Mutex::new(Vec::<Duration>::new()));
    let sink = delays.clone();

    let config = OrchestratorConfig::new().with_backoff(
        Duration::from_millis(100),
        Duration::from_millis(1_000),
        2.0,
    );
    let orch = OrchestratorBuilder::new(config)
        .backend(backend.clone())
        .retry_listener(Arc::new(move |event: &RetryEvent| {
            assert_eq!(event.code, StandardErrorCode::RateLimited);
            sink.lock().unwrap().push(event.delay);
        }))
        .build()
        .await
        .unwrap();

    let start = tokio::time::Instant::now();
    let result = orch.analyze("const x=1;", js_security()).await.unwrap();
    assert!(result.issues.is_empty());
    assert_eq!(backend.calls(), 3);

    let delays = delays.lock().unwrap().clone();
    assert_eq!(delays.len(), 2);
    assert!(delays[0] >= Duration::from_millis(100));
    assert!(delays[0] < delays[1], "delays must grow: {:?}", delays);
    assert!(delays[1] <= Duration::from_millis(1_100));
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_batch_respects_concurrency_ceiling_and_input_order() {
    let backend = Arc::new(StubBackend::echoing().with_latency(Duration::from_millis(50)));
    let orch = OrchestratorBuilder::new(OrchestratorConfig::new().with_max_concurrency(3))
        .backend(backend.clone())
        .prompt_builder(Arc::new(|req: &AnalysisRequest| {
            Prompt::new("system", req.content.clone())
        }))
        .build()
        .await
        .unwrap();

    let items: Vec<AnalysisRequest> = (0..10)
        .map(|i| AnalysisRequest::new(format!("let v{} = {};", i, i), js_security()))
        .collect();
    let results = orch.analyze_batch(items.clone()).await;

    assert_eq!(results.len(), 10);
    for (item, result) in items.iter().zip(results) {
        let result = result.unwrap();
        assert_eq!(result.metrics["echo"], json!(item.content));
    }
    assert_eq!(backend.calls(), 10);
    assert!(backend.peak() <= 3, "peak was {}", backend.peak());
    assert_eq!(backend.peak(), 3);
}

#[tokio::test]
async fn test_non_retryable_error_fails_fast_and_is_not_cached() {
    let backend = Arc::new(
        StubBackend::new(CLEAN_RESPONSE).fail_with([Error::remote(401, "invalid x-api-key")]),
    );
    let orch = build(OrchestratorConfig::new(), backend.clone()).await;

    let err = orch.analyze("a", js_security()).await.unwrap_err();
    assert_eq!(err.standard_code(), StandardErrorCode::Authentication);
    assert_eq!(err.attempts(), Some(1));
    assert_eq!(backend.calls(), 1);

    orch.analyze("a", js_security()).await.unwrap();
    assert_eq!(backend.calls(), 2);

    let stats = orch.stats().await;
    assert_eq!(stats.requests.failures, 1);
    assert_eq!(stats.requests.cache_hits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhaust_after_max_retries() {
    let backend = Arc::new(StubBackend::new(CLEAN_RESPONSE).fail_with(
        (0..5).map(|_| Error::remote(503, "overloaded")),
    ));
    let config = OrchestratorConfig::new()
        .with_max_retries(2)
        .with_backoff(Duration::from_millis(10), Duration::from_millis(40), 2.0);
    let orch = build(config, backend.clone()).await;

    let err = orch.analyze("a", js_security()).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.attempts(), Some(3));
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_malformed_response_is_not_retried() {
    let backend = Arc::new(StubBackend::new("{\"issues\": []}"));
    let orch = build(OrchestratorConfig::new(), backend.clone()).await;

    let err = orch.analyze("a", js_security()).await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }));
    assert_eq!(backend.calls(), 1);
    assert_eq!(orch.stats().await.cache.size, 0);
}

#[tokio::test]
async fn test_disabled_cache_always_calls_backend() {
    let backend = Arc::new(StubBackend::new(CLEAN_RESPONSE));
    let orch = build(OrchestratorConfig::new().with_cache(false), backend.clone()).await;

    orch.analyze("a", js_security()).await.unwrap();
    orch.analyze("a", js_security()).await.unwrap();
    assert_eq!(backend.calls(), 2);
    assert!(!orch.stats().await.cache_enabled);
}

#[tokio::test]
async fn test_clear_cache_forces_fresh_call() {
    let backend = Arc::new(StubBackend::new(CLEAN_RESPONSE));
    let orch = build(OrchestratorConfig::new(), backend.clone()).await;

    orch.analyze("a", js_security()).await.unwrap();
    orch.clear_cache().await;
    orch.analyze("a", js_security()).await.unwrap();
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_rule_order_does_not_defeat_cache() {
    let backend = Arc::new(StubBackend::new(CLEAN_RESPONSE));
    let orch = build(OrchestratorConfig::new(), backend.clone()).await;

    let a = AnalysisOptions::new("javascript").with_rules(["security", "style"]);
    let b = AnalysisOptions::new("javascript").with_rules(["style", "security"]);
    orch.analyze("a", a).await.unwrap();
    orch.analyze("a", b).await.unwrap();
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limiter_throttles_and_resets() {
    let backend = Arc::new(StubBackend::new(CLEAN_RESPONSE));
    let config = OrchestratorConfig::new().with_cache(false).with_rate_limit(2, 1.0);
    let orch = build(config, backend.clone()).await;

    let start = tokio::time::Instant::now();
    for i in 0..3 {
        orch.analyze(format!("v{}", i), js_security()).await.unwrap();
    }
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(orch.stats().await.rate_limiter.tokens, 0.0);

    orch.reset_rate_limiter().await;
    let snapshot = orch.stats().await.rate_limiter;
    assert_eq!(snapshot.tokens, 2.0);
    assert_eq!(snapshot.estimated_wait_ms, None);
}

#[tokio::test]
async fn test_destroy_drops_pending_work_and_rejects_new_calls() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(StubBackend::new(CLEAN_RESPONSE).with_gate(gate.clone()));
    let orch = Arc::new(
        build(
            OrchestratorConfig::new().with_max_concurrency(1).with_cache(false),
            backend.clone(),
        )
        .await,
    );

    let mut handles = Vec::new();
    for i in 0..3 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            orch.analyze(format!("v{}", i), js_security()).await
        }));
    }

    for _ in 0..1_000 {
        let q = orch.stats().await.queue;
        if q.processing == 1 && q.queued == 2 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(orch.stats().await.queue.queued, 2);

    orch.destroy();
    orch.destroy();
    gate.add_permits(1);

    let mut outcomes = Vec::new();
    for h in handles {
        outcomes.push(h.await.unwrap());
    }
    assert!(outcomes[0].is_ok(), "in-flight request should finish");
    for outcome in &outcomes[1..] {
        let err = outcome.as_ref().unwrap_err();
        assert_eq!(err.standard_code(), StandardErrorCode::Cancelled);
    }
    assert_eq!(backend.calls(), 1);

    let err = orch.analyze("late", js_security()).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled { .. }));
    let stats = orch.stats().await;
    assert!(stats.destroyed);
    assert_eq!(stats.queue.dropped, 2);
}

#[tokio::test]
async fn test_invalid_config_fails_build() {
    let backend = Arc::new(StubBackend::new(CLEAN_RESPONSE));
    let result = OrchestratorBuilder::new(OrchestratorConfig::new().with_temperature(2.0))
        .backend(backend)
        .build()
        .await;
    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[tokio::test]
async fn test_missing_api_key_fails_build() {
    let result = OrchestratorBuilder::new(OrchestratorConfig::new())
        .api_key_lookup(Box::new(|| None))
        .build()
        .await;
    match result {
        Err(err @ Error::Configuration { .. }) => {
            assert!(err.to_string().contains("API key"));
        }
        Err(other) => panic!("expected configuration error, got {other:?}"),
        Ok(_) => panic!("build should fail without an API key"),
    }
}
