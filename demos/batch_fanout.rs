//! Fan out a batch through a scripted local backend.
//!
//! Runs offline: the backend is simulated, so the demo shows queueing,
//! throttling and retry behaviour without network access.
//!
//! ```text
//! RUST_LOG=analysis_orchestrator=debug cargo run --example batch_fanout
//! ```

use analysis_orchestrator::resilience::retry::RetryEvent;
use analysis_orchestrator::{
    AnalysisBackend, AnalysisOptions, AnalysisRequest, Error, ModelParams, OrchestratorBuilder,
    OrchestratorConfig,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Every fourth call is rejected with a 503; the rest succeed after a short delay.
struct FlakyBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl AnalysisBackend for FlakyBackend {
    async fn call(
        &self,
        _system: &str,
        user: &str,
        _params: &ModelParams,
    ) -> analysis_orchestrator::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        if n % 4 == 3 {
            return Err(Error::remote(503, "temporarily overloaded"));
        }
        Ok(format!(
            r#"{{"issues": [], "suggestions": [], "metrics": {{"linesOfCode": {}}}}}"#,
            user.lines().count()
        ))
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("analysis_orchestrator=info")),
        )
        .init();

    let config = OrchestratorConfig::new()
        .with_max_concurrency(3)
        .with_rate_limit(5, 10.0)
        .with_backoff(Duration::from_millis(100), Duration::from_secs(2), 2.0);

    let orchestrator = OrchestratorBuilder::new(config)
        .backend(Arc::new(FlakyBackend {
            calls: AtomicUsize::new(0),
        }))
        .retry_listener(Arc::new(|event: &RetryEvent| {
            println!(
                "  retry #{} in {:?} ({})",
                event.attempt,
                event.delay,
                event.code.name()
            );
        }))
        .build()
        .await?;

    let items: Vec<AnalysisRequest> = (0..12)
        .map(|i| {
            AnalysisRequest::new(
                "let x = 1;\n".repeat(i + 1),
                AnalysisOptions::new("rust").with_rule("style"),
            )
        })
        .collect();

    let start = Instant::now();
    let results = orchestrator.analyze_batch(items).await;
    println!("batch finished in {:?}", start.elapsed());

    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(r) => println!("  item {:2}: ok, metrics={:?}", i, r.metrics),
            Err(e) => println!("  item {:2}: {}", i, e),
        }
    }

    let stats = orchestrator.stats().await;
    println!(
        "\nbackend_calls={} failures={} peak_queue_capacity={} tokens_left={:.1}",
        stats.requests.backend_calls,
        stats.requests.failures,
        stats.queue.max_concurrency,
        stats.rate_limiter.tokens
    );

    orchestrator.destroy();
    Ok(())
}
