//! Analyze a single snippet against the live backend.
//!
//! Requires an API key in `ANTHROPIC_API_KEY` (or the OS keyring).
//! Tune behaviour with `ANALYSIS_*` variables, e.g. `ANALYSIS_MODEL`.
//!
//! ```text
//! RUST_LOG=analysis_orchestrator=debug cargo run --example analyze_snippet
//! ```

use analysis_orchestrator::{AnalysisOptions, OrchestratorBuilder};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

const SNIPPET: &str = r#"
function login(user, password) {
    const query = "SELECT * FROM users WHERE name = '" + user + "'";
    return db.exec(query).then(rows => rows[0].password == password);
}
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("analysis_orchestrator=info")),
        )
        .init();

    let orchestrator = OrchestratorBuilder::from_env()
        .build()
        .await
        .context("failed to build orchestrator")?;

    let options = AnalysisOptions::new("javascript").with_rules(["security", "style"]);
    let result = orchestrator
        .analyze(SNIPPET, options.clone())
        .await
        .context("analysis failed")?;

    println!("issues ({}):", result.issues.len());
    for issue in &result.issues {
        println!("  - {}", issue);
    }
    println!("suggestions:");
    for suggestion in &result.suggestions {
        println!("  - {}", suggestion);
    }
    println!("metrics: {}", serde_json::Value::Object(result.metrics.clone()));

    // identical request: answered from cache
    orchestrator.analyze(SNIPPET, options).await?;
    let stats = orchestrator.stats().await;
    println!(
        "\nrequests={} cache_hits={} backend_calls={}",
        stats.requests.requests, stats.requests.cache_hits, stats.requests.backend_calls
    );

    orchestrator.destroy();
    Ok(())
}
