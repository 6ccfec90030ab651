//! Benchmarks for the cache hot path
//!
//! This benchmark measures:
//! - Fingerprint cost as content grows
//! - Canonicalization cost of nested options
//! - Response parsing of fenced payloads
//! - End-to-end cache hit latency

use analysis_orchestrator::cache::{CacheConfig, CacheKeyGenerator, MemoryCache, ResponseCache};
use analysis_orchestrator::response::parse_analysis;
use analysis_orchestrator::{AnalysisOptions, AnalysisResult};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

const FENCED_REPLY: &str = r#"Review complete.
```json
{"issues": [{"rule": "security", "severity": "high", "line": 12, "message": "eval of user input"},
            {"rule": "style", "severity": "low", "line": 3, "message": "prefer const"}],
 "suggestions": ["replace eval with JSON.parse", "enable strict mode"],
 "metrics": {"complexity": 7, "maintainability": 64, "linesOfCode": 120, "duplicateLines": 4}}
```"#;

fn source_of(len: usize) -> String {
    "let value = compute(input) + 1;\n"
        .chars()
        .cycle()
        .take(len)
        .collect()
}

fn bench_fingerprint(c: &mut Criterion) {
    let keys = CacheKeyGenerator::new().with_salt("claude-3-5-sonnet-latest");
    let options = AnalysisOptions::new("javascript").with_rules(["security", "style", "performance"]);

    let mut group = c.benchmark_group("fingerprint");
    for len in [256usize, 4 * 1024, 64 * 1024] {
        let content = source_of(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("content_bytes", len), &content, |b, content| {
            b.iter(|| keys.fingerprint(black_box(content), black_box(&options)).unwrap())
        });
    }
    group.finish();
}

fn bench_canonical_options(c: &mut Criterion) {
    let keys = CacheKeyGenerator::new();
    let nested = json!({
        "rules": ["security", "style"],
        "language": "typescript",
        "overrides": {"z": {"b": 2, "a": 1}, "a": [{"y": 1, "x": 2}]}
    });

    c.bench_function("fingerprint_nested_options", |b| {
        b.iter(|| keys.fingerprint(black_box("x"), black_box(&nested)).unwrap())
    });
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("response");
    group.throughput(Throughput::Bytes(FENCED_REPLY.len() as u64));
    group.bench_function("parse_fenced", |b| {
        b.iter(|| parse_analysis(black_box(FENCED_REPLY)).unwrap())
    });
    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache: ResponseCache<AnalysisResult> =
        ResponseCache::new(CacheConfig::new(), Box::new(MemoryCache::new(1024)));
    let options = AnalysisOptions::new("javascript").with_rule("security");
    let content = source_of(4 * 1024);
    let result = parse_analysis(FENCED_REPLY).unwrap();
    rt.block_on(cache.set(&content, &result, &options, None));

    c.bench_function("cache_hit_4k", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(cache.get(&content, &options).await.unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_fingerprint,
    bench_canonical_options,
    bench_parse,
    bench_cache_hit
);
criterion_main!(benches);
