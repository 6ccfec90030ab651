//! HTTP backend against a local mock server.

use analysis_orchestrator::error::NetworkErrorKind;
use analysis_orchestrator::{
    AnalysisBackend, AnalysisOptions, Error, HttpBackend, ModelParams, OrchestratorBuilder,
    OrchestratorConfig, StandardErrorCode,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn config_for(base_url: &str) -> OrchestratorConfig {
    OrchestratorConfig::new()
        .with_api_key("test-key")
        .with_base_url(base_url)
        .with_request_timeout(Duration::from_secs(5))
}

fn messages_body(text: &str) -> String {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn"
    })
    .to_string()
}

#[tokio::test]
async fn test_call_sends_headers_and_concatenates_text_blocks() {
    let mut server = Server::new_async().await;
    let body = json!({
        "content": [
            {"type": "text", "text": "part one, "},
            {"type": "tool_use", "id": "t1", "name": "noop", "input": {}},
            {"type": "text", "text": "part two"}
        ]
    })
    .to_string();
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .match_header("anthropic-version", "2023-06-01")
        .match_header(
            "x-request-id",
            Matcher::Regex("^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[0-9a-f]{4}-[0-9a-f]{12}$".into()),
        )
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-test",
            "max_tokens": 256,
            "system": "be strict",
            "messages": [{"role": "user", "content": "review this"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(1)
        .create_async()
        .await;

    let backend = HttpBackend::new(&config_for(&server.url())).unwrap();
    let params = ModelParams {
        model: "claude-test".into(),
        temperature: 0.0,
        max_tokens: 256,
    };
    let text = assert_ok!(backend.call("be strict", "review this", &params).await);
    assert_eq!(text, "part one, part two");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_maps_to_retryable_remote_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_header("retry-after", "2")
        .with_body(r#"{"type":"error","error":{"type":"rate_limit_error","message":"Number of requests has exceeded your rate limit"}}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(&config_for(&server.url())).unwrap();
    let err = assert_err!(backend.call("s", "u", &ModelParams::default()).await);

    match &err {
        Error::Remote {
            status,
            code,
            retry_after_ms,
            message,
            context,
        } => {
            assert_eq!(*status, 429);
            assert_eq!(*code, StandardErrorCode::RateLimited);
            assert_eq!(*retry_after_ms, Some(2000));
            assert!(message.contains("rate limit"));
            assert!(context.request_id.is_some());
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_authentication_failure_is_not_retryable() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(401)
        .with_body(r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(&config_for(&server.url())).unwrap();
    let err = assert_err!(backend.call("s", "u", &ModelParams::default()).await);
    assert_eq!(err.standard_code(), StandardErrorCode::Authentication);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_non_json_success_body_is_malformed() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let backend = HttpBackend::new(&config_for(&server.url())).unwrap();
    let err = assert_err!(backend.call("s", "u", &ModelParams::default()).await);
    assert_eq!(err.standard_code(), StandardErrorCode::MalformedResponse);
}

#[tokio::test]
async fn test_unreachable_host_is_a_network_error() {
    // nothing listens on port 1
    let backend = HttpBackend::new(&config_for("http://127.0.0.1:1")).unwrap();
    let err = assert_err!(backend.call("s", "u", &ModelParams::default()).await);
    match err {
        Error::Network { kind, .. } => assert_ne!(kind, NetworkErrorKind::DnsFailure),
        other => panic!("expected network error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_orchestrator_over_http_caches_second_call() {
    let mut server = Server::new_async().await;
    let reply = "```json\n{\"issues\": [{\"rule\": \"security\", \"line\": 1}], \"suggestions\": [], \"metrics\": {\"complexity\": 1}}\n```";
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(messages_body(reply))
        .expect(1)
        .create_async()
        .await;

    let orch = assert_ok!(OrchestratorBuilder::new(config_for(&server.url())).build().await);
    assert_eq!(orch.backend_name(), "http");

    let opts = AnalysisOptions::new("javascript").with_rule("security");
    let first = orch.analyze("eval(x)", opts.clone()).await.unwrap();
    let second = orch.analyze("eval(x)", opts).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.issues.len(), 1);

    mock.assert_async().await;
    orch.destroy();
}
