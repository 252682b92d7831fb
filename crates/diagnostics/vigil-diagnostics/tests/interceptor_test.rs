//! The intercepted client against a real HTTP server.

mod common;

use common::{diagnostics_with, init_test_logging, quiet_config, RecordingTransport};
use std::sync::Arc;
use std::time::Duration;
use vigil_diagnostics::{DiagnosticsConfig, FaultCategory, HttpExecutor};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_error_response_is_returned_unchanged() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/42"))
        .respond_with(
            ResponseTemplate::new(503)
                .insert_header("retry-after", "30")
                .set_body_string("maintenance"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let diagnostics = diagnostics_with(quiet_config(), Arc::new(RecordingTransport::default()));
    let client = diagnostics.intercept(reqwest::Client::new());
    let url = format!("{}/orders/42", server.uri());

    let response = client.send(client.get(&url)).await.unwrap();
    assert_eq!(response.status().as_u16(), 503);
    assert_eq!(response.headers()["retry-after"], "30");
    assert_eq!(response.text().await.unwrap(), "maintenance");

    let pending = diagnostics.pending();
    assert_eq!(pending.len(), 1);
    let event = &pending[0];
    assert_eq!(event.category(), FaultCategory::Api);
    assert_eq!(event.raw_message(), format!("API Error: 503 Service Unavailable (GET {url})"));
    assert_eq!(event.context().request_url.as_deref(), Some(url.as_str()));
    assert_eq!(event.context().status, Some(503));

    let samples = diagnostics.latency_samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].url, url);
}

#[tokio::test]
async fn test_successful_calls_record_one_sample_each() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(3)
        .mount(&server)
        .await;

    let diagnostics = diagnostics_with(quiet_config(), Arc::new(RecordingTransport::default()));
    let client = diagnostics.intercept(reqwest::Client::new());
    let url = format!("{}/events", server.uri());

    for _ in 0..3 {
        let response = client.send(client.post(&url).body("{}")).await.unwrap();
        assert_eq!(response.status().as_u16(), 201);
        assert_eq!(response.text().await.unwrap(), "created");
    }

    assert!(diagnostics.pending().is_empty());
    assert_eq!(diagnostics.performance().sample_count, 3);
}

#[tokio::test]
async fn test_transport_error_becomes_network_fault() {
    init_test_logging();
    let diagnostics = diagnostics_with(quiet_config(), Arc::new(RecordingTransport::default()));
    let client = diagnostics.intercept(reqwest::Client::new());

    // Nothing listens on port 1
    let request = reqwest::Client::new().get("http://127.0.0.1:1/unreachable").build().unwrap();
    let err = client.execute(request).await.unwrap_err();
    assert!(err.is_connect() || err.is_request());

    let pending = diagnostics.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].category(), FaultCategory::Network);
    assert!(pending[0].raw_message().starts_with("Network Error:"));
    assert_eq!(
        pending[0].context().request_url.as_deref(),
        Some("http://127.0.0.1:1/unreachable")
    );
    assert_eq!(diagnostics.performance().sample_count, 1);
}

#[tokio::test]
async fn test_slow_call_adds_performance_fault() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let config = DiagnosticsConfig {
        api_threshold_ms: 50,
        ..quiet_config()
    };
    let diagnostics = diagnostics_with(config, Arc::new(RecordingTransport::default()));
    let client = diagnostics.intercept(reqwest::Client::new());

    let response = client.send(client.get(&format!("{}/slow", server.uri()))).await.unwrap();
    assert!(response.status().is_success());

    let pending = diagnostics.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].category(), FaultCategory::Performance);
    assert!(pending[0].raw_message().starts_with("Slow API response:"));
}
