//! HTTP delivery to a collector.

mod common;

use common::{init_test_logging, quiet_config};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use vigil_core::VigilError;
use vigil_diagnostics::{
    Diagnostics, DiagnosticsConfig, FaultCategory, FaultEvent, HttpTransport, NoopNotifier,
    RawFault, Transport,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload() -> vigil_diagnostics::WirePayload {
    let event = FaultEvent::new(RawFault::new(FaultCategory::Runtime, "boom"), "friendly");
    event.to_wire(&quiet_config().wire_metadata())
}

#[tokio::test]
async fn test_posts_json_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/errors"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "type": "runtime",
            "message": "boom",
            "url": "app://tests",
            "userAgent": "vigil-tests/1.0",
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(
        format!("{}/api/errors", server.uri()),
        Duration::from_secs(5),
        "vigil-tests/1.0",
    )
    .unwrap();

    assert_ok!(transport.send(&payload()).await);
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transport =
        HttpTransport::new(server.uri(), Duration::from_secs(5), "vigil-tests/1.0").unwrap();
    let err = assert_err!(transport.send(&payload()).await);
    assert!(matches!(err, VigilError::Delivery { status: 500, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_collector_is_a_network_error() {
    let transport = HttpTransport::new(
        "http://127.0.0.1:1/api/errors",
        Duration::from_secs(5),
        "vigil-tests/1.0",
    )
    .unwrap();
    let err = assert_err!(transport.send(&payload()).await);
    assert!(matches!(err, VigilError::Network(_) | VigilError::Timeout(_)));
}

#[tokio::test]
async fn test_end_to_end_delivery() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/errors"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let config = DiagnosticsConfig {
        collector_url: format!("{}/api/errors", server.uri()),
        ..quiet_config()
    };
    let diagnostics = Diagnostics::with_http_transport(config, Arc::new(NoopNotifier)).unwrap();
    diagnostics.report(RawFault::new(FaultCategory::Promise, "rejected"));
    diagnostics.report(RawFault::new(FaultCategory::Runtime, "boom"));

    let report = diagnostics.flush().await;
    assert_eq!(report.delivered, 2);
    assert_eq!(diagnostics.queue_len(), 0);

    let requests = server.received_requests().await.unwrap();
    let kinds: Vec<String> = requests
        .iter()
        .map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).unwrap()["type"].to_string())
        .collect();
    assert_eq!(kinds, ["\"promise\"", "\"runtime\""]);
}
