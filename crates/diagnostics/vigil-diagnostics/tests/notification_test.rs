//! Notification routing and throttling.

mod common;

use common::{quiet_config, MockCollector, MockPresenter};
use mockall::predicate::{always, eq};
use std::sync::Arc;
use std::time::Duration;
use vigil_diagnostics::classifier::NETWORK_MESSAGE;
use vigil_diagnostics::{Diagnostics, DiagnosticsConfig, FaultCategory, RawFault};

fn notifying_config() -> DiagnosticsConfig {
    DiagnosticsConfig {
        notify_user: true,
        start_online: false,
        ..quiet_config()
    }
}

fn idle_transport() -> Arc<MockCollector> {
    let mut transport = MockCollector::new();
    transport.expect_send().times(0);
    Arc::new(transport)
}

#[tokio::test(start_paused = true)]
async fn test_burst_is_throttled_but_fully_queued() {
    let mut presenter = MockPresenter::new();
    presenter
        .expect_show_error()
        .with(eq(NETWORK_MESSAGE), eq(Some(Duration::from_millis(5_000))))
        .times(3)
        .return_const(());
    presenter.expect_show_info().times(0);

    let diagnostics =
        Diagnostics::new(notifying_config(), idle_transport(), Arc::new(presenter)).unwrap();
    for _ in 0..10 {
        diagnostics.report(RawFault::new(FaultCategory::Network, "TypeError: Failed to fetch"));
    }

    assert_eq!(diagnostics.queue_len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_window_slides() {
    let mut presenter = MockPresenter::new();
    presenter.expect_show_error().with(always(), always()).times(4).return_const(());

    let diagnostics =
        Diagnostics::new(notifying_config(), idle_transport(), Arc::new(presenter)).unwrap();
    for _ in 0..5 {
        diagnostics.report(RawFault::new(FaultCategory::Runtime, "boom"));
    }

    tokio::time::advance(Duration::from_secs(10)).await;
    diagnostics.report(RawFault::new(FaultCategory::Runtime, "boom again"));

    assert_eq!(diagnostics.queue_len(), 6);
}

#[tokio::test]
async fn test_performance_faults_are_informational() {
    let mut presenter = MockPresenter::new();
    presenter.expect_show_info().times(1).return_const(());
    presenter.expect_show_error().times(0);

    let diagnostics =
        Diagnostics::new(notifying_config(), idle_transport(), Arc::new(presenter)).unwrap();
    diagnostics.record_latency("https://api.test/slow", Duration::from_secs(11));

    let pending = diagnostics.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].category(), FaultCategory::Performance);
}

#[tokio::test]
async fn test_notifications_can_be_disabled() {
    let mut presenter = MockPresenter::new();
    presenter.expect_show_error().times(0);
    presenter.expect_show_info().times(0);

    let config = DiagnosticsConfig {
        notify_user: false,
        ..notifying_config()
    };
    let diagnostics = Diagnostics::new(config, idle_transport(), Arc::new(presenter)).unwrap();
    diagnostics.report(RawFault::new(FaultCategory::Runtime, "boom"));

    assert_eq!(diagnostics.queue_len(), 1);
}
