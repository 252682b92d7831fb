//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;
use vigil_core::VigilResult;
use vigil_diagnostics::{Diagnostics, DiagnosticsConfig, Notifier, Transport, WirePayload};

/// Initialize test logging
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("vigil_diagnostics=debug"))
        .with_test_writer()
        .try_init();
}

mock! {
    pub Collector {}

    #[async_trait]
    impl Transport for Collector {
        async fn send(&self, payload: &WirePayload) -> VigilResult<()>;
    }
}

mock! {
    pub Presenter {}

    impl Notifier for Presenter {
        fn show_error(&self, message: &str, duration: Option<Duration>);
        fn show_info(&self, message: &str, duration: Option<Duration>);
    }
}

/// Configuration with background flushing and notifications off
pub fn quiet_config() -> DiagnosticsConfig {
    DiagnosticsConfig {
        app_url: "app://tests".to_string(),
        user_agent: "vigil-tests/1.0".to_string(),
        auto_flush: false,
        notify_user: false,
        flush_pacing_ms: 0,
        capture_backtraces: false,
        ..DiagnosticsConfig::default()
    }
}

/// Context over `transport` that never notifies
pub fn diagnostics_with(
    config: DiagnosticsConfig,
    transport: Arc<dyn Transport>,
) -> Arc<Diagnostics> {
    Diagnostics::new(config, transport, Arc::new(vigil_diagnostics::NoopNotifier))
        .expect("test configuration is valid")
}

/// Transport that records every payload and always succeeds
#[derive(Default)]
pub struct RecordingTransport {
    pub payloads: Mutex<Vec<WirePayload>>,
    pub sent: Notify,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, payload: &WirePayload) -> VigilResult<()> {
        self.payloads.lock().push(payload.clone());
        self.sent.notify_one();
        Ok(())
    }
}

/// Transport whose first send blocks until released
#[derive(Default)]
pub struct GatedTransport {
    pub started: Notify,
    pub release: Notify,
    pub sends: Mutex<usize>,
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(&self, _payload: &WirePayload) -> VigilResult<()> {
        let first = {
            let mut sends = self.sends.lock();
            *sends += 1;
            *sends == 1
        };
        if first {
            self.started.notify_one();
            self.release.notified().await;
        }
        Ok(())
    }
}
