//! Panic and rejection capture.
//!
//! The panic hook is process-wide, so every panic scenario lives in a single
//! test to keep them from racing each other.

mod common;

use common::{diagnostics_with, init_test_logging, quiet_config, RecordingTransport};
use std::io;
use std::panic;
use std::sync::Arc;
use vigil_diagnostics::capture::{UNKNOWN_PANIC_MESSAGE, UNKNOWN_REJECTION_MESSAGE};
use vigil_diagnostics::{DiagnosticsConfig, FaultCategory};

#[test]
fn test_panics_are_captured_without_reraising() {
    init_test_logging();
    let first = diagnostics_with(
        DiagnosticsConfig {
            capture_backtraces: true,
            ..quiet_config()
        },
        Arc::new(RecordingTransport::default()),
    );
    let second = diagnostics_with(quiet_config(), Arc::new(RecordingTransport::default()));

    // Not installed yet
    let _ = panic::catch_unwind(|| panic!("before install"));
    assert_eq!(first.queue_len(), 0);

    first.capture().install();
    first.capture().install();
    assert!(first.capture().is_installed());

    let outcome = panic::catch_unwind(|| panic!("index {} out of range", 7));
    assert!(outcome.is_err());

    let pending = first.pending();
    assert_eq!(pending.len(), 1, "double install must not double report");
    let event = &pending[0];
    assert_eq!(event.category(), FaultCategory::Runtime);
    assert_eq!(event.raw_message(), "index 7 out of range");
    let location = event.context().location.as_ref().expect("panic location");
    assert!(location.file.ends_with("capture_test.rs"));
    assert!(location.line > 0);
    assert!(event.context().stack.is_some());

    // Non-string payloads fall back to a placeholder
    let _ = panic::catch_unwind(|| panic::panic_any(42_u8));
    assert_eq!(first.pending()[1].raw_message(), UNKNOWN_PANIC_MESSAGE);

    // A second context takes over the hook
    second.capture().install();
    assert!(second.capture().is_installed());
    assert!(!first.capture().is_installed());
    let _ = panic::catch_unwind(|| panic!("routed to second"));
    assert_eq!(first.queue_len(), 2);
    assert_eq!(second.pending()[0].raw_message(), "routed to second");
    assert!(second.pending()[0].context().stack.is_none());

    second.capture().uninstall();
    assert!(!second.capture().is_installed());
    assert!(!first.capture().is_installed());
    let _ = panic::catch_unwind(|| panic!("nobody listening"));
    assert_eq!(first.queue_len(), 2);
    assert_eq!(second.queue_len(), 1);
}

#[tokio::test]
async fn test_spawned_errors_become_rejections() {
    let diagnostics = diagnostics_with(quiet_config(), Arc::new(RecordingTransport::default()));
    let capture = diagnostics.capture();

    let ok = capture.spawn_observed(async { Ok::<_, io::Error>(5) });
    assert_eq!(ok.await.unwrap(), Some(5));
    assert_eq!(diagnostics.queue_len(), 0);

    let failed = capture.spawn_observed(async {
        Err::<(), _>(io::Error::new(io::ErrorKind::ConnectionReset, "socket closed"))
    });
    assert_eq!(failed.await.unwrap(), None);

    let pending = diagnostics.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].category(), FaultCategory::Promise);
    assert_eq!(pending[0].raw_message(), "socket closed");
}

#[test]
fn test_blank_rejection_uses_placeholder() {
    let diagnostics = diagnostics_with(quiet_config(), Arc::new(RecordingTransport::default()));
    diagnostics.capture().report_rejection("");

    let pending = diagnostics.pending();
    assert_eq!(pending[0].category(), FaultCategory::Promise);
    assert_eq!(pending[0].raw_message(), UNKNOWN_REJECTION_MESSAGE);
}

#[test]
fn test_reported_errors_keep_their_cause_chain() {
    #[derive(Debug, thiserror::Error)]
    #[error("failed to load settings")]
    struct LoadError(#[source] io::Error);

    let diagnostics = diagnostics_with(quiet_config(), Arc::new(RecordingTransport::default()));
    let err = LoadError(io::Error::new(io::ErrorKind::NotFound, "settings.toml missing"));

    diagnostics.capture().report_error(&err);

    let pending = diagnostics.pending();
    assert_eq!(pending[0].category(), FaultCategory::Runtime);
    assert_eq!(pending[0].raw_message(), "failed to load settings");
    assert_eq!(pending[0].context().stack.as_deref(), Some("settings.toml missing"));
}
