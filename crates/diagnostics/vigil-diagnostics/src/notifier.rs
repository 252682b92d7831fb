//! User notification contract and the core-side throttle in front of it.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use vigil_core::utils::rate_limit::SlidingWindow;

use crate::event::FaultCategory;

/// How prominently a message should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Transient error message
    Error,
    /// Transient informational message
    Info,
}

impl From<FaultCategory> for Severity {
    fn from(category: FaultCategory) -> Self {
        match category {
            FaultCategory::Performance => Severity::Info,
            _ => Severity::Error,
        }
    }
}

/// Presentation-layer contract. Calls are fire-and-forget.
///
/// Implementations run inline on the reporting path, including from inside
/// the panic hook, so they must not panic or block.
pub trait Notifier: Send + Sync {
    /// Show a transient error message
    fn show_error(&self, message: &str, duration: Option<Duration>);

    /// Show a transient informational message
    fn show_info(&self, message: &str, duration: Option<Duration>);

    /// Dispatch on severity
    fn show(&self, severity: Severity, message: &str, duration: Option<Duration>) {
        match severity {
            Severity::Error => self.show_error(message, duration),
            Severity::Info => self.show_info(message, duration),
        }
    }
}

/// Notifier that writes to the log; for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show_error(&self, message: &str, duration: Option<Duration>) {
        tracing::error!(target: "vigil::notify", ?duration, "{message}");
    }

    fn show_info(&self, message: &str, duration: Option<Duration>) {
        tracing::info!(target: "vigil::notify", ?duration, "{message}");
    }
}

/// Notifier that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn show_error(&self, _message: &str, _duration: Option<Duration>) {}

    fn show_info(&self, _message: &str, _duration: Option<Duration>) {}
}

/// Default number of notifications per window
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 3;

/// Default window length
pub const DEFAULT_NOTIFICATION_WINDOW: Duration = Duration::from_secs(10);

/// Sliding-window throttle evaluated against prior notification instants.
#[derive(Debug)]
pub struct NotificationGate {
    window: Mutex<SlidingWindow>,
}

impl NotificationGate {
    /// Allow at most `limit` notifications in any trailing `window`
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            window: Mutex::new(SlidingWindow::new(limit, window)),
        }
    }

    /// Try to claim a notification slot now
    pub fn allow(&self) -> bool {
        self.allow_at(tokio::time::Instant::now().into_std())
    }

    /// Try to claim a notification slot at `now`
    pub fn allow_at(&self, now: Instant) -> bool {
        self.window.lock().try_acquire_at(now)
    }

    /// Notifications shown within the window ending at `now`
    pub fn recent_at(&self, now: Instant) -> usize {
        self.window.lock().in_window_at(now)
    }
}

impl Default for NotificationGate {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_LIMIT, DEFAULT_NOTIFICATION_WINDOW)
    }
}
