//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vigil_core::config::{ConfigManager, EnvConfigSource, FileConfigSource};
use vigil_core::logging::LoggingConfig;
use vigil_core::{Validatable, VigilError, VigilResult};

use crate::event::WireMetadata;
use crate::notifier::{DEFAULT_NOTIFICATION_LIMIT, DEFAULT_NOTIFICATION_WINDOW};
use crate::performance::{DEFAULT_API_THRESHOLD, DEFAULT_LOAD_THRESHOLD, DEFAULT_METRICS_CAPACITY};
use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Default environment prefix (`VIGIL_QUEUE_CAPACITY=20`)
pub const DEFAULT_ENV_PREFIX: &str = "VIGIL";

/// Default collector endpoint
pub const DEFAULT_COLLECTOR_URL: &str = "http://localhost:8080/api/errors";

/// Settings for a [`Diagnostics`](crate::Diagnostics) context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Collector endpoint that receives JSON payloads
    pub collector_url: String,
    /// Reported as `url` for faults that are not tied to a request
    pub app_url: String,
    /// Reported as `userAgent` and sent as the transport's user agent
    pub user_agent: String,
    /// Maximum queued events
    pub queue_capacity: usize,
    /// Failed attempts before an event is dropped
    pub max_retries: u32,
    /// Pause between consecutive sends within one flush
    pub flush_pacing_ms: u64,
    /// Transport client timeout
    pub request_timeout_ms: u64,
    /// Load time above which a performance fault is raised
    pub load_threshold_ms: u64,
    /// Per-call latency above which a performance fault is raised
    pub api_threshold_ms: u64,
    /// Latency samples kept
    pub metrics_capacity: usize,
    /// Notifications allowed per window
    pub notification_limit: usize,
    /// Notification window length
    pub notification_window_ms: u64,
    /// How long the presentation layer should keep a message visible
    pub notification_duration_ms: u64,
    /// Show notifications at all
    pub notify_user: bool,
    /// Spawn a flush after every report while online
    pub auto_flush: bool,
    /// Initial connectivity
    pub start_online: bool,
    /// Attach a backtrace to captured panics
    pub capture_backtraces: bool,
    /// Default log filter directive
    pub log_level: String,
    /// JSON log output
    pub log_json: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            app_url: "app://localhost".to_string(),
            user_agent: format!("vigil/{}", env!("CARGO_PKG_VERSION")),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_retries: 4,
            flush_pacing_ms: 100,
            request_timeout_ms: 10_000,
            load_threshold_ms: millis(DEFAULT_LOAD_THRESHOLD),
            api_threshold_ms: millis(DEFAULT_API_THRESHOLD),
            metrics_capacity: DEFAULT_METRICS_CAPACITY,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
            notification_window_ms: millis(DEFAULT_NOTIFICATION_WINDOW),
            notification_duration_ms: 5_000,
            notify_user: true,
            auto_flush: true,
            start_online: true,
            capture_backtraces: true,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    vigil_core::utils::time::duration_to_millis(duration)
}

impl DiagnosticsConfig {
    /// Layer an optional file and `{prefix}_*` environment variables over
    /// the defaults, then validate.
    pub fn load(path: Option<&Path>, prefix: &str) -> VigilResult<Self> {
        let mut manager = ConfigManager::new();
        if let Some(path) = path {
            manager = manager.add_source(FileConfigSource::auto_detect(path)?.optional());
        }
        manager = manager.add_source(EnvConfigSource::new(prefix));

        manager.load()?;
        let config: Self = manager.deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the environment only, using [`DEFAULT_ENV_PREFIX`]
    pub fn from_env() -> VigilResult<Self> {
        Self::load(None, DEFAULT_ENV_PREFIX)
    }

    /// Logging settings derived from this configuration
    #[must_use]
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json: self.log_json,
        }
    }

    /// Application metadata attached to every payload
    #[must_use]
    pub fn wire_metadata(&self) -> WireMetadata {
        WireMetadata {
            app_url: self.app_url.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Pacing between sends
    #[must_use]
    pub fn flush_pacing(&self) -> Duration {
        Duration::from_millis(self.flush_pacing_ms)
    }

    /// Transport timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Load-time threshold
    #[must_use]
    pub fn load_threshold(&self) -> Duration {
        Duration::from_millis(self.load_threshold_ms)
    }

    /// Per-call latency threshold
    #[must_use]
    pub fn api_threshold(&self) -> Duration {
        Duration::from_millis(self.api_threshold_ms)
    }

    /// Notification window
    #[must_use]
    pub fn notification_window(&self) -> Duration {
        Duration::from_millis(self.notification_window_ms)
    }

    /// Display duration handed to the notifier
    #[must_use]
    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_duration_ms)
    }
}

impl Validatable for DiagnosticsConfig {
    fn validate(&self) -> VigilResult<()> {
        let url = &self.collector_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(VigilError::config(format!(
                "collector_url must be an http(s) URL, got '{}'",
                self.collector_url
            )));
        }
        if self.queue_capacity == 0 {
            return Err(VigilError::config("queue_capacity must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(VigilError::config("max_retries must be at least 1"));
        }
        if self.metrics_capacity == 0 {
            return Err(VigilError::config("metrics_capacity must be at least 1"));
        }
        if self.notification_window_ms == 0 {
            return Err(VigilError::config("notification_window_ms must be positive"));
        }
        Ok(())
    }
}
