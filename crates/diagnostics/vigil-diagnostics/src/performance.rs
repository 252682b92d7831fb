//! Load-time and request-latency sampling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use vigil_core::utils::time::duration_to_millis;

use crate::event::{FaultCategory, RawFault};

/// Default capacity of the metrics buffer
pub const DEFAULT_METRICS_CAPACITY: usize = 100;

/// Default load-time threshold
pub const DEFAULT_LOAD_THRESHOLD: Duration = Duration::from_millis(5_000);

/// Default per-request latency threshold
pub const DEFAULT_API_THRESHOLD: Duration = Duration::from_millis(10_000);

/// One observed outbound call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySample {
    /// Request URL
    pub url: String,
    /// Elapsed wall time
    pub duration_ms: u64,
    /// Completion time
    pub timestamp: DateTime<Utc>,
}

/// Ring buffer of the most recent latency samples.
#[derive(Debug, Clone)]
pub struct MetricsBuffer {
    capacity: usize,
    samples: VecDeque<LatencySample>,
}

impl MetricsBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append, overwriting the oldest sample once full
    pub fn push(&mut self, sample: LatencySample) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Mean duration over the buffer
    #[must_use]
    pub fn average_ms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: u128 = self.samples.iter().map(|s| u128::from(s.duration_ms)).sum();
        #[allow(clippy::cast_precision_loss)]
        Some(total as f64 / self.samples.len() as f64)
    }

    /// Slowest sample in the buffer
    #[must_use]
    pub fn slowest(&self) -> Option<&LatencySample> {
        self.samples.iter().max_by_key(|s| s.duration_ms)
    }

    /// Samples, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LatencySample> {
        self.samples.iter()
    }

    /// Number of samples held
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MetricsBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_METRICS_CAPACITY)
    }
}

/// Read-only aggregate view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// Mean latency over the buffer
    pub average_latency_ms: Option<f64>,
    /// Samples in the buffer
    pub sample_count: usize,
    /// Slowest buffered sample
    pub slowest: Option<LatencySample>,
    /// Measured load time, once the application reported ready
    pub load_time_ms: Option<u64>,
}

/// Measures load time and latency, producing performance faults on breach.
#[derive(Debug)]
pub struct PerformanceSampler {
    started_at: Instant,
    load_time: Option<Duration>,
    load_threshold: Duration,
    api_threshold: Duration,
    buffer: MetricsBuffer,
}

impl PerformanceSampler {
    /// Sampler whose load clock starts at `started_at`
    #[must_use]
    pub fn new(
        started_at: Instant,
        load_threshold: Duration,
        api_threshold: Duration,
        metrics_capacity: usize,
    ) -> Self {
        Self {
            started_at,
            load_time: None,
            load_threshold,
            api_threshold,
            buffer: MetricsBuffer::new(metrics_capacity),
        }
    }

    /// Record the application-ready signal at `now`.
    ///
    /// Only the first call measures; later calls return `None`.
    pub fn mark_ready_at(&mut self, now: Instant) -> Option<RawFault> {
        if self.load_time.is_some() {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.started_at);
        self.load_time = Some(elapsed);
        tracing::debug!(load_time_ms = duration_to_millis(elapsed), "application ready");

        (elapsed > self.load_threshold).then(|| {
            RawFault::new(
                FaultCategory::Performance,
                format!("Slow page load: {}ms", duration_to_millis(elapsed)),
            )
        })
    }

    /// Record one outbound call's latency.
    pub fn record_latency(&mut self, url: &str, duration: Duration) -> Option<RawFault> {
        let duration_ms = duration_to_millis(duration);
        self.buffer.push(LatencySample {
            url: url.to_string(),
            duration_ms,
            timestamp: Utc::now(),
        });

        (duration > self.api_threshold).then(|| {
            RawFault::new(
                FaultCategory::Performance,
                format!("Slow API response: {url} took {duration_ms}ms"),
            )
            .with_request_url(url)
        })
    }

    /// Measured load time, if ready has been signalled
    #[must_use]
    pub fn load_time(&self) -> Option<Duration> {
        self.load_time
    }

    /// Buffered samples
    #[must_use]
    pub fn buffer(&self) -> &MetricsBuffer {
        &self.buffer
    }

    /// Aggregate view
    #[must_use]
    pub fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            average_latency_ms: self.buffer.average_ms(),
            sample_count: self.buffer.len(),
            slowest: self.buffer.slowest().cloned(),
            load_time_ms: self.load_time.map(duration_to_millis),
        }
    }
}
