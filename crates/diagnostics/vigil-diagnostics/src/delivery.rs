//! Flush algorithm over the delivery queue.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;
use vigil_core::utils::time::format_duration;

use crate::connectivity::ConnectivityState;
use crate::event::{FaultEvent, WireMetadata, WirePayload};
use crate::queue::{DeliveryQueue, FailureOutcome};
use crate::transport::Transport;

/// Outcome of one `flush()` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Send attempts made
    pub attempted: usize,
    /// Events delivered and removed
    pub delivered: usize,
    /// Attempts that failed
    pub failed: usize,
    /// Events removed after exhausting their retry budget
    pub dropped: usize,
    /// The pass stopped early because connectivity went offline
    pub aborted_offline: bool,
    /// Another flush was already running; nothing was done
    pub skipped: bool,
}

impl FlushReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Lifetime delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    /// Events accepted into the queue
    pub enqueued: u64,
    /// Events delivered
    pub delivered: u64,
    /// Failed send attempts
    pub failed_attempts: u64,
    /// Events lost after exhausting retries
    pub dropped: u64,
    /// Events lost to capacity eviction
    pub evicted: u64,
}

/// Owns the queue and drives it through the transport.
pub struct Dispatcher {
    queue: Mutex<DeliveryQueue>,
    transport: Arc<dyn Transport>,
    connectivity: watch::Receiver<ConnectivityState>,
    flushing: AtomicBool,
    rerun: AtomicBool,
    max_retries: u32,
    pacing: Duration,
    meta: WireMetadata,
    stats: Mutex<DeliveryStats>,
}

/// Clears the in-flight flag however the flush future ends.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Dispatcher {
    /// Create a dispatcher with an empty queue
    pub fn new(
        capacity: usize,
        max_retries: u32,
        pacing: Duration,
        transport: Arc<dyn Transport>,
        connectivity: watch::Receiver<ConnectivityState>,
        meta: WireMetadata,
    ) -> Self {
        Self {
            queue: Mutex::new(DeliveryQueue::new(capacity)),
            transport,
            connectivity,
            flushing: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
            max_retries,
            pacing,
            meta,
            stats: Mutex::new(DeliveryStats::default()),
        }
    }

    /// Queue an event, evicting the oldest entries if over capacity
    pub fn enqueue(&self, event: FaultEvent) {
        let id = event.id();
        let evicted = self.queue.lock().enqueue(event);

        let mut stats = self.stats.lock();
        stats.enqueued += 1;
        stats.evicted += evicted.len() as u64;
        drop(stats);

        for lost in &evicted {
            tracing::warn!(
                event_id = %lost.id(),
                category = %lost.category(),
                "queue full, evicted oldest event"
            );
        }
        tracing::debug!(event_id = %id, "event queued");
    }

    /// Whether a flush pass is running
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Attempt delivery of everything queued.
    ///
    /// A call made while another pass is running returns a skipped report
    /// and makes the running flush take one more pass once its own ends.
    /// Each event is attempted at most once per call. Never fails;
    /// transport errors are folded into the report.
    pub async fn flush(&self) -> FlushReport {
        // Set before trying the guard so a pass finishing concurrently sees it
        self.rerun.store(true, Ordering::SeqCst);
        if !self.try_begin() {
            tracing::debug!("flush already in progress, rerun requested");
            return FlushReport::skipped();
        }

        let started = Instant::now();
        let mut attempted_ids = HashSet::new();
        let mut report = FlushReport::default();
        let mut passes = 0usize;

        loop {
            {
                let _guard = FlushGuard(&self.flushing);
                self.rerun.store(false, Ordering::SeqCst);
                passes += 1;
                self.deliver_pass(&mut attempted_ids, &mut report).await;
            }
            if report.aborted_offline || !self.rerun.load(Ordering::SeqCst) || !self.try_begin() {
                break;
            }
        }

        if report.attempted > 0 || report.aborted_offline {
            tracing::info!(
                attempted = report.attempted,
                delivered = report.delivered,
                failed = report.failed,
                dropped = report.dropped,
                aborted_offline = report.aborted_offline,
                passes,
                elapsed = %format_duration(started.elapsed()),
                "flush finished"
            );
        }
        report
    }

    fn try_begin(&self) -> bool {
        self.flushing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    async fn deliver_pass(&self, attempted_ids: &mut HashSet<Uuid>, report: &mut FlushReport) {
        let ids = self.queue.lock().ids();

        for id in ids {
            if attempted_ids.contains(&id) {
                continue;
            }
            if report.attempted > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            if self.is_offline() {
                report.aborted_offline = true;
                tracing::debug!("offline, suspending flush");
                return;
            }

            // Evicted or cleared since the snapshot
            let Some(payload) = self.payload_for(id) else {
                continue;
            };

            attempted_ids.insert(id);
            report.attempted += 1;
            match self.transport.send(&payload).await {
                Ok(()) => {
                    self.queue.lock().remove(id);
                    report.delivered += 1;
                    self.stats.lock().delivered += 1;
                    tracing::debug!(event_id = %id, "event delivered");
                }
                Err(err) => {
                    report.failed += 1;
                    self.stats.lock().failed_attempts += 1;
                    self.handle_failure(id, &err, report);
                }
            }
        }
    }

    fn is_offline(&self) -> bool {
        *self.connectivity.borrow() == ConnectivityState::Offline
    }

    fn payload_for(&self, id: Uuid) -> Option<WirePayload> {
        self.queue.lock().get(id).map(|event| event.to_wire(&self.meta))
    }

    fn handle_failure(&self, id: Uuid, err: &vigil_core::VigilError, report: &mut FlushReport) {
        let outcome = self.queue.lock().record_failure(id, self.max_retries);
        match outcome {
            FailureOutcome::Retained { retry_count } => {
                tracing::debug!(
                    event_id = %id,
                    retry_count,
                    error = %err,
                    "delivery failed, will retry"
                );
            }
            FailureOutcome::Dropped(event) => {
                report.dropped += 1;
                self.stats.lock().dropped += 1;
                tracing::warn!(
                    event_id = %id,
                    category = %event.category(),
                    retry_count = event.retry_count(),
                    error = %err,
                    "retry budget exhausted, event dropped"
                );
            }
            FailureOutcome::Missing => {}
        }
    }

    /// Clone of the queued events, oldest first
    #[must_use]
    pub fn pending(&self) -> Vec<FaultEvent> {
        self.queue.lock().iter().cloned().collect()
    }

    /// Number of queued events
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Discard everything queued
    pub fn clear(&self) -> usize {
        self.queue.lock().clear()
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> DeliveryStats {
        *self.stats.lock()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queued", &self.len())
            .field("flushing", &self.is_flushing())
            .field("max_retries", &self.max_retries)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}
