//! The context object tying capture, classification, notification and
//! delivery together.

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;
use vigil_core::{Validatable, VigilResult};

use crate::capture::EventCapture;
use crate::classifier::Classifier;
use crate::config::DiagnosticsConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::delivery::{DeliveryStats, Dispatcher, FlushReport};
use crate::event::{FaultEvent, RawFault};
use crate::interceptor::{HttpExecutor, InterceptedClient};
use crate::notifier::{NotificationGate, Notifier, Severity, TracingNotifier};
use crate::performance::{LatencySample, PerformanceSampler, PerformanceSnapshot};
use crate::transport::{HttpTransport, Transport};

/// Builder for [`Diagnostics`]
#[must_use]
pub struct DiagnosticsBuilder {
    config: DiagnosticsConfig,
    transport: Option<Arc<dyn Transport>>,
    notifier: Option<Arc<dyn Notifier>>,
    classifier: Option<Classifier>,
}

impl DiagnosticsBuilder {
    /// Start from a configuration
    pub fn new(config: DiagnosticsConfig) -> Self {
        Self {
            config,
            transport: None,
            notifier: None,
            classifier: None,
        }
    }

    /// Deliver through `transport` instead of the HTTP collector
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Present notifications through `notifier` instead of the log
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Use a custom rule table
    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Validate the configuration and assemble the context
    pub fn build(self) -> VigilResult<Arc<Diagnostics>> {
        self.config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                self.config.collector_url.clone(),
                self.config.request_timeout(),
                &self.config.user_agent,
            )?),
        };
        let notifier: Arc<dyn Notifier> =
            self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let classifier = self.classifier.unwrap_or_default();
        let config = self.config;

        let connectivity =
            ConnectivityMonitor::new(ConnectivityState::from_online(config.start_online));
        let dispatcher = Dispatcher::new(
            config.queue_capacity,
            config.max_retries,
            config.flush_pacing(),
            transport,
            connectivity.subscribe(),
            config.wire_metadata(),
        );
        let sampler = PerformanceSampler::new(
            Instant::now(),
            config.load_threshold(),
            config.api_threshold(),
            config.metrics_capacity,
        );
        let gate = NotificationGate::new(config.notification_limit, config.notification_window());

        tracing::debug!(
            collector = %config.collector_url,
            queue_capacity = config.queue_capacity,
            max_retries = config.max_retries,
            "diagnostics context created"
        );

        Ok(Arc::new_cyclic(|self_ref: &Weak<Diagnostics>| Diagnostics {
            capture: EventCapture::new(self_ref.clone()),
            self_ref: self_ref.clone(),
            config,
            classifier,
            gate,
            notifier,
            sampler: Mutex::new(sampler),
            connectivity,
            dispatcher,
        }))
    }
}

/// Explicit diagnostics context, shared as `Arc<Diagnostics>`.
pub struct Diagnostics {
    config: DiagnosticsConfig,
    classifier: Classifier,
    gate: NotificationGate,
    notifier: Arc<dyn Notifier>,
    sampler: Mutex<PerformanceSampler>,
    connectivity: ConnectivityMonitor,
    dispatcher: Dispatcher,
    capture: EventCapture,
    self_ref: Weak<Diagnostics>,
}

impl Diagnostics {
    /// Builder starting from `config`
    pub fn builder(config: DiagnosticsConfig) -> DiagnosticsBuilder {
        DiagnosticsBuilder::new(config)
    }

    /// Context with an explicit transport and notifier
    pub fn new(
        config: DiagnosticsConfig,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> VigilResult<Arc<Self>> {
        Self::builder(config).transport(transport).notifier(notifier).build()
    }

    /// Context delivering to `config.collector_url` over HTTP
    pub fn with_http_transport(
        config: DiagnosticsConfig,
        notifier: Arc<dyn Notifier>,
    ) -> VigilResult<Arc<Self>> {
        Self::builder(config).notifier(notifier).build()
    }

    /// Classify, notify (subject to the gate) and queue a fault.
    ///
    /// Never fails and never panics; returns the new event's id.
    pub fn report(&self, raw: RawFault) -> Uuid {
        let category = raw.category;
        let friendly = self.classifier.classify(&raw.message, category);
        let event = FaultEvent::new(raw, friendly.as_str());
        let id = event.id();

        tracing::debug!(event_id = %id, %category, message = event.raw_message(), "fault reported");

        if self.config.notify_user {
            if self.gate.allow() {
                self.notifier.show(
                    Severity::from(category),
                    &friendly,
                    Some(self.config.notification_duration()),
                );
            } else {
                tracing::debug!(event_id = %id, "notification suppressed");
            }
        }

        self.dispatcher.enqueue(event);

        if self.config.auto_flush && self.connectivity.is_online() {
            self.spawn_flush();
        }
        id
    }

    fn spawn_flush(&self) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        // A flush already running picks the new event up in a follow-up pass
        if let Some(this) = self.self_ref.upgrade() {
            handle.spawn(async move {
                this.flush().await;
            });
        }
    }

    /// Run one delivery pass
    pub async fn flush(&self) -> FlushReport {
        self.dispatcher.flush().await
    }

    /// Apply a connectivity signal. A transition to online triggers one
    /// flush, whose report is returned.
    pub async fn set_connectivity(&self, state: ConnectivityState) -> Option<FlushReport> {
        let changed = self.connectivity.set(state);
        if changed && state == ConnectivityState::Online {
            Some(self.flush().await)
        } else {
            None
        }
    }

    /// Current connectivity
    #[must_use]
    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    /// Observe connectivity transitions
    #[must_use]
    pub fn subscribe_connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.connectivity.subscribe()
    }

    /// Application-ready signal; reports a slow load once
    pub fn mark_ready(&self) -> Option<Uuid> {
        let fault = self.sampler.lock().mark_ready_at(Instant::now());
        fault.map(|fault| self.report(fault))
    }

    /// Record an outbound call; reports it if slow
    pub fn record_latency(&self, url: &str, duration: Duration) -> Option<Uuid> {
        let fault = self.sampler.lock().record_latency(url, duration);
        fault.map(|fault| self.report(fault))
    }

    /// Aggregate latency and load-time view
    #[must_use]
    pub fn performance(&self) -> PerformanceSnapshot {
        self.sampler.lock().snapshot()
    }

    /// Buffered latency samples, oldest first
    #[must_use]
    pub fn latency_samples(&self) -> Vec<LatencySample> {
        self.sampler.lock().buffer().iter().cloned().collect()
    }

    /// Panic and rejection capture for this context
    #[must_use]
    pub fn capture(&self) -> &EventCapture {
        &self.capture
    }

    /// Wrap an executor so its calls feed this context
    pub fn intercept<E: HttpExecutor>(self: &Arc<Self>, inner: E) -> InterceptedClient<E> {
        InterceptedClient::new(inner, Arc::clone(self))
    }

    /// Queued events, oldest first
    #[must_use]
    pub fn pending(&self) -> Vec<FaultEvent> {
        self.dispatcher.pending()
    }

    /// Number of queued events
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.dispatcher.len()
    }

    /// Discard every queued event
    pub fn clear(&self) -> usize {
        let cleared = self.dispatcher.clear();
        tracing::debug!(cleared, "queue cleared");
        cleared
    }

    /// Delivery counters
    #[must_use]
    pub fn stats(&self) -> DeliveryStats {
        self.dispatcher.stats()
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("collector_url", &self.config.collector_url)
            .field("connectivity", &self.connectivity())
            .field("dispatcher", &self.dispatcher)
            .field("capture_installed", &self.capture.is_installed())
            .finish_non_exhaustive()
    }
}

impl Drop for Diagnostics {
    fn drop(&mut self) {
        self.capture.uninstall();
    }
}
