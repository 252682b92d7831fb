//! # Vigil Diagnostics
//!
//! Client-embedded fault capture with best-effort delivery to a remote
//! collector.
//!
//! A [`Diagnostics`] context receives faults from panics, unobserved task
//! errors, intercepted HTTP calls and performance sampling. Each fault is
//! classified into a user-facing message, shown through a rate-limited
//! [`Notifier`], and queued for delivery. The queue is bounded, flushes are
//! paused while offline, and events that keep failing are dropped after a
//! fixed number of attempts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_diagnostics::{Diagnostics, DiagnosticsConfig, TracingNotifier};
//!
//! # async fn run() -> vigil_core::VigilResult<()> {
//! let config = DiagnosticsConfig::from_env()?;
//! let diagnostics = Diagnostics::with_http_transport(config, Arc::new(TracingNotifier))?;
//! diagnostics.capture().install();
//!
//! let client = diagnostics.intercept(reqwest::Client::new());
//! let _ = client.send(client.get("https://api.example.com/health")).await;
//!
//! diagnostics.mark_ready();
//! diagnostics.flush().await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capture;
pub mod classifier;
pub mod config;
pub mod connectivity;
pub mod delivery;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod interceptor;
pub mod notifier;
pub mod performance;
pub mod queue;
pub mod transport;

pub use capture::EventCapture;
pub use classifier::{classify, ClassificationRule, Classifier};
pub use config::DiagnosticsConfig;
pub use connectivity::{ConnectivityMonitor, ConnectivityState};
pub use delivery::{DeliveryStats, FlushReport};
pub use diagnostics::{Diagnostics, DiagnosticsBuilder};
pub use error::DiagnosticsError;
pub use event::{
    FaultCategory, FaultContext, FaultEvent, RawFault, SourceLocation, WireMetadata, WirePayload,
};
pub use interceptor::{HttpExecutor, InterceptedClient};
pub use notifier::{NoopNotifier, NotificationGate, Notifier, Severity, TracingNotifier};
pub use performance::{LatencySample, MetricsBuffer, PerformanceSampler, PerformanceSnapshot};
pub use queue::DeliveryQueue;
pub use transport::{HttpTransport, Transport};

/// Version information for the Vigil Diagnostics library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
