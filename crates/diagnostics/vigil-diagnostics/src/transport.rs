//! Delivery of wire payloads to the remote collector.

use async_trait::async_trait;
use std::time::Duration;
use vigil_core::{VigilError, VigilResult};

use crate::error::DiagnosticsError;
use crate::event::WirePayload;

/// Sends one payload to the collector.
///
/// Any `Err` counts as a failed attempt against the event's retry budget.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a single payload
    async fn send(&self, payload: &WirePayload) -> VigilResult<()>;
}

/// JSON-over-HTTP transport.
///
/// Owns a plain `reqwest::Client`, never an intercepted one, so that its own
/// failures do not feed back into the pipeline as new faults.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Build a transport posting to `endpoint`
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> VigilResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| VigilError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, endpoint))
    }

    /// Reuse an existing client
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Collector URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &WirePayload) -> VigilResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(DiagnosticsError::from)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(event_id = %payload.id, %status, "collector rejected payload");
            return Err(DiagnosticsError::Rejected { status: status.as_u16() }.into());
        }

        Ok(())
    }
}
