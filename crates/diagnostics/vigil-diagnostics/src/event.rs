//! Fault taxonomy, captured events and the collector wire format.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Closed set of fault categories, assigned at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultCategory {
    /// Uncaught synchronous fault (a panic)
    Runtime,
    /// Asynchronous work that failed and was never handled
    Promise,
    /// Outbound call answered with a non-success status
    Api,
    /// Outbound call failed at the transport level
    Network,
    /// Load time or latency threshold breached
    Performance,
}

impl FaultCategory {
    /// Every category, in declaration order
    pub const ALL: [FaultCategory; 5] = [
        FaultCategory::Runtime,
        FaultCategory::Promise,
        FaultCategory::Api,
        FaultCategory::Network,
        FaultCategory::Performance,
    ];

    /// Wire name of the category
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCategory::Runtime => "runtime",
            FaultCategory::Promise => "promise",
            FaultCategory::Api => "api",
            FaultCategory::Network => "network",
            FaultCategory::Performance => "performance",
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the source a fault was raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file
    pub file: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl SourceLocation {
    /// Create a new location
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl From<&std::panic::Location<'_>> for SourceLocation {
    fn from(location: &std::panic::Location<'_>) -> Self {
        Self::new(location.file(), location.line(), location.column())
    }
}

/// Optional structured fields attached to a fault
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultContext {
    /// Stack or backtrace text
    pub stack: Option<String>,
    /// Source location
    pub location: Option<SourceLocation>,
    /// URL of the outbound request involved
    pub request_url: Option<String>,
    /// Response status of the outbound request involved
    pub status: Option<u16>,
    /// HTTP method of the outbound request involved
    pub method: Option<String>,
}

/// An unclassified fault as produced by capture, sampling or interception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFault {
    /// Category assigned at capture time
    pub category: FaultCategory,
    /// Original description
    pub message: String,
    /// Structured context
    pub context: FaultContext,
}

impl RawFault {
    /// Create a fault with an empty context
    pub fn new(category: FaultCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: FaultContext::default(),
        }
    }

    /// Attach stack text
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.context.stack = Some(stack.into());
        self
    }

    /// Attach a source location
    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.context.location = Some(location);
        self
    }

    /// Attach the request URL
    #[must_use]
    pub fn with_request_url(mut self, url: impl Into<String>) -> Self {
        self.context.request_url = Some(url.into());
        self
    }

    /// Attach the response status
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.context.status = Some(status);
        self
    }

    /// Attach the HTTP method
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.context.method = Some(method.into());
        self
    }
}

/// A classified fault, owned by the delivery queue from enqueue to removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultEvent {
    id: Uuid,
    category: FaultCategory,
    raw_message: String,
    friendly_message: String,
    context: FaultContext,
    timestamp: DateTime<Utc>,
    retry_count: u32,
}

impl FaultEvent {
    /// Build an event from a raw fault and its classified message
    pub fn new(raw: RawFault, friendly_message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: raw.category,
            raw_message: raw.message,
            friendly_message: friendly_message.into(),
            context: raw.context,
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }

    /// Stable identifier
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Category assigned at capture
    #[must_use]
    pub fn category(&self) -> FaultCategory {
        self.category
    }

    /// Original description
    #[must_use]
    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    /// Classified, user-facing message
    #[must_use]
    pub fn friendly_message(&self) -> &str {
        &self.friendly_message
    }

    /// Structured context
    #[must_use]
    pub fn context(&self) -> &FaultContext {
        &self.context
    }

    /// Creation time
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Failed delivery attempts so far
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub(crate) fn record_failed_attempt(&mut self) -> u32 {
        self.retry_count = self.retry_count.saturating_add(1);
        self.retry_count
    }

    /// Render the event in the collector's wire format
    #[must_use]
    pub fn to_wire(&self, meta: &WireMetadata) -> WirePayload {
        let location = self.context.location.as_ref();
        WirePayload {
            kind: self.category,
            message: self.raw_message.clone(),
            stack: self.context.stack.clone(),
            filename: location.map(|l| l.file.clone()),
            lineno: location.map(|l| l.line),
            colno: location.map(|l| l.column),
            url: self
                .context
                .request_url
                .clone()
                .unwrap_or_else(|| meta.app_url.clone()),
            status: self.context.status,
            user_agent: meta.user_agent.clone(),
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            id: self.id.to_string(),
        }
    }
}

/// Fields that describe the reporting application rather than the fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMetadata {
    /// URL identifying the application, used when the fault has no request URL
    pub app_url: String,
    /// Reporting agent
    pub user_agent: String,
}

/// JSON body POSTed to the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePayload {
    /// Fault category
    #[serde(rename = "type")]
    pub kind: FaultCategory,
    /// Raw fault message
    pub message: String,
    /// Stack text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Source file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Source line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    /// Source column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    /// Request URL, or the application URL
    pub url: String,
    /// Response status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Reporting agent
    pub user_agent: String,
    /// RFC 3339 creation time
    pub timestamp: String,
    /// Event id
    pub id: String,
}
