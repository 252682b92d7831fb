//! Error handling types and utilities for Vigil.
//!
//! This module provides the error type shared by every Vigil crate so that
//! configuration, capture and delivery failures are reported consistently.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The main error type for Vigil.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VigilError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network related errors (connection refused, DNS, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// The collector answered, but not with a success status
    #[error("Delivery rejected with status {status}: {message}")]
    Delivery {
        /// HTTP status returned by the collector
        status: u16,
        /// Reason phrase or response summary
        message: String,
    },

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Failures inside fault capture itself
    #[error("Capture error: {0}")]
    Capture(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VigilError {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create a new network error
    pub fn network<T: fmt::Display>(msg: T) -> Self {
        Self::Network(msg.to_string())
    }

    /// Create a new delivery error from a collector status
    pub fn delivery<T: fmt::Display>(status: u16, msg: T) -> Self {
        Self::Delivery {
            status,
            message: msg.to_string(),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Create a new timeout error
    pub fn timeout<T: fmt::Display>(msg: T) -> Self {
        Self::Timeout(msg.to_string())
    }

    /// Create a new serialization error
    pub fn serialization<T: fmt::Display>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a new capture error
    pub fn capture<T: fmt::Display>(msg: T) -> Self {
        Self::Capture(msg.to_string())
    }

    /// Create a new internal error
    pub fn internal<T: fmt::Display>(msg: T) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Check if a later attempt of the same operation could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Internal(_) => true,
            Self::Delivery { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if this error originated in the caller's input or setup
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidInput(_) | Self::Configuration(_) => true,
            Self::Delivery { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }
}

/// Result type alias for Vigil operations
pub type VigilResult<T> = Result<T, VigilError>;

impl From<std::io::Error> for VigilError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for VigilError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
