//! Error types for the diagnostics pipeline.
//!
//! None of these ever reach the host application through a capture path;
//! they surface only from the transport, folded into [`VigilError`].

use thiserror::Error;
use vigil_core::VigilError;

/// Errors raised while delivering to the collector
#[derive(Error, Debug)]
pub enum DiagnosticsError {
    /// The collector answered with a non-success status
    #[error("collector rejected delivery with status {status}")]
    Rejected {
        /// HTTP status returned by the collector
        status: u16,
    },

    /// The HTTP request itself failed
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<DiagnosticsError> for VigilError {
    fn from(err: DiagnosticsError) -> Self {
        match err {
            DiagnosticsError::Rejected { status } => {
                VigilError::delivery(status, "collector rejected payload")
            }
            DiagnosticsError::Transport(e) if e.is_timeout() => VigilError::timeout(e),
            DiagnosticsError::Transport(e) => VigilError::network(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_becomes_delivery_error() {
        let err: VigilError = DiagnosticsError::Rejected { status: 502 }.into();
        assert!(matches!(err, VigilError::Delivery { status: 502, .. }));
        assert!(err.is_retryable());

        let err: VigilError = DiagnosticsError::Rejected { status: 400 }.into();
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }
}
