//! Error types for hostlink

use thiserror::Error;

/// Result type alias using HostLinkError
pub type Result<T> = std::result::Result<T, HostLinkError>;

/// Errors that can occur while synchronizing with the host
#[derive(Debug, Error)]
pub enum HostLinkError {
    /// Unexpected failure from a host API call
    #[error("Host error: {0}")]
    Host(String),

    /// The host refused to commit a transaction
    #[error("Transaction rejected: {reason}")]
    TransactionRejected { reason: String },

    /// The execution engine could not provide trace data
    #[error("Trace data unavailable: {0}")]
    TraceUnavailable(String),

    /// A trace payload could not be decoded into element references
    #[error("Invalid trace payload: {0}")]
    InvalidTracePayload(String),

    /// No host document is bound
    #[error("No document is bound")]
    NoDocument,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostLinkError {
    /// Create a host error with a message
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    /// Create a transaction rejection with a reason
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::TransactionRejected {
            reason: reason.into(),
        }
    }

    /// Whether this error is a host refusal rather than an unexpected failure
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::TransactionRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        assert!(HostLinkError::rejected("locked").is_rejection());
        assert!(!HostLinkError::host("boom").is_rejection());
        assert!(!HostLinkError::NoDocument.is_rejection());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            HostLinkError::rejected("element 12 is locked").to_string(),
            "Transaction rejected: element 12 is locked"
        );
        assert_eq!(
            HostLinkError::TraceUnavailable("engine reset".into()).to_string(),
            "Trace data unavailable: engine reset"
        );
    }
}
