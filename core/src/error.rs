//! Error types for dialect implementations

use thiserror::Error;

/// Delivery failure reported by a dialect
///
/// The variant is the retry contract: the flusher retries `Transient`
/// failures up to its attempt budget and escalates `Permanent` failures
/// immediately, so implementations should classify carefully - marking a
/// permanent rejection as transient burns the retry budget against a sink
/// that will never accept the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialectError {
    /// A failure that may succeed on retry
    ///
    /// Examples: connection refused, timeout, sink-reported throttling.
    #[error("transient dialect failure: {0}")]
    Transient(String),

    /// A failure that will not succeed on retry
    ///
    /// Examples: malformed batch, authentication rejected by the sink.
    #[error("permanent dialect failure: {0}")]
    Permanent(String),
}

impl DialectError {
    /// Build a transient error from any displayable cause
    pub fn transient(cause: impl std::fmt::Display) -> Self {
        Self::Transient(cause.to_string())
    }

    /// Build a permanent error from any displayable cause
    pub fn permanent(cause: impl std::fmt::Display) -> Self {
        Self::Permanent(cause.to_string())
    }

    /// Whether the flusher should retry after this failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable() {
        assert!(DialectError::transient("connection reset").is_retryable());
        assert!(!DialectError::permanent("malformed batch").is_retryable());
    }

    #[test]
    fn display_includes_classification() {
        let err = DialectError::Transient("timeout".into());
        assert_eq!(err.to_string(), "transient dialect failure: timeout");
        let err = DialectError::Permanent("rejected".into());
        assert_eq!(err.to_string(), "permanent dialect failure: rejected");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DialectError>();
    }
}
