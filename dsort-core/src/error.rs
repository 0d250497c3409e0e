//! Error types for the sort cluster
//!
//! Covers election, transport, protocol, partitioning and result integrity.

use thiserror::Error;

/// Primary error type for all cluster operations
#[derive(Debug, Error)]
pub enum ClusterError {
    // ========== Election Errors ==========

    /// A candidate was assigned a role twice, or the outcome did not have
    /// exactly one coordinator. Unreachable unless the election lock is broken.
    #[error("Election race detected: {reason}")]
    ElectionRace { reason: String },

    // ========== Transport Errors ==========

    /// Dial, bind or accept failed
    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// A socket read or write exceeded its deadline
    #[error("Timed out during {operation} with {endpoint}")]
    Timeout { operation: String, endpoint: String },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Protocol Errors ==========

    /// Malformed or truncated message
    #[error("Failed to decode message: {reason}")]
    ProtocolDecode { reason: String },

    /// Message arrived in a state that does not expect it
    #[error("Unexpected message from {endpoint} while {state}: {reason}")]
    ProtocolSequence {
        endpoint: String,
        state: String,
        reason: String,
    },

    // ========== Partition / Integrity Errors ==========

    /// Partition requested with an unusable worker count
    #[error("Invalid partition: {reason}")]
    InvalidPartition { reason: String },

    /// Not every expected sorted chunk arrived
    #[error("Missing sorted chunks: expected {expected}, received {received}, missing workers: {missing:?}, failures: {failures:?}")]
    MissingChunks {
        expected: usize,
        received: usize,
        missing: Vec<String>,
        /// Endpoint and reason for each worker whose exchange failed
        failures: Vec<(String, String)>,
    },

    /// A worker returned a different number of items than it was sent
    #[error("Chunk from {endpoint} has {actual} items, dispatched {expected}")]
    ChunkLengthMismatch {
        endpoint: String,
        expected: usize,
        actual: usize,
    },

    // ========== Runtime Errors ==========

    /// Configuration rejected before startup
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Input source could not be read
    #[error("Failed to read input {source_name}: {reason}")]
    Input { source_name: String, reason: String },

    /// Run was explicitly aborted
    #[error("Run aborted")]
    Aborted,

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ClusterError {
    /// Returns true if the operation may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClusterError::ConnectionFailed { .. } | ClusterError::Timeout { .. }
        )
    }

    /// Returns true if this error means the final result would be incomplete
    /// or inconsistent
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            ClusterError::MissingChunks { .. }
                | ClusterError::ChunkLengthMismatch { .. }
                | ClusterError::ElectionRace { .. }
        )
    }
}

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let dial = ClusterError::ConnectionFailed {
            endpoint: "127.0.0.1:3001".into(),
            reason: "refused".into(),
        };
        assert!(dial.is_retryable());
        assert!(!dial.is_integrity());

        let missing = ClusterError::MissingChunks {
            expected: 2,
            received: 1,
            missing: vec!["127.0.0.1:3003".into()],
            failures: vec![],
        };
        assert!(!missing.is_retryable());
        assert!(missing.is_integrity());
    }

    #[test]
    fn test_display_names_missing_workers() {
        let err = ClusterError::MissingChunks {
            expected: 3,
            received: 2,
            missing: vec!["10.0.0.1:4002".into()],
            failures: vec![("10.0.0.1:4002".into(), "connection reset".into())],
        };
        let text = err.to_string();
        assert!(text.contains("expected 3"));
        assert!(text.contains("10.0.0.1:4002"));
        assert!(text.contains("connection reset"));
    }
}
