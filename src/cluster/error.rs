use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Error)]
/// Errors returned by transports.
pub enum TransportError {
    /// The peer could not be reached.
    #[error("peer '{peer}' unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    /// The peer received the request but refused or failed to apply it.
    #[error("peer '{peer}' rejected request: {reason}")]
    Rejected { peer: String, reason: String },

    /// The request did not complete within the configured timeout.
    #[error("request to peer '{peer}' timed out after {timeout_ms}ms")]
    Timeout { peer: String, timeout_ms: u64 },
}

/// Convenience result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
/// Errors returned by the cluster coordinator.
pub enum ClusterError {
    /// The local tiered cache failed.
    #[error("local cache error: {0}")]
    Cache(#[from] CacheError),

    /// A replicated operation could not be applied.
    #[error("invalid sync operation: {reason}")]
    InvalidOperation { reason: String },

    /// Invalid configuration.
    #[error("cluster configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience result type for coordinator operations.
pub type ClusterResult<T> = Result<T, ClusterError>;
