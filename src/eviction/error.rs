use thiserror::Error;

#[derive(Debug, Error)]
/// Errors raised while configuring the eviction planner.
pub enum EvictionError {
    /// Invalid planner configuration.
    #[error("planner configuration error: {reason}")]
    Config {
        /// Error message.
        reason: String,
    },
}

/// Convenience result type for planner configuration.
pub type EvictionResult<T> = Result<T, EvictionError>;
