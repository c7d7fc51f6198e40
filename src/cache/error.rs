use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
/// Errors returned by the tiered cache.
pub enum CacheError {
    /// A tier's backing store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The builder was finished without an L1 store.
    #[error("tiered cache requires an L1 store")]
    MissingL1,

    /// Shedding was requested but no eviction planner is attached.
    #[error("no eviction planner attached to cache '{name}'")]
    PlannerNotConfigured {
        /// Cache name.
        name: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {reason}")]
    Config {
        /// Error message.
        reason: String,
    },
}

/// Convenience result type for tiered cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
