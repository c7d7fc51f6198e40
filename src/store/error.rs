use thiserror::Error;

/// Errors returned by a [`BackingStore`](super::BackingStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The backend is not reachable right now.
    #[error("store '{name}' is unavailable")]
    Unavailable {
        /// Store name.
        name: String,
    },
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
