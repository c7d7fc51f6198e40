//! Backing stores: the key → value capability each cache tier is built on.

pub mod entry;
pub mod error;
pub mod memory;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use entry::{CacheEntry, CacheValue, StoreStatistics};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
#[cfg(any(test, feature = "mock"))]
pub use mock::FlakyStore;

use crate::clock::Timestamp;

/// Key → value storage used as one cache tier.
///
/// Reads must treat an expired entry as absent. Implementations own their
/// internal eviction policy; the tiered cache never inspects it.
pub trait BackingStore: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Returns the live entry for `key`.
    fn get(&self, key: &str) -> StoreResult<Option<CacheEntry>>;

    /// Stores `value`. `None` expiry lets the store apply its own default.
    fn put(&self, key: &str, value: CacheValue, expire_at: Option<Timestamp>) -> StoreResult<()>;

    /// Removes `key`, returning the live value it held.
    fn remove(&self, key: &str) -> StoreResult<Option<CacheValue>>;

    fn clear(&self) -> StoreResult<()>;

    /// Number of held entries.
    fn size(&self) -> usize;

    fn statistics(&self) -> StoreStatistics;

    /// Snapshot of every live entry.
    fn entries(&self) -> StoreResult<Vec<(String, CacheEntry)>>;
}
