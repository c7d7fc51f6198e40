//! Tiered cache over pluggable backing stores.
//!
//! [`TieredCache`] reads L1, then L2, then L3, copying hits upward; writes
//! go to every configured tier. Tiers are any [`BackingStore`](crate::store::BackingStore),
//! or in-memory stores built from a [`TieredCacheConfig`].

pub mod config;
pub mod error;
pub mod tiered;
pub mod types;

#[cfg(test)]
mod tiered_tests;

pub use config::{
    DEFAULT_L1_CAPACITY, DEFAULT_L1_TTL, DEFAULT_L2_CAPACITY, DEFAULT_L2_TTL, DEFAULT_L3_CAPACITY,
    DEFAULT_L3_TTL, TierConfig, TieredCacheConfig,
};
pub use error::{CacheError, CacheResult};
pub use tiered::{SHED_REASON, TieredCache, TieredCacheBuilder};
pub use types::{CacheLevel, TieredLookupResult, TieredStatistics};
