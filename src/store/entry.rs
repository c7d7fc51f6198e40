use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Opaque cached value.
pub type CacheValue = Bytes;

/// A stored value plus its optional absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Payload bytes.
    pub value: CacheValue,
    /// Expiry in epoch millis; `None` never expires.
    pub expire_at: Option<Timestamp>,
}

impl CacheEntry {
    pub fn new(value: CacheValue, expire_at: Option<Timestamp>) -> Self {
        Self { value, expire_at }
    }

    /// An entry is expired from its `expire_at` instant onward.
    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expire_at.is_some_and(|at| now >= at)
    }

    /// Payload length in bytes.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.value.len()
    }
}

/// Point-in-time counters reported by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    /// Physically held entries (may include expired ones not yet purged).
    pub entries: usize,
    /// Configured entry capacity, if bounded.
    pub capacity: Option<u64>,
    /// Approximate bytes held by keys and values.
    pub memory_usage: u64,
    pub hits: u64,
    pub misses: u64,
}
