//! In-memory backing store.
//!
//! Entries live in a bounded `moka` cache with a plain LRU policy. Per-entry
//! expiry is checked on every read, so an expired entry is a miss even before
//! it is purged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use super::entry::{CacheEntry, CacheValue, StoreStatistics};
use super::error::StoreResult;
use super::BackingStore;
use crate::clock::{SharedClock, Timestamp, expiry_after, system_clock};

/// Bounded in-memory store keyed by string.
pub struct MemoryStore {
    name: String,
    entries: Cache<String, CacheEntry>,
    capacity: u64,
    default_ttl: Option<Duration>,
    clock: SharedClock,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryStore {
    const DEFAULT_CAPACITY: u64 = 10_000;

    /// Creates a store with the default capacity and no default TTL.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, Self::DEFAULT_CAPACITY)
    }

    /// Creates a store holding at most `capacity` entries (LRU eviction).
    pub fn with_capacity(name: impl Into<String>, capacity: u64) -> Self {
        Self::build(name.into(), capacity, None, system_clock())
    }

    /// Applies a default TTL to puts that carry no explicit expiry.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Replaces the clock used for expiry checks.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    fn build(
        name: String,
        capacity: u64,
        default_ttl: Option<Duration>,
        clock: SharedClock,
    ) -> Self {
        Self {
            name,
            entries: Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            capacity,
            default_ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Runs any pending maintenance (eviction bookkeeping) in the underlying cache.
    #[inline]
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    /// Drops every expired entry now.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let expired: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key)
            .collect();
        for key in &expired {
            self.entries.invalidate(key.as_str());
        }
        expired.len()
    }

    fn resolve_expiry(&self, expire_at: Option<Timestamp>) -> Option<Timestamp> {
        expire_at.or_else(|| {
            self.default_ttl
                .map(|ttl| expiry_after(self.clock.now_millis(), ttl))
        })
    }
}

impl BackingStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> StoreResult<Option<CacheEntry>> {
        let now = self.clock.now_millis();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry))
            }
            Some(_) => {
                self.entries.invalidate(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn put(&self, key: &str, value: CacheValue, expire_at: Option<Timestamp>) -> StoreResult<()> {
        let entry = CacheEntry::new(value, self.resolve_expiry(expire_at));
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<Option<CacheValue>> {
        let now = self.clock.now_millis();
        Ok(self
            .entries
            .remove(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value))
    }

    fn clear(&self) -> StoreResult<()> {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
        Ok(())
    }

    fn size(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    fn statistics(&self) -> StoreStatistics {
        self.entries.run_pending_tasks();
        let memory_usage = self
            .entries
            .iter()
            .map(|(key, entry)| (key.len() + entry.size_bytes()) as u64)
            .sum();
        StoreStatistics {
            entries: self.entries.entry_count() as usize,
            capacity: Some(self.capacity),
            memory_usage,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn entries(&self) -> StoreResult<Vec<(String, CacheEntry)>> {
        self.entries.run_pending_tasks();
        let now = self.clock.now_millis();
        Ok(self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (key.as_ref().clone(), entry))
            .collect())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.name)
            .field("entries", &self.entries.entry_count())
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
