//! Fault-injecting store wrapper for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::entry::{CacheEntry, CacheValue, StoreStatistics};
use super::error::{StoreError, StoreResult};
use super::memory::MemoryStore;
use super::BackingStore;
use crate::clock::Timestamp;

/// A [`MemoryStore`] that can be told to fail.
///
/// `fail_gets_after(n)` lets the first `n` reads succeed and fails every later
/// one; `set_unavailable(true)` fails every call.
#[derive(Debug)]
pub struct FlakyStore {
    inner: MemoryStore,
    get_calls: AtomicUsize,
    allowed_gets: AtomicUsize,
    unavailable: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            get_calls: AtomicUsize::new(0),
            allowed_gets: AtomicUsize::new(usize::MAX),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn fail_gets_after(&self, successful: usize) {
        self.allowed_gets.store(successful, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `get` calls observed so far.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                name: self.inner.name().to_string(),
            });
        }
        Ok(())
    }
}

impl BackingStore for FlakyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, key: &str) -> StoreResult<Option<CacheEntry>> {
        self.check()?;
        let call = self.get_calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.allowed_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!(
                "injected failure on get #{}",
                call + 1
            )));
        }
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: CacheValue, expire_at: Option<Timestamp>) -> StoreResult<()> {
        self.check()?;
        self.inner.put(key, value, expire_at)
    }

    fn remove(&self, key: &str) -> StoreResult<Option<CacheValue>> {
        self.check()?;
        self.inner.remove(key)
    }

    fn clear(&self) -> StoreResult<()> {
        self.check()?;
        self.inner.clear()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn statistics(&self) -> StoreStatistics {
        self.inner.statistics()
    }

    fn entries(&self) -> StoreResult<Vec<(String, CacheEntry)>> {
        self.check()?;
        self.inner.entries()
    }
}
