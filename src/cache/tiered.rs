//! Tiered cache: L1 (fast) → L2 (larger) → L3 (largest), write-through.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, instrument, warn};

use super::config::TieredCacheConfig;
use super::error::{CacheError, CacheResult};
use super::types::{CacheLevel, TieredLookupResult, TieredStatistics};
use crate::clock::{SharedClock, Timestamp, system_clock};
use crate::diagnostics::{CacheEvent, Diagnostics};
use crate::eviction::{AccessKind, CacheEntryInfo, EvictionPlanner};
use crate::store::{BackingStore, CacheEntry, CacheValue};

/// Reason recorded for keys removed by [`TieredCache::shed_l1`].
pub const SHED_REASON: &str = "l1_shed";

/// A read path that checks faster tiers first and copies lower-tier hits upward.
///
/// Writes go to every configured tier before returning. Expiry is the stores'
/// business; this type only routes.
pub struct TieredCache {
    name: Arc<str>,
    l1: Arc<dyn BackingStore>,
    l2: Option<Arc<dyn BackingStore>>,
    l3: Option<Arc<dyn BackingStore>>,
    enable_promotion: bool,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    l3_hits: AtomicU64,
    misses: AtomicU64,
    promotions: AtomicU64,
    planner: Option<Arc<EvictionPlanner>>,
    /// Per-key access metadata, kept only while a planner is attached.
    metadata: DashMap<String, CacheEntryInfo>,
    /// Metadata size that triggers a prune against the live keys.
    metadata_limit: Option<usize>,
    clock: SharedClock,
    diagnostics: Diagnostics,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("name", &self.name)
            .field("l1", &self.l1.name())
            .field("l2", &self.l2.as_ref().map(|s| s.name().to_string()))
            .field("l3", &self.l3.as_ref().map(|s| s.name().to_string()))
            .field("enable_promotion", &self.enable_promotion)
            .field("planner", &self.planner.is_some())
            .finish()
    }
}

impl TieredCache {
    pub fn builder(name: &str) -> TieredCacheBuilder {
        TieredCacheBuilder::new(name)
    }

    /// Builds a cache whose tiers are in-memory stores laid out by `config`.
    pub fn from_config(config: &TieredCacheConfig) -> CacheResult<Self> {
        TieredCacheBuilder::new(&config.name).config(config.clone()).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn l1(&self) -> &Arc<dyn BackingStore> {
        &self.l1
    }

    pub fn l2(&self) -> Option<&Arc<dyn BackingStore>> {
        self.l2.as_ref()
    }

    pub fn l3(&self) -> Option<&Arc<dyn BackingStore>> {
        self.l3.as_ref()
    }

    pub fn planner(&self) -> Option<&Arc<EvictionPlanner>> {
        self.planner.as_ref()
    }

    pub fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        Ok(self.lookup(key)?.into_value())
    }

    /// Looks `key` up tier by tier, promoting lower-tier hits when enabled.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub fn lookup(&self, key: &str) -> CacheResult<TieredLookupResult> {
        if let Some(entry) = self.l1.get(key)? {
            debug!("L1 hit");
            return Ok(self.hit(key, CacheLevel::L1, entry, &self.l1_hits));
        }
        self.tier_miss(CacheLevel::L1);

        if let Some(l2) = &self.l2 {
            if let Some(entry) = l2.get(key)? {
                debug!("L2 hit");
                if self.enable_promotion {
                    self.promote(key, &entry, CacheLevel::L2, CacheLevel::L1, &self.l1);
                }
                return Ok(self.hit(key, CacheLevel::L2, entry, &self.l2_hits));
            }
            self.tier_miss(CacheLevel::L2);
        }

        if let Some(l3) = &self.l3 {
            if let Some(entry) = l3.get(key)? {
                debug!("L3 hit");
                if self.enable_promotion {
                    if let Some(l2) = &self.l2 {
                        self.promote(key, &entry, CacheLevel::L3, CacheLevel::L2, l2);
                    }
                    self.promote(key, &entry, CacheLevel::L3, CacheLevel::L1, &self.l1);
                }
                return Ok(self.hit(key, CacheLevel::L3, entry, &self.l3_hits));
            }
            self.tier_miss(CacheLevel::L3);
        }

        debug!("Miss on every tier");
        self.misses.fetch_add(1, Ordering::Relaxed);
        if self.planner.is_some() {
            if let Some(mut info) = self.metadata.get_mut(key) {
                info.miss_count += 1;
            }
        }
        self.diagnostics.emit(CacheEvent::Miss {
            cache: Arc::clone(&self.name),
        });
        Ok(TieredLookupResult::Miss)
    }

    fn tier_miss(&self, level: CacheLevel) {
        self.diagnostics.emit(CacheEvent::TierMiss {
            cache: Arc::clone(&self.name),
            level,
        });
    }

    fn hit(
        &self,
        key: &str,
        level: CacheLevel,
        entry: CacheEntry,
        counter: &AtomicU64,
    ) -> TieredLookupResult {
        counter.fetch_add(1, Ordering::Relaxed);
        self.diagnostics.emit(CacheEvent::Hit {
            cache: Arc::clone(&self.name),
            level,
        });

        if let Some(planner) = &self.planner {
            let now = self.clock.now_millis();
            let mut info = self.metadata.entry(key.to_string()).or_insert_with(|| {
                CacheEntryInfo::new(key, (key.len() + entry.size_bytes()) as u64, now)
            });
            info.last_accessed_at = now;
            info.access_count += 1;
            info.hit_count += 1;
            info.expire_at = entry.expire_at;
            let snapshot = info.clone();
            drop(info);
            planner.record_access(key, &snapshot);
        }

        TieredLookupResult::Hit { level, entry }
    }

    /// Copies `entry` into `target`. A failed copy is logged; the read still succeeds.
    fn promote(
        &self,
        key: &str,
        entry: &CacheEntry,
        from: CacheLevel,
        to: CacheLevel,
        target: &Arc<dyn BackingStore>,
    ) {
        match target.put(key, entry.value.clone(), entry.expire_at) {
            Ok(()) => {
                self.promotions.fetch_add(1, Ordering::Relaxed);
                self.diagnostics.emit(CacheEvent::Promotion {
                    cache: Arc::clone(&self.name),
                    from,
                    to,
                });
            }
            Err(e) => {
                warn!(cache = %self.name, key, %from, %to, error = %e, "Promotion failed");
            }
        }
    }

    /// Writes to every configured tier.
    #[instrument(skip(self, value), fields(cache = %self.name, value_len = value.len()))]
    pub fn put(
        &self,
        key: &str,
        value: CacheValue,
        expire_at: Option<Timestamp>,
    ) -> CacheResult<()> {
        let size = (key.len() + value.len()) as u64;
        self.l1.put(key, value.clone(), expire_at)?;
        if let Some(l2) = &self.l2 {
            l2.put(key, value.clone(), expire_at)?;
        }
        if let Some(l3) = &self.l3 {
            l3.put(key, value, expire_at)?;
        }

        if let Some(planner) = &self.planner {
            let now = self.clock.now_millis();
            self.metadata
                .entry(key.to_string())
                .and_modify(|info| {
                    info.size_bytes = size;
                    info.expire_at = expire_at;
                    info.last_accessed_at = now;
                })
                .or_insert_with(|| CacheEntryInfo {
                    expire_at,
                    ..CacheEntryInfo::new(key, size, now)
                });
            planner.record_access_kind(key, AccessKind::Write);

            // Stores evict on their own; drop metadata they no longer back.
            if self
                .metadata_limit
                .is_some_and(|limit| self.metadata.len() > limit)
            {
                let live = self.snapshot()?;
                self.retain_metadata(&live);
            }
        }

        self.diagnostics.emit(CacheEvent::Put {
            cache: Arc::clone(&self.name),
        });
        Ok(())
    }

    /// Removes `key` from every tier; returns the value from the fastest tier that held it.
    pub fn remove(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        let from_l1 = self.l1.remove(key)?;
        let from_l2 = match &self.l2 {
            Some(l2) => l2.remove(key)?,
            None => None,
        };
        let from_l3 = match &self.l3 {
            Some(l3) => l3.remove(key)?,
            None => None,
        };

        if let Some(planner) = &self.planner {
            self.metadata.remove(key);
            planner.record_access_kind(key, AccessKind::Delete);
        }

        self.diagnostics.emit(CacheEvent::Remove {
            cache: Arc::clone(&self.name),
        });
        Ok(from_l1.or(from_l2).or(from_l3))
    }

    pub fn clear(&self) -> CacheResult<()> {
        self.l1.clear()?;
        if let Some(l2) = &self.l2 {
            l2.clear()?;
        }
        if let Some(l3) = &self.l3 {
            l3.clear()?;
        }
        self.metadata.clear();
        self.diagnostics.emit(CacheEvent::Clear {
            cache: Arc::clone(&self.name),
        });
        Ok(())
    }

    /// Number of entries in L1.
    pub fn size(&self) -> usize {
        self.l1.size()
    }

    /// Number of keys with planner metadata.
    pub fn tracked_keys(&self) -> usize {
        self.metadata.len()
    }

    /// Returns `true` if any tier holds a live entry for `key`.
    ///
    /// Does not count as a read: no statistics, promotion or access record.
    pub fn contains(&self, key: &str) -> CacheResult<bool> {
        Ok(self.peek(key)?.is_some())
    }

    /// Reads the fastest live copy without statistics, promotion or access recording.
    pub fn peek(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        for store in self.stores() {
            if let Some(entry) = store.get(key)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    fn stores(&self) -> impl Iterator<Item = &Arc<dyn BackingStore>> {
        std::iter::once(&self.l1)
            .chain(self.l2.as_ref())
            .chain(self.l3.as_ref())
    }

    /// Reads several keys; absent keys are left out of the result.
    pub fn get_all<'k, I>(&self, keys: I) -> CacheResult<HashMap<String, CacheValue>>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(value) = self.get(key)? {
                found.insert(key.to_string(), value);
            }
        }
        Ok(found)
    }

    pub fn put_all<I>(&self, entries: I, expire_at: Option<Timestamp>) -> CacheResult<()>
    where
        I: IntoIterator<Item = (String, CacheValue)>,
    {
        for (key, value) in entries {
            self.put(&key, value, expire_at)?;
        }
        Ok(())
    }

    /// Loads and writes every key in `keys` that no tier holds. Returns how many were loaded.
    ///
    /// Keys for which `loader` returns `None` are skipped.
    pub async fn warm_up<F, Fut>(
        &self,
        keys: &[String],
        expire_at: Option<Timestamp>,
        mut loader: F,
    ) -> CacheResult<usize>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Option<CacheValue>>,
    {
        let mut loaded = 0;
        for key in keys {
            if self.contains(key)? {
                continue;
            }
            if let Some(value) = loader(key.clone()).await {
                self.put(key, value, expire_at)?;
                loaded += 1;
            }
        }
        debug!(cache = %self.name, requested = keys.len(), loaded, "Warm-up finished");
        Ok(loaded)
    }

    /// Returns the cached value, or loads, stores and returns it.
    pub async fn get_or_insert_with<F, Fut>(
        &self,
        key: &str,
        expire_at: Option<Timestamp>,
        loader: F,
    ) -> CacheResult<CacheValue>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheValue>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }
        let value = loader().await;
        self.put(key, value.clone(), expire_at)?;
        Ok(value)
    }

    /// Every live entry across tiers; the faster tier's copy wins.
    pub fn snapshot(&self) -> CacheResult<HashMap<String, CacheEntry>> {
        let mut merged = HashMap::new();
        for store in [self.l3.as_ref(), self.l2.as_ref(), Some(&self.l1)]
            .into_iter()
            .flatten()
        {
            merged.extend(store.entries()?);
        }
        Ok(merged)
    }

    /// Planner metadata for every live key.
    ///
    /// Keys the cache has no metadata for (written before a planner was
    /// attached, or by another writer into a shared store) get a fresh record.
    pub fn entry_infos(&self) -> CacheResult<HashMap<String, CacheEntryInfo>> {
        let live = self.snapshot()?;
        self.retain_metadata(&live);
        Ok(self.infos_for(live))
    }

    fn retain_metadata(&self, live: &HashMap<String, CacheEntry>) {
        self.metadata.retain(|key, _| live.contains_key(key));
    }

    fn infos_for(
        &self,
        entries: impl IntoIterator<Item = (String, CacheEntry)>,
    ) -> HashMap<String, CacheEntryInfo> {
        let now = self.clock.now_millis();
        entries
            .into_iter()
            .map(|(key, entry)| {
                let info = match self.metadata.get(&key) {
                    Some(info) => info.clone(),
                    None => CacheEntryInfo {
                        expire_at: entry.expire_at,
                        ..CacheEntryInfo::new(&key, (key.len() + entry.size_bytes()) as u64, now)
                    },
                };
                (key, info)
            })
            .collect()
    }

    /// Evicts up to `count` keys from L1 chosen by `strategy`.
    ///
    /// Lower tiers keep their copies, so a later read promotes the key back.
    /// Returns the evicted keys, best candidate first.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub fn shed_l1(&self, count: usize, strategy: &str) -> CacheResult<Vec<String>> {
        let planner = self
            .planner
            .as_ref()
            .ok_or_else(|| CacheError::PlannerNotConfigured {
                name: self.name.to_string(),
            })?;

        let live = self.snapshot()?;
        self.retain_metadata(&live);
        let infos = self.infos_for(self.l1.entries()?);
        let candidates = planner.select_candidates(&infos, count, strategy);
        let mut evicted = Vec::with_capacity(candidates.len());
        for key in candidates {
            if self.l1.remove(&key)?.is_some() {
                if self.peek(&key)?.is_none() {
                    self.metadata.remove(&key);
                }
                planner.record_eviction(&key, strategy, SHED_REASON);
                evicted.push(key);
            }
        }
        debug!(requested = count, evicted = evicted.len(), "Shed L1 entries");
        Ok(evicted)
    }

    pub fn statistics(&self) -> TieredStatistics {
        let l1_hits = self.l1_hits.load(Ordering::Relaxed);
        let l2_hits = self.l2_hits.load(Ordering::Relaxed);
        let l3_hits = self.l3_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = l1_hits + l2_hits + l3_hits + misses;
        let rate = |hits: u64| {
            if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            }
        };

        let l1_stats = self.l1.statistics();
        let l2_stats = self.l2.as_ref().map(|s| s.statistics()).unwrap_or_default();
        let l3_stats = self.l3.as_ref().map(|s| s.statistics()).unwrap_or_default();

        TieredStatistics {
            name: self.name.to_string(),
            l1_size: l1_stats.entries,
            l2_size: l2_stats.entries,
            l3_size: l3_stats.entries,
            l1_hits,
            l2_hits,
            l3_hits,
            misses,
            promotions: self.promotions.load(Ordering::Relaxed),
            overall_hit_rate: rate(l1_hits + l2_hits + l3_hits),
            l1_hit_rate: rate(l1_hits),
            l2_hit_rate: rate(l2_hits),
            l3_hit_rate: rate(l3_hits),
            l1_memory_usage: l1_stats.memory_usage,
            l2_memory_usage: l2_stats.memory_usage,
            l3_memory_usage: l3_stats.memory_usage,
            total_memory_usage: l1_stats.memory_usage
                + l2_stats.memory_usage
                + l3_stats.memory_usage,
        }
    }
}

/// Assembles a [`TieredCache`] from explicit stores or a [`TieredCacheConfig`].
pub struct TieredCacheBuilder {
    name: String,
    l1: Option<Arc<dyn BackingStore>>,
    l2: Option<Arc<dyn BackingStore>>,
    l3: Option<Arc<dyn BackingStore>>,
    config: Option<TieredCacheConfig>,
    enable_promotion: bool,
    planner: Option<Arc<EvictionPlanner>>,
    clock: SharedClock,
    diagnostics: Diagnostics,
}

impl TieredCacheBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            l1: None,
            l2: None,
            l3: None,
            config: None,
            enable_promotion: true,
            planner: None,
            clock: system_clock(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn l1(mut self, store: Arc<dyn BackingStore>) -> Self {
        self.l1 = Some(store);
        self
    }

    pub fn l2(mut self, store: Arc<dyn BackingStore>) -> Self {
        self.l2 = Some(store);
        self
    }

    pub fn l3(mut self, store: Arc<dyn BackingStore>) -> Self {
        self.l3 = Some(store);
        self
    }

    /// Builds in-memory tiers from `config` when no L1 store is given.
    pub fn config(mut self, config: TieredCacheConfig) -> Self {
        self.enable_promotion = config.enable_promotion;
        self.config = Some(config);
        self
    }

    pub fn enable_promotion(mut self, enabled: bool) -> Self {
        self.enable_promotion = enabled;
        self
    }

    pub fn planner(mut self, planner: Arc<EvictionPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn build(self) -> CacheResult<TieredCache> {
        let (l1, l2, l3) = match (self.l1, &self.config) {
            (Some(l1), _) => (l1, self.l2, self.l3),
            (None, Some(config)) => config.build_stores(&self.clock)?,
            (None, None) => return Err(CacheError::MissingL1),
        };
        let metadata_limit = std::iter::once(&l1)
            .chain(l2.as_ref())
            .chain(l3.as_ref())
            .map(|store| store.statistics().capacity)
            .sum::<Option<u64>>()
            .map(|capacity| (capacity as usize).saturating_mul(2));

        Ok(TieredCache {
            name: Arc::from(self.name.as_str()),
            l1,
            l2,
            l3,
            enable_promotion: self.enable_promotion,
            l1_hits: AtomicU64::new(0),
            l2_hits: AtomicU64::new(0),
            l3_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            planner: self.planner,
            metadata: DashMap::new(),
            metadata_limit,
            clock: self.clock,
            diagnostics: self.diagnostics,
        })
    }
}
