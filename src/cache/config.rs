use std::sync::Arc;
use std::time::Duration;

use super::error::{CacheError, CacheResult};
use crate::clock::SharedClock;
use crate::store::{BackingStore, MemoryStore};

pub const DEFAULT_L1_CAPACITY: u64 = 100;
pub const DEFAULT_L2_CAPACITY: u64 = 1_000;
pub const DEFAULT_L3_CAPACITY: u64 = 10_000;
pub const DEFAULT_L1_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_L2_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_L3_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Settings for one in-memory tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TierConfig {
    pub enabled: bool,
    /// Maximum entries held by the tier.
    pub capacity: u64,
    /// Expiry applied to writes that carry none.
    pub default_ttl: Option<Duration>,
}

impl TierConfig {
    pub fn new(capacity: u64, default_ttl: Option<Duration>) -> Self {
        Self {
            enabled: true,
            capacity,
            default_ttl,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            capacity: 0,
            default_ttl: None,
        }
    }

    fn build_store(&self, name: String, clock: &SharedClock) -> Option<Arc<dyn BackingStore>> {
        if !self.enabled {
            return None;
        }
        let mut store = MemoryStore::with_capacity(name, self.capacity).clock(Arc::clone(clock));
        if let Some(ttl) = self.default_ttl {
            store = store.default_ttl(ttl);
        }
        Some(Arc::new(store))
    }
}

/// Tier layout for a [`TieredCache`](super::TieredCache) built from in-memory stores.
#[derive(Debug, Clone, PartialEq)]
pub struct TieredCacheConfig {
    pub name: String,
    pub l1: TierConfig,
    pub l2: TierConfig,
    pub l3: TierConfig,
    /// Copy lower-tier hits into faster tiers.
    pub enable_promotion: bool,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            l1: TierConfig::new(DEFAULT_L1_CAPACITY, Some(DEFAULT_L1_TTL)),
            l2: TierConfig::new(DEFAULT_L2_CAPACITY, Some(DEFAULT_L2_TTL)),
            l3: TierConfig {
                enabled: false,
                ..TierConfig::new(DEFAULT_L3_CAPACITY, Some(DEFAULT_L3_TTL))
            },
            enable_promotion: true,
        }
    }
}

impl TieredCacheConfig {
    /// A memory-only (L1) layout.
    pub fn memory_only(capacity: u64) -> Self {
        Self {
            l1: TierConfig::new(capacity, None),
            l2: TierConfig::disabled(),
            l3: TierConfig::disabled(),
            ..Default::default()
        }
    }

    /// An L1 + L2 layout without default TTLs.
    pub fn two_level(l1_capacity: u64, l2_capacity: u64) -> Self {
        Self {
            l1: TierConfig::new(l1_capacity, None),
            l2: TierConfig::new(l2_capacity, None),
            l3: TierConfig::disabled(),
            ..Default::default()
        }
    }

    /// An L1 + L2 + L3 layout without default TTLs.
    pub fn three_level(l1_capacity: u64, l2_capacity: u64, l3_capacity: u64) -> Self {
        Self {
            l1: TierConfig::new(l1_capacity, None),
            l2: TierConfig::new(l2_capacity, None),
            l3: TierConfig::new(l3_capacity, None),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn enable_promotion(mut self, enabled: bool) -> Self {
        self.enable_promotion = enabled;
        self
    }

    pub fn validate(&self) -> CacheResult<()> {
        if !self.l1.enabled {
            return Err(CacheError::Config {
                reason: "L1 tier must be enabled".to_string(),
            });
        }
        for (label, tier) in [("l1", &self.l1), ("l2", &self.l2), ("l3", &self.l3)] {
            if tier.enabled && tier.capacity == 0 {
                return Err(CacheError::Config {
                    reason: format!("{label} capacity must be > 0"),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn build_stores(
        &self,
        clock: &SharedClock,
    ) -> CacheResult<(
        Arc<dyn BackingStore>,
        Option<Arc<dyn BackingStore>>,
        Option<Arc<dyn BackingStore>>,
    )> {
        self.validate()?;
        let l1 = self
            .l1
            .build_store(format!("{}-l1", self.name), clock)
            .ok_or(CacheError::MissingL1)?;
        let l2 = self.l2.build_store(format!("{}-l2", self.name), clock);
        let l3 = self.l3.build_store(format!("{}-l3", self.name), clock);
        Ok((l1, l2, l3))
    }
}
