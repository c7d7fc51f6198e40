use crate::store::{CacheEntry, CacheValue};

/// A cache tier, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheLevel {
    L1,
    L2,
    L3,
}

impl CacheLevel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLevel::L1 => "L1",
            CacheLevel::L2 => "L2",
            CacheLevel::L3 => "L3",
        }
    }
}

impl std::fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a tiered lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum TieredLookupResult {
    /// Found in `level` (and promoted upward when enabled).
    Hit { level: CacheLevel, entry: CacheEntry },
    Miss,
}

impl TieredLookupResult {
    pub fn is_hit(&self) -> bool {
        !matches!(self, TieredLookupResult::Miss)
    }

    /// Tier that served the hit.
    pub fn level(&self) -> Option<CacheLevel> {
        match self {
            TieredLookupResult::Hit { level, .. } => Some(*level),
            TieredLookupResult::Miss => None,
        }
    }

    pub fn into_value(self) -> Option<CacheValue> {
        match self {
            TieredLookupResult::Hit { entry, .. } => Some(entry.value),
            TieredLookupResult::Miss => None,
        }
    }
}

/// Snapshot of tiered cache counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TieredStatistics {
    pub name: String,
    pub l1_size: usize,
    pub l2_size: usize,
    pub l3_size: usize,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub l3_hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub overall_hit_rate: f64,
    pub l1_hit_rate: f64,
    pub l2_hit_rate: f64,
    pub l3_hit_rate: f64,
    pub l1_memory_usage: u64,
    pub l2_memory_usage: u64,
    pub l3_memory_usage: u64,
    pub total_memory_usage: u64,
}

impl TieredStatistics {
    /// Hits plus misses.
    pub fn total_requests(&self) -> u64 {
        self.l1_hits + self.l2_hits + self.l3_hits + self.misses
    }
}
