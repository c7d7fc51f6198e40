use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Read-only metadata snapshot for one key, produced by the owning cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryInfo {
    pub key: String,
    pub size_bytes: u64,
    pub created_at: Timestamp,
    pub last_accessed_at: Timestamp,
    pub expire_at: Option<Timestamp>,
    pub access_count: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

impl CacheEntryInfo {
    /// Metadata for a freshly written entry.
    pub fn new(key: impl Into<String>, size_bytes: u64, now: Timestamp) -> Self {
        Self {
            key: key.into(),
            size_bytes,
            created_at: now,
            last_accessed_at: now,
            expire_at: None,
            access_count: 0,
            hit_count: 0,
            miss_count: 0,
        }
    }
}

/// What kind of access an [`AccessRecord`] captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
    Delete,
}

/// One entry in the access ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub timestamp: Timestamp,
    pub key: String,
    pub kind: AccessKind,
}

/// Outcome of one analysis tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisReport {
    /// Ledger records after pruning.
    pub samples: usize,
    /// Whether a new model was installed.
    pub retrained: bool,
    /// Adaptive outcomes settled this tick.
    pub settled_outcomes: usize,
}

/// Snapshot of planner counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvictionStatistics {
    pub total_analyses: u64,
    pub total_evictions: u64,
    pub evictions_by_strategy: BTreeMap<String, u64>,
    pub last_eviction_at: Option<Timestamp>,
    pub last_analysis_at: Option<Timestamp>,
    pub model_trained: bool,
    pub model_samples: usize,
    pub total_access_records: usize,
    pub unique_keys: usize,
    /// Adaptive performance score per strategy name.
    pub strategy_performance: BTreeMap<String, f64>,
}
