//! Eviction planning.
//!
//! The [`EvictionPlanner`] ranks keys for eviction from a snapshot of
//! [`CacheEntryInfo`] using one of the [`EvictionStrategy`] variants or a
//! weighted blend of several, and learns access patterns from the ledger it
//! keeps:
//!
//! - `predictive` ranks by a frequency/recency model retrained on each
//!   analysis tick once enough samples exist (LRU until then).
//! - `adaptive` blends the base strategies by how rarely their evictions are
//!   regretted.

pub mod adaptive;
pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod planner;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod tests;

pub use adaptive::AdaptiveTuner;
pub use config::{PlannerConfig, StrategyWeights, default_hybrid_weights};
pub use error::{EvictionError, EvictionResult};
pub use ledger::AccessLedger;
pub use model::AccessModel;
pub use planner::EvictionPlanner;
pub use strategy::{EvictionStrategy, SelectionContext};
pub use types::{AccessKind, AccessRecord, AnalysisReport, CacheEntryInfo, EvictionStatistics};
