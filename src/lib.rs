//! Cairn library crate (used by the node binary and integration tests).
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`TieredCache`], [`TieredCacheConfig`] - L1/L2/L3 read-through, write-through cache
//! - [`ClusterCoordinator`], [`LocalTransport`] - replication and membership
//! - [`EvictionPlanner`], [`EvictionStrategy`] - candidate selection and access learning
//! - [`Config`], [`ConfigError`] - environment-backed node configuration
//!
//! ## Storage
//! - [`BackingStore`], [`MemoryStore`] - tier storage seam and the in-memory store
//!
//! ## Ambient
//! - [`Clock`], [`ManualClock`] - injectable millisecond time
//! - [`Diagnostics`], [`CacheEvent`] - named events for logs, metrics and tests
//! - [`WorkerHandle`] - supervised periodic tasks
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod clock;
pub mod cluster;
pub mod config;
pub mod diagnostics;
pub mod eviction;
pub mod resilience;
pub mod store;
pub mod worker;

pub use cache::{
    CacheError, CacheLevel, CacheResult, TierConfig, TieredCache, TieredCacheBuilder,
    TieredCacheConfig, TieredLookupResult, TieredStatistics,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock, Timestamp, system_clock};
pub use cluster::{
    ClusterConfig, ClusterCoordinator, ClusterError, ClusterResult, ClusterStatistics,
    ClusterWorkers, LocalTransport, NodeInfo, NodeStatus, SyncOperation, SyncOperationKind,
    Transport, TransportError,
};
pub use config::{Config, ConfigError};
#[cfg(any(test, feature = "mock"))]
pub use diagnostics::RecordingSink;
pub use diagnostics::{CacheEvent, Diagnostics, EventSink, HitSource, MetricsSink, TracingSink};
pub use eviction::{
    AccessKind, CacheEntryInfo, EvictionPlanner, EvictionStatistics, EvictionStrategy,
    PlannerConfig, StrategyWeights,
};
pub use resilience::RetryConfig;
#[cfg(any(test, feature = "mock"))]
pub use store::FlakyStore;
pub use store::{BackingStore, CacheEntry, CacheValue, MemoryStore, StoreError, StoreResult};
pub use worker::WorkerHandle;
