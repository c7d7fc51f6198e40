use std::sync::Arc;

use crate::cache::CacheLevel;
use crate::cluster::SyncOperationKind;

/// Where a coordinator read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitSource {
    Local,
    Remote,
}

impl HitSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitSource::Local => "local",
            HitSource::Remote => "remote",
        }
    }
}

/// Named diagnostic events emitted by the engines.
///
/// Events carry no obligation on the receiver. They exist for logs, metrics and
/// tests only.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// A tiered read was served by `level`.
    Hit { cache: Arc<str>, level: CacheLevel },
    /// A tiered read checked `level` and found nothing there.
    TierMiss { cache: Arc<str>, level: CacheLevel },
    /// A tiered read missed every configured tier.
    Miss { cache: Arc<str> },
    /// A value was copied from a slower tier into a faster one.
    Promotion {
        cache: Arc<str>,
        from: CacheLevel,
        to: CacheLevel,
    },
    Put { cache: Arc<str> },
    Remove { cache: Arc<str> },
    Clear { cache: Arc<str> },

    /// A coordinator read hit (locally or via a peer).
    ClusterHit { node: Arc<str>, source: HitSource },
    ClusterMiss { node: Arc<str> },
    SyncSucceeded {
        node: Arc<str>,
        peer: String,
        kind: SyncOperationKind,
    },
    SyncFailed {
        node: Arc<str>,
        peer: String,
        kind: SyncOperationKind,
        attempts: u32,
    },
    /// A peer call failed outside of the sync path (heartbeat, remote read, catch-up).
    PeerError {
        node: Arc<str>,
        peer: String,
        operation: &'static str,
        error: String,
    },
    HeartbeatReceived { node: Arc<str>, peer: String },
    RemoteApplied {
        node: Arc<str>,
        origin: String,
        kind: SyncOperationKind,
    },
    NodeAdded { node: Arc<str>, peer: String },
    NodeRemoved { node: Arc<str>, peer: String },
    NodeUnhealthy { node: Arc<str>, peer: String },
    BacklogOverflow { node: Arc<str>, dropped: usize },
    SyncCycleCompleted {
        node: Arc<str>,
        delivered: usize,
        requeued: usize,
    },

    EvictionCandidates { strategy: String, count: usize },
    Evicted {
        key: String,
        strategy: String,
        reason: String,
    },
    ModelRetrained { samples: usize },

    /// A single tick of a background worker failed; the worker keeps running.
    TaskFailed { task: &'static str, error: String },
}

impl CacheEvent {
    /// Stable event name (used as the metrics label).
    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::TierMiss { .. } => "tier_miss",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Promotion { .. } => "promotion",
            CacheEvent::Put { .. } => "put",
            CacheEvent::Remove { .. } => "remove",
            CacheEvent::Clear { .. } => "clear",
            CacheEvent::ClusterHit { .. } => "cluster_hit",
            CacheEvent::ClusterMiss { .. } => "cluster_miss",
            CacheEvent::SyncSucceeded { .. } => "sync_succeeded",
            CacheEvent::SyncFailed { .. } => "sync_failed",
            CacheEvent::PeerError { .. } => "peer_error",
            CacheEvent::HeartbeatReceived { .. } => "heartbeat_received",
            CacheEvent::RemoteApplied { .. } => "remote_applied",
            CacheEvent::NodeAdded { .. } => "node_added",
            CacheEvent::NodeRemoved { .. } => "node_removed",
            CacheEvent::NodeUnhealthy { .. } => "node_unhealthy",
            CacheEvent::BacklogOverflow { .. } => "backlog_overflow",
            CacheEvent::SyncCycleCompleted { .. } => "sync_cycle_completed",
            CacheEvent::EvictionCandidates { .. } => "eviction_candidates",
            CacheEvent::Evicted { .. } => "evicted",
            CacheEvent::ModelRetrained { .. } => "model_retrained",
            CacheEvent::TaskFailed { .. } => "task_failed",
        }
    }
}
