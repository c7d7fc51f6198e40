use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, warn};

use super::events::CacheEvent;

/// Receiver of diagnostic events.
///
/// Implementations must not block. The engines never look at what a sink does
/// with an event.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CacheEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Hit { cache, level } => {
                debug!(cache = %cache, level = %level, "cache hit")
            }
            CacheEvent::TierMiss { cache, level } => {
                debug!(cache = %cache, level = %level, "tier miss")
            }
            CacheEvent::Miss { cache } => debug!(cache = %cache, "cache miss"),
            CacheEvent::Promotion { cache, from, to } => {
                debug!(cache = %cache, from = %from, to = %to, "promoted entry")
            }
            CacheEvent::Put { .. } | CacheEvent::Remove { .. } | CacheEvent::Clear { .. } => {
                debug!(event = event.name(), "cache mutation")
            }
            CacheEvent::ClusterHit { node, source } => {
                debug!(node = %node, source = source.as_str(), "cluster hit")
            }
            CacheEvent::ClusterMiss { node } => debug!(node = %node, "cluster miss"),
            CacheEvent::SyncSucceeded { node, peer, kind } => {
                debug!(node = %node, peer = %peer, kind = %kind, "sync delivered")
            }
            CacheEvent::SyncFailed {
                node,
                peer,
                kind,
                attempts,
            } => warn!(
                node = %node,
                peer = %peer,
                kind = %kind,
                attempts,
                "sync delivery exhausted retries, requeued"
            ),
            CacheEvent::PeerError {
                node,
                peer,
                operation,
                error,
            } => warn!(node = %node, peer = %peer, operation, error = %error, "peer call failed"),
            CacheEvent::HeartbeatReceived { node, peer } => {
                debug!(node = %node, peer = %peer, "heartbeat received")
            }
            CacheEvent::RemoteApplied { node, origin, kind } => {
                debug!(node = %node, origin = %origin, kind = %kind, "applied remote operation")
            }
            CacheEvent::NodeAdded { node, peer } => info!(node = %node, peer = %peer, "node added"),
            CacheEvent::NodeRemoved { node, peer } => {
                info!(node = %node, peer = %peer, "node removed")
            }
            CacheEvent::NodeUnhealthy { node, peer } => {
                warn!(node = %node, peer = %peer, "node marked inactive")
            }
            CacheEvent::BacklogOverflow { node, dropped } => {
                warn!(node = %node, dropped, "sync backlog overflow, dropped oldest operations")
            }
            CacheEvent::SyncCycleCompleted {
                node,
                delivered,
                requeued,
            } => debug!(node = %node, delivered, requeued, "sync cycle completed"),
            CacheEvent::EvictionCandidates { strategy, count } => {
                debug!(strategy = %strategy, count, "selected eviction candidates")
            }
            CacheEvent::Evicted {
                key,
                strategy,
                reason,
            } => debug!(key = %key, strategy = %strategy, reason = %reason, "evicted"),
            CacheEvent::ModelRetrained { samples } => {
                info!(samples, "access prediction model retrained")
            }
            CacheEvent::TaskFailed { task, error } => {
                warn!(task, error = %error, "background task tick failed")
            }
        }
    }
}

/// Counts events through the `metrics` facade.
///
/// The host application picks the exporter. Counter names use the
/// `cairn_` prefix and the `_total` suffix.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

impl EventSink for MetricsSink {
    fn emit(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Hit { cache, level } => counter!(
                "cairn_cache_hits_total",
                "cache" => cache.to_string(),
                "tier" => level.as_str()
            )
            .increment(1),
            CacheEvent::TierMiss { cache, level } => counter!(
                "cairn_cache_misses_total",
                "cache" => cache.to_string(),
                "tier" => level.as_str()
            )
            .increment(1),
            CacheEvent::Promotion { cache, from, to } => counter!(
                "cairn_cache_promotions_total",
                "cache" => cache.to_string(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1),
            CacheEvent::SyncSucceeded { peer, kind, .. } => counter!(
                "cairn_sync_deliveries_total",
                "peer" => peer.clone(),
                "kind" => kind.as_str(),
                "status" => "success"
            )
            .increment(1),
            CacheEvent::SyncFailed { peer, kind, .. } => counter!(
                "cairn_sync_deliveries_total",
                "peer" => peer.clone(),
                "kind" => kind.as_str(),
                "status" => "failure"
            )
            .increment(1),
            CacheEvent::EvictionCandidates { strategy, count } => counter!(
                "cairn_eviction_candidates_total",
                "strategy" => strategy.clone()
            )
            .increment(*count as u64),
            CacheEvent::Evicted { strategy, .. } => counter!(
                "cairn_evictions_total",
                "strategy" => strategy.clone()
            )
            .increment(1),
            other => counter!("cairn_events_total", "event" => other.name()).increment(1),
        }
    }
}

/// Forwards every event to several sinks.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &CacheEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// Records events in memory for assertions.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<CacheEvent>>,
}

#[cfg(any(test, feature = "mock"))]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().clone()
    }

    /// Counts recorded events with the given [`CacheEvent::name`].
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[cfg(any(test, feature = "mock"))]
impl EventSink for RecordingSink {
    fn emit(&self, event: &CacheEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Cloneable handle the engines emit through.
///
/// A panicking sink is contained here so a broken exporter can never affect
/// cache behavior.
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn EventSink>,
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Diagnostics that log through `tracing`.
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    pub fn emit(&self, event: CacheEvent) {
        let sink = &self.sink;
        if catch_unwind(AssertUnwindSafe(|| sink.emit(&event))).is_err() {
            warn!(event = event.name(), "diagnostic sink panicked, event dropped");
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::tracing()
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics").finish_non_exhaustive()
    }
}
