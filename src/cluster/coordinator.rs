use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::backlog::{Backlog, PendingSync};
use super::config::ClusterConfig;
use super::error::{ClusterError, ClusterResult, TransportError};
use super::node::{NodeInfo, NodeStatus};
use super::operation::SyncOperation;
use super::transport::Transport;
use super::types::{CatchUpReport, ClusterStatistics, HealthReport, SyncReport};
use super::workers::ClusterWorkers;
use crate::cache::TieredCache;
use crate::clock::{SharedClock, Timestamp, expiry_after, system_clock};
use crate::diagnostics::{CacheEvent, Diagnostics, HitSource};
use crate::resilience::retry;
use crate::store::CacheValue;
use crate::worker::spawn_periodic;

/// Replicates local mutations to peers and tracks their liveness.
///
/// Mutations apply to the local [`TieredCache`] immediately and are queued;
/// the sync worker later drains the queue to every active peer. Delivery is
/// at-least-once; applying a delivered operation is idempotent.
pub struct ClusterCoordinator {
    node_id: Arc<str>,
    config: ClusterConfig,
    cache: Arc<TieredCache>,
    transport: Arc<dyn Transport>,
    registry: DashMap<String, NodeInfo>,
    backlog: Backlog,
    /// Held across a local apply and its enqueue so both see the same order.
    mutation_lock: tokio::sync::Mutex<()>,
    version: AtomicU64,
    total_sync_cycles: AtomicU64,
    successful_deliveries: AtomicU64,
    failed_deliveries: AtomicU64,
    last_sync_at: AtomicU64,
    clock: SharedClock,
    diagnostics: Diagnostics,
}

impl ClusterCoordinator {
    pub fn new(
        node_id: &str,
        config: ClusterConfig,
        cache: Arc<TieredCache>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let clock = system_clock();
        let registry = DashMap::new();
        registry.insert(
            node_id.to_string(),
            NodeInfo::new(node_id, config.address.as_str(), clock.now_millis()),
        );
        Self {
            node_id: Arc::from(node_id),
            backlog: Backlog::new(config.max_backlog),
            mutation_lock: tokio::sync::Mutex::new(()),
            config,
            cache,
            transport,
            registry,
            version: AtomicU64::new(1),
            total_sync_cycles: AtomicU64::new(0),
            successful_deliveries: AtomicU64::new(0),
            failed_deliveries: AtomicU64::new(0),
            last_sync_at: AtomicU64::new(0),
            clock,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Replaces the clock and restamps the self entry with it.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        let now = clock.now_millis();
        if let Some(mut me) = self.registry.get_mut(&*self.node_id) {
            me.last_heartbeat_at = now;
        }
        self.clock = clock;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Local value first; on a miss, the first active peer that has one.
    ///
    /// A value fetched from a peer is cached locally for `remote_fetch_ttl`
    /// and is not replicated.
    #[instrument(skip(self), fields(node = %self.node_id))]
    pub async fn get(&self, key: &str) -> ClusterResult<Option<CacheValue>> {
        if let Some(value) = self.cache.get(key)? {
            self.diagnostics.emit(CacheEvent::ClusterHit {
                node: Arc::clone(&self.node_id),
                source: HitSource::Local,
            });
            return Ok(Some(value));
        }

        for peer in self.active_peers() {
            match self.request_from(&peer, key).await {
                Ok(Some(value)) => {
                    let expire_at =
                        expiry_after(self.clock.now_millis(), self.config.remote_fetch_ttl);
                    self.cache.put(key, value.clone(), Some(expire_at))?;
                    debug!(peer = %peer, "Served from peer");
                    self.diagnostics.emit(CacheEvent::ClusterHit {
                        node: Arc::clone(&self.node_id),
                        source: HitSource::Remote,
                    });
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => self.peer_error(&peer, "request_value", &e),
            }
        }

        self.diagnostics.emit(CacheEvent::ClusterMiss {
            node: Arc::clone(&self.node_id),
        });
        Ok(None)
    }

    async fn request_from(&self, peer: &str, key: &str) -> Result<Option<CacheValue>, TransportError> {
        let request = self.transport.request_value(peer, key);
        match self.config.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, request)
                .await
                .unwrap_or_else(|_| {
                    Err(TransportError::Timeout {
                        peer: peer.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }),
            None => request.await,
        }
    }

    pub async fn put(
        &self,
        key: &str,
        value: CacheValue,
        expire_at: Option<Timestamp>,
    ) -> ClusterResult<()> {
        let _ordered = self.mutation_lock.lock().await;
        self.cache.put(key, value.clone(), expire_at)?;
        let op = SyncOperation::put(
            &self.node_id,
            key,
            value,
            expire_at,
            self.clock.now_millis(),
        );
        self.record_local_mutation(op).await;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> ClusterResult<Option<CacheValue>> {
        let _ordered = self.mutation_lock.lock().await;
        let removed = self.cache.remove(key)?;
        let op = SyncOperation::remove(&self.node_id, key, self.clock.now_millis());
        self.record_local_mutation(op).await;
        Ok(removed)
    }

    pub async fn clear(&self) -> ClusterResult<()> {
        let _ordered = self.mutation_lock.lock().await;
        self.cache.clear()?;
        let op = SyncOperation::clear(&self.node_id, self.clock.now_millis());
        self.record_local_mutation(op).await;
        Ok(())
    }

    /// Local L1 size.
    pub fn size(&self) -> usize {
        self.cache.size()
    }

    async fn record_local_mutation(&self, op: SyncOperation) {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(mut me) = self.registry.get_mut(&*self.node_id) {
            me.version = version;
        }
        self.enqueue(PendingSync::broadcast(Arc::new(op))).await;
    }

    async fn enqueue(&self, item: PendingSync) {
        let dropped = self.backlog.push(item).await;
        self.report_overflow(dropped);
    }

    fn report_overflow(&self, dropped: usize) {
        if dropped > 0 {
            warn!(
                node = %self.node_id,
                dropped,
                max_backlog = self.config.max_backlog,
                "Replication backlog full, dropped oldest operations"
            );
            self.diagnostics.emit(CacheEvent::BacklogOverflow {
                node: Arc::clone(&self.node_id),
                dropped,
            });
        }
    }

    /// Applies a mutation replicated from a peer. Never re-queued.
    pub fn handle_remote_sync(&self, op: &SyncOperation) -> ClusterResult<()> {
        use super::operation::SyncOperationKind;

        match op.kind {
            SyncOperationKind::Put => {
                let value = op.value.clone().ok_or_else(|| ClusterError::InvalidOperation {
                    reason: format!("put for '{}' carries no value", op.key),
                })?;
                self.cache.put(&op.key, value, op.expire_at)?;
            }
            SyncOperationKind::Remove => {
                self.cache.remove(&op.key)?;
            }
            SyncOperationKind::Clear => self.cache.clear()?,
        }

        self.diagnostics.emit(CacheEvent::RemoteApplied {
            node: Arc::clone(&self.node_id),
            origin: op.origin_node_id.clone(),
            kind: op.kind,
        });
        Ok(())
    }

    /// Registers or refreshes a peer from its heartbeat.
    ///
    /// The heartbeat time is the local receive time. A heartbeat older than the
    /// registered version is ignored; any other one marks the peer active.
    pub fn handle_remote_heartbeat(&self, node: NodeInfo) {
        if node.id == *self.node_id {
            return;
        }
        let peer = node.id.clone();
        let fresh = NodeInfo {
            status: NodeStatus::Active,
            last_heartbeat_at: self.clock.now_millis(),
            ..node
        };

        let accepted = match self.registry.entry(peer.clone()) {
            Entry::Occupied(mut existing) => {
                if fresh.version < existing.get().version {
                    false
                } else {
                    existing.insert(fresh);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                true
            }
        };

        if accepted {
            self.diagnostics.emit(CacheEvent::HeartbeatReceived {
                node: Arc::clone(&self.node_id),
                peer,
            });
        } else {
            debug!(node = %self.node_id, peer = %peer, "Ignoring stale heartbeat");
        }
    }

    /// Live local value for a peer's read fallback. No promotion, no statistics.
    pub fn handle_value_request(&self, key: &str) -> ClusterResult<Option<CacheValue>> {
        Ok(self.cache.peek(key)?.map(|entry| entry.value))
    }

    /// Registers `node` as active and streams every live local entry to it.
    ///
    /// Deliveries that fail are queued for that peer only.
    #[instrument(skip(self, node), fields(node = %self.node_id, peer = %node.id))]
    pub async fn add_node(&self, node: NodeInfo) -> ClusterResult<CatchUpReport> {
        if node.id == *self.node_id {
            return Ok(CatchUpReport::default());
        }
        let now = self.clock.now_millis();
        let peer = node.id.clone();
        self.registry.insert(
            peer.clone(),
            NodeInfo {
                status: NodeStatus::Active,
                last_heartbeat_at: now,
                ..node
            },
        );
        info!("Node added");
        self.diagnostics.emit(CacheEvent::NodeAdded {
            node: Arc::clone(&self.node_id),
            peer: peer.clone(),
        });

        let mut entries: Vec<_> = self.cache.snapshot()?.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = CatchUpReport::default();
        let mut last_error = None;
        for (key, entry) in entries {
            let op = Arc::new(SyncOperation::put(
                &self.node_id,
                &key,
                entry.value,
                entry.expire_at,
                now,
            ));
            match self.transport.sync_operation(&peer, &op).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.queued += 1;
                    last_error = Some(e);
                    let only = BTreeSet::from([peer.clone()]);
                    self.enqueue(PendingSync::to_peers(op, only)).await;
                }
            }
        }

        if let Some(e) = last_error {
            self.peer_error(&peer, "catch_up", &e);
        }
        debug!(delivered = report.delivered, queued = report.queued, "Catch-up finished");
        Ok(report)
    }

    pub fn remove_node(&self, node_id: &str) -> Option<NodeInfo> {
        if node_id == &*self.node_id {
            return None;
        }
        let removed = self.registry.remove(node_id).map(|(_, node)| node);
        if removed.is_some() {
            self.diagnostics.emit(CacheEvent::NodeRemoved {
                node: Arc::clone(&self.node_id),
                peer: node_id.to_string(),
            });
        }
        removed
    }

    pub fn node_info(&self, node_id: &str) -> Option<NodeInfo> {
        self.registry.get(node_id).map(|node| node.value().clone())
    }

    /// Every registered node, this one included, ordered by id.
    pub fn nodes(&self) -> Vec<NodeInfo> {
        let mut nodes: Vec<NodeInfo> = self.registry.iter().map(|n| n.value().clone()).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Ids of active peers in registry order (by id).
    pub fn active_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self
            .registry
            .iter()
            .filter(|n| n.key().as_str() != &*self.node_id && n.value().is_active())
            .map(|n| n.key().clone())
            .collect();
        peers.sort();
        peers
    }

    fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self
            .registry
            .iter()
            .filter(|n| n.key().as_str() != &*self.node_id)
            .map(|n| n.key().clone())
            .collect();
        peers.sort();
        peers
    }

    pub async fn backlog_len(&self) -> usize {
        self.backlog.len().await
    }

    /// Pending backlog items, oldest first.
    pub async fn backlog(&self) -> Vec<PendingSync> {
        self.backlog.snapshot().await
    }

    /// One sync cycle: drain the backlog and deliver to active peers.
    ///
    /// Peers are served concurrently; each receives its operations in backlog
    /// order. Once an operation exhausts its retries against a peer, the rest
    /// of that peer's operations wait for the next cycle so order is kept.
    #[instrument(skip(self), fields(node = %self.node_id))]
    pub async fn sync_once(&self) -> SyncReport {
        let drained = self.backlog.drain().await;
        let mut report = SyncReport {
            drained: drained.len(),
            ..Default::default()
        };

        if !drained.is_empty() {
            let active: BTreeSet<String> = self.active_peers().into_iter().collect();
            let mut owed: Vec<BTreeSet<String>> = Vec::with_capacity(drained.len());
            let mut per_peer: BTreeMap<String, Vec<usize>> = BTreeMap::new();

            for (index, item) in drained.iter().enumerate() {
                let targets = item.targets.clone().unwrap_or_else(|| active.clone());
                let mut remaining = BTreeSet::new();
                for peer in targets {
                    if active.contains(&peer) {
                        per_peer.entry(peer.clone()).or_default().push(index);
                        remaining.insert(peer);
                    } else if self.registry.contains_key(&peer) {
                        remaining.insert(peer);
                    } else {
                        debug!(peer = %peer, "Dropping delivery to unregistered peer");
                    }
                }
                owed.push(remaining);
            }

            let deliveries = per_peer.into_iter().map(|(peer, indices)| {
                let ops: Vec<Arc<SyncOperation>> = indices
                    .iter()
                    .map(|&index| Arc::clone(&drained[index].op))
                    .collect();
                async move {
                    let delivered = self.deliver_to_peer(&peer, &ops).await;
                    (peer, indices, delivered)
                }
            });

            for (peer, indices, delivered) in join_all(deliveries).await {
                report.delivered += delivered;
                for &index in &indices[..delivered] {
                    owed[index].remove(&peer);
                }
                if delivered < indices.len() {
                    report.failed += 1;
                    self.mark_failed(&peer);
                }
            }

            let requeued: Vec<PendingSync> = drained
                .into_iter()
                .zip(owed)
                .filter(|(_, remaining)| !remaining.is_empty())
                .map(|(item, remaining)| PendingSync::to_peers(item.op, remaining))
                .collect();
            report.requeued = requeued.len();
            let dropped = self.backlog.requeue_front(requeued).await;
            self.report_overflow(dropped);
        }

        self.total_sync_cycles.fetch_add(1, Ordering::Relaxed);
        self.last_sync_at
            .store(self.clock.now_millis(), Ordering::Relaxed);
        if report.drained > 0 {
            self.diagnostics.emit(CacheEvent::SyncCycleCompleted {
                node: Arc::clone(&self.node_id),
                delivered: report.delivered,
                requeued: report.requeued,
            });
        }
        report
    }

    /// Delivers `ops` in order; returns how many were delivered before one gave up.
    async fn deliver_to_peer(&self, peer: &str, ops: &[Arc<SyncOperation>]) -> usize {
        for (position, op) in ops.iter().enumerate() {
            let result = retry("sync_operation", &self.config.retry, || {
                self.transport.sync_operation(peer, op)
            })
            .await;

            match result {
                Ok(()) => {
                    self.successful_deliveries.fetch_add(1, Ordering::Relaxed);
                    self.diagnostics.emit(CacheEvent::SyncSucceeded {
                        node: Arc::clone(&self.node_id),
                        peer: peer.to_string(),
                        kind: op.kind,
                    });
                }
                Err(exhausted) => {
                    self.failed_deliveries.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        node = %self.node_id,
                        peer,
                        kind = %op.kind,
                        attempts = exhausted.attempts,
                        error = %exhausted.last_error,
                        "Delivery failed, keeping operation in backlog"
                    );
                    self.diagnostics.emit(CacheEvent::SyncFailed {
                        node: Arc::clone(&self.node_id),
                        peer: peer.to_string(),
                        kind: op.kind,
                        attempts: exhausted.attempts,
                    });
                    return position;
                }
            }
        }
        ops.len()
    }

    fn mark_failed(&self, peer: &str) {
        if let Some(mut node) = self.registry.get_mut(peer) {
            node.status = NodeStatus::Failed;
        }
    }

    /// One heartbeat round: refresh the self entry, send it to every peer,
    /// then check peer health.
    #[instrument(skip(self), fields(node = %self.node_id))]
    pub async fn heartbeat_once(&self) -> HealthReport {
        let me = self.refresh_self();
        let peers = self.peers();

        let sends = peers.iter().map(|peer| {
            let me = &me;
            async move { (peer, self.transport.send_heartbeat(peer, me).await) }
        });
        for (peer, result) in join_all(sends).await {
            if let Err(e) = result {
                self.peer_error(peer, "heartbeat", &e);
            }
        }

        self.check_node_health()
    }

    fn refresh_self(&self) -> NodeInfo {
        let now = self.clock.now_millis();
        let cache_size = self.cache.size();
        let version = self.version.load(Ordering::Acquire);
        let mut me = self
            .registry
            .entry(self.node_id.to_string())
            .or_insert_with(|| NodeInfo::new(&*self.node_id, self.config.address.as_str(), now));
        me.status = NodeStatus::Active;
        me.last_heartbeat_at = now;
        me.cache_size = cache_size;
        me.version = version;
        me.value().clone()
    }

    /// Marks peers silent for `node_timeout` inactive and removes those silent
    /// for `node_timeout * removal_grace_multiple`.
    pub fn check_node_health(&self) -> HealthReport {
        let now = self.clock.now_millis();
        let timeout = self.config.node_timeout.as_millis() as u64;
        let removal = self.config.removal_after().as_millis() as u64;
        let mut report = HealthReport::default();

        for peer in self.peers() {
            let Some(silence) = self.registry.get(&peer).map(|node| node.silence(now)) else {
                continue;
            };

            if silence >= removal {
                if self.registry.remove(&peer).is_some() {
                    info!(node = %self.node_id, peer = %peer, silence_ms = silence, "Removing silent node");
                    self.diagnostics.emit(CacheEvent::NodeRemoved {
                        node: Arc::clone(&self.node_id),
                        peer: peer.clone(),
                    });
                    report.removed.push(peer);
                }
            } else if silence >= timeout {
                let became_inactive = match self.registry.get_mut(&peer) {
                    Some(mut node) if node.status != NodeStatus::Inactive => {
                        node.status = NodeStatus::Inactive;
                        true
                    }
                    _ => false,
                };
                if became_inactive {
                    warn!(node = %self.node_id, peer = %peer, silence_ms = silence, "Node unhealthy");
                    self.diagnostics.emit(CacheEvent::NodeUnhealthy {
                        node: Arc::clone(&self.node_id),
                        peer: peer.clone(),
                    });
                    report.inactive.push(peer);
                }
            }
        }
        report
    }

    fn peer_error(&self, peer: &str, operation: &'static str, error: &TransportError) {
        warn!(node = %self.node_id, peer, operation, error = %error, "Peer call failed");
        self.diagnostics.emit(CacheEvent::PeerError {
            node: Arc::clone(&self.node_id),
            peer: peer.to_string(),
            operation,
            error: error.to_string(),
        });
    }

    pub async fn statistics(&self) -> ClusterStatistics {
        let successful = self.successful_deliveries.load(Ordering::Relaxed);
        let failed = self.failed_deliveries.load(Ordering::Relaxed);
        let attempted = successful + failed;
        let last_sync_at = self.last_sync_at.load(Ordering::Relaxed);
        let nodes = self.nodes();

        ClusterStatistics {
            node_id: self.node_id.to_string(),
            total_sync_cycles: self.total_sync_cycles.load(Ordering::Relaxed),
            successful_deliveries: successful,
            failed_deliveries: failed,
            success_rate: if attempted == 0 {
                0.0
            } else {
                successful as f64 / attempted as f64
            },
            total_nodes: nodes.len(),
            active_nodes: nodes.iter().filter(|n| n.is_active()).count(),
            total_cache_size: nodes.iter().map(|n| n.cache_size).sum(),
            local_cache_size: self.cache.size(),
            backlog_len: self.backlog.len().await,
            last_sync_at: (last_sync_at > 0).then_some(last_sync_at),
        }
    }

    /// Spawns the sync and heartbeat workers.
    pub fn start(self: &Arc<Self>) -> ClusterWorkers {
        let coordinator = Arc::clone(self);
        let sync = spawn_periodic(
            "cluster_sync",
            self.config.sync_interval,
            self.diagnostics.clone(),
            move || {
                let coordinator = Arc::clone(&coordinator);
                async move {
                    coordinator.sync_once().await;
                    Ok::<(), std::convert::Infallible>(())
                }
            },
        );

        let coordinator = Arc::clone(self);
        let heartbeat = spawn_periodic(
            "cluster_heartbeat",
            self.config.heartbeat_interval,
            self.diagnostics.clone(),
            move || {
                let coordinator = Arc::clone(&coordinator);
                async move {
                    coordinator.heartbeat_once().await;
                    Ok::<(), std::convert::Infallible>(())
                }
            },
        );

        info!(node = %self.node_id, "Cluster workers started");
        ClusterWorkers::new(sync, heartbeat)
    }
}

impl std::fmt::Debug for ClusterCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterCoordinator")
            .field("node_id", &self.node_id)
            .field("nodes", &self.registry.len())
            .field("version", &self.version.load(Ordering::Relaxed))
            .finish()
    }
}
