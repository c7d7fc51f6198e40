//! Peer transport.
//!
//! [`Transport`] is the seam between the coordinator and the network. The
//! crate ships [`LocalTransport`], which routes calls straight into other
//! coordinators in the same process and can simulate partitions, latency and
//! transient failures.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use super::coordinator::ClusterCoordinator;
use super::error::{TransportError, TransportResult};
use super::node::NodeInfo;
use super::operation::SyncOperation;
use crate::store::CacheValue;

#[async_trait]
/// Calls the coordinator makes on its peers. Any failure is an `Err`.
pub trait Transport: Send + Sync {
    /// Asks `peer` for its live local value of `key`.
    async fn request_value(&self, peer: &str, key: &str) -> TransportResult<Option<CacheValue>>;
    /// Delivers one replicated mutation to `peer`.
    async fn sync_operation(&self, peer: &str, op: &SyncOperation) -> TransportResult<()>;
    /// Sends this node's registry entry to `peer`.
    async fn send_heartbeat(&self, peer: &str, node: &NodeInfo) -> TransportResult<()>;
}

/// In-process router between coordinators.
///
/// Coordinators are held weakly, so dropping one makes it unreachable.
#[derive(Default)]
pub struct LocalTransport {
    nodes: DashMap<String, Weak<ClusterCoordinator>>,
    partitioned: DashSet<String>,
    latency: DashMap<String, Duration>,
    /// Remaining injected `sync_operation` failures per peer.
    sync_failures: DashMap<String, u32>,
    sync_calls: DashMap<String, u64>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, coordinator: &Arc<ClusterCoordinator>) {
        self.nodes.insert(
            coordinator.node_id().to_string(),
            Arc::downgrade(coordinator),
        );
    }

    pub fn unregister(&self, node_id: &str) {
        self.nodes.remove(node_id);
    }

    /// Cuts `node_id` off: calls to it, and heartbeats or syncs from it, fail.
    pub fn set_partitioned(&self, node_id: &str, partitioned: bool) {
        if partitioned {
            self.partitioned.insert(node_id.to_string());
        } else {
            self.partitioned.remove(node_id);
        }
    }

    /// Delays every call to `node_id` by `delay`.
    pub fn set_latency(&self, node_id: &str, delay: Duration) {
        if delay.is_zero() {
            self.latency.remove(node_id);
        } else {
            self.latency.insert(node_id.to_string(), delay);
        }
    }

    /// Makes the next `count` `sync_operation` calls to `node_id` fail.
    pub fn fail_next_syncs(&self, node_id: &str, count: u32) {
        self.sync_failures.insert(node_id.to_string(), count);
    }

    /// Number of `sync_operation` calls routed to `node_id`, failed ones included.
    pub fn sync_calls(&self, node_id: &str) -> u64 {
        self.sync_calls.get(node_id).map(|calls| *calls).unwrap_or(0)
    }

    async fn route(&self, peer: &str, from: Option<&str>) -> TransportResult<Arc<ClusterCoordinator>> {
        let delay = self.latency.get(peer).map(|delay| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let cut = self.partitioned.contains(peer)
            || from.is_some_and(|origin| self.partitioned.contains(origin));
        if cut {
            return Err(TransportError::Unreachable {
                peer: peer.to_string(),
                reason: "partitioned".to_string(),
            });
        }

        let target = self.nodes.get(peer).and_then(|node| node.upgrade());
        target.ok_or_else(|| TransportError::Unreachable {
            peer: peer.to_string(),
            reason: "not registered".to_string(),
        })
    }

    fn take_injected_failure(&self, peer: &str) -> bool {
        match self.sync_failures.get_mut(peer) {
            Some(mut remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn request_value(&self, peer: &str, key: &str) -> TransportResult<Option<CacheValue>> {
        let target = self.route(peer, None).await?;
        target
            .handle_value_request(key)
            .map_err(|e| TransportError::Rejected {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }

    async fn sync_operation(&self, peer: &str, op: &SyncOperation) -> TransportResult<()> {
        *self.sync_calls.entry(peer.to_string()).or_insert(0) += 1;
        if self.take_injected_failure(peer) {
            return Err(TransportError::Unreachable {
                peer: peer.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        let target = self.route(peer, Some(&op.origin_node_id)).await?;
        target
            .handle_remote_sync(op)
            .map_err(|e| TransportError::Rejected {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }

    async fn send_heartbeat(&self, peer: &str, node: &NodeInfo) -> TransportResult<()> {
        let target = self.route(peer, Some(&node.id)).await?;
        target.handle_remote_heartbeat(node.clone());
        Ok(())
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("nodes", &self.nodes.len())
            .field("partitioned", &self.partitioned.len())
            .finish()
    }
}
