use crate::clock::Timestamp;

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items taken from the backlog.
    pub drained: usize,
    /// Successful (operation, peer) deliveries.
    pub delivered: usize,
    /// (operation, peer) deliveries that exhausted their retries.
    pub failed: usize,
    /// Items put back in the backlog.
    pub requeued: usize,
}

/// Peers whose status changed during a health check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub inactive: Vec<String>,
    pub removed: Vec<String>,
}

/// Outcome of streaming the local key set to a newly added peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    pub delivered: usize,
    /// Failed deliveries, queued in the backlog for that peer only.
    pub queued: usize,
}

/// Snapshot of coordinator counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterStatistics {
    pub node_id: String,
    pub total_sync_cycles: u64,
    pub successful_deliveries: u64,
    pub failed_deliveries: u64,
    /// `successful / (successful + failed)`, 0 before any delivery.
    pub success_rate: f64,
    /// Registered nodes, this one included.
    pub total_nodes: usize,
    pub active_nodes: usize,
    /// Sum of the cache sizes last reported by every registered node.
    pub total_cache_size: usize,
    pub local_cache_size: usize,
    pub backlog_len: usize,
    pub last_sync_at: Option<Timestamp>,
}
