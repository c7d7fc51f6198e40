use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Liveness of a registered node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    Active,
    /// No heartbeat within the node timeout.
    Inactive,
    /// Deliveries to the node exhausted their retries.
    Failed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Inactive => "inactive",
            NodeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry entry for one cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub address: String,
    pub status: NodeStatus,
    /// Local receive time of the latest heartbeat (own send time for the self entry).
    pub last_heartbeat_at: Timestamp,
    pub cache_size: usize,
    /// Monotonic; the owner bumps it on every local mutation.
    pub version: u64,
}

impl NodeInfo {
    /// An active node at version 1.
    pub fn new(id: impl Into<String>, address: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            status: NodeStatus::Active,
            last_heartbeat_at: now,
            cache_size: 0,
            version: 1,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }

    /// Milliseconds since the last heartbeat.
    #[inline]
    pub fn silence(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.last_heartbeat_at)
    }
}
