use std::time::Duration;

use super::error::{ClusterError, ClusterResult};
use crate::resilience::RetryConfig;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_REMOVAL_GRACE_MULTIPLE: u32 = 3;
pub const DEFAULT_MAX_BACKLOG: usize = 10_000;
pub const DEFAULT_REMOTE_FETCH_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Advertised address of this node.
    pub address: String,
    pub sync_interval: Duration,
    pub heartbeat_interval: Duration,
    /// Silence after which a peer becomes inactive.
    pub node_timeout: Duration,
    /// A peer silent for `node_timeout * removal_grace_multiple` is removed.
    pub removal_grace_multiple: u32,
    /// Per-(operation, peer) delivery retries.
    pub retry: RetryConfig,
    /// Pending operations kept before the oldest are dropped.
    pub max_backlog: usize,
    /// Freshness window for values fetched from peers.
    pub remote_fetch_ttl: Duration,
    /// Upper bound on one remote read; `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            address: "local".to_string(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            node_timeout: DEFAULT_NODE_TIMEOUT,
            removal_grace_multiple: DEFAULT_REMOVAL_GRACE_MULTIPLE,
            retry: RetryConfig::replication(),
            max_backlog: DEFAULT_MAX_BACKLOG,
            remote_fetch_ttl: DEFAULT_REMOTE_FETCH_TTL,
            request_timeout: None,
        }
    }
}

impl ClusterConfig {
    /// Short intervals and millisecond retry delays.
    pub fn for_testing() -> Self {
        Self {
            sync_interval: Duration::from_millis(20),
            heartbeat_interval: Duration::from_millis(20),
            node_timeout: Duration::from_secs(1),
            retry: RetryConfig::for_testing(),
            request_timeout: Some(Duration::from_millis(500)),
            ..Default::default()
        }
    }

    pub fn address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_backlog(mut self, max_backlog: usize) -> Self {
        self.max_backlog = max_backlog;
        self
    }

    /// Silence after which an inactive peer is dropped from the registry.
    pub fn removal_after(&self) -> Duration {
        self.node_timeout
            .saturating_mul(self.removal_grace_multiple.max(1))
    }

    pub fn validate(&self) -> ClusterResult<()> {
        for (label, value) in [
            ("sync_interval", self.sync_interval),
            ("heartbeat_interval", self.heartbeat_interval),
            ("node_timeout", self.node_timeout),
        ] {
            if value.is_zero() {
                return Err(ClusterError::Config {
                    reason: format!("{label} must be > 0"),
                });
            }
        }
        if self.removal_grace_multiple == 0 {
            return Err(ClusterError::Config {
                reason: "removal_grace_multiple must be >= 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ClusterError::Config {
                reason: "retry.max_attempts must be >= 1".to_string(),
            });
        }
        if self.max_backlog == 0 {
            return Err(ClusterError::Config {
                reason: "max_backlog must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
