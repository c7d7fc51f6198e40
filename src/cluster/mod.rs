//! Cluster coordination.
//!
//! A [`ClusterCoordinator`] wraps one node's [`TieredCache`](crate::cache::TieredCache)
//! and keeps it eventually consistent with its peers:
//!
//! - local `put`/`remove`/`clear` apply immediately and queue a
//!   [`SyncOperation`] that the sync worker delivers to every active peer,
//!   with per-peer retries and order preserved per peer;
//! - heartbeats keep the node registry current; silent peers go inactive and
//!   are eventually removed;
//! - a local miss falls back to asking active peers.
//!
//! Peers are reached through the [`Transport`] trait. [`LocalTransport`]
//! connects coordinators inside one process.

pub mod backlog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod node;
pub mod operation;
pub mod transport;
pub mod types;
pub mod workers;


pub use backlog::{Backlog, PendingSync};
pub use config::{
    ClusterConfig, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_BACKLOG, DEFAULT_NODE_TIMEOUT,
    DEFAULT_REMOTE_FETCH_TTL, DEFAULT_REMOVAL_GRACE_MULTIPLE, DEFAULT_SYNC_INTERVAL,
};
pub use coordinator::ClusterCoordinator;
pub use error::{ClusterError, ClusterResult, TransportError, TransportResult};
pub use node::{NodeInfo, NodeStatus};
pub use operation::{SyncOperation, SyncOperationKind};
pub use transport::{LocalTransport, Transport};
pub use types::{CatchUpReport, ClusterStatistics, HealthReport, SyncReport};
pub use workers::ClusterWorkers;
