//! In-process test cluster harness.

use std::sync::Arc;
use std::time::Duration;

use cairn::cache::{TieredCache, TieredCacheConfig};
use cairn::clock::{ManualClock, SharedClock};
use cairn::cluster::{ClusterConfig, ClusterCoordinator, LocalTransport, NodeInfo};
use cairn::diagnostics::{Diagnostics, RecordingSink};
use cairn::eviction::{EvictionPlanner, PlannerConfig};

pub const T0: u64 = 1_700_000_000_000;

pub struct TestNode {
    pub coordinator: Arc<ClusterCoordinator>,
    pub planner: Arc<EvictionPlanner>,
}

impl TestNode {
    pub fn id(&self) -> &str {
        self.coordinator.node_id()
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        self.coordinator.cache()
    }

    /// Local value without promotion or statistics.
    pub fn local(&self, key: &str) -> Option<bytes::Bytes> {
        self.cache().peek(key).unwrap().map(|entry| entry.value)
    }
}

pub struct TestCluster {
    pub transport: Arc<LocalTransport>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingSink>,
    pub nodes: Vec<TestNode>,
}

impl TestCluster {
    /// `size` nodes named `node-1..=node-size`, each on a two-level cache with a
    /// planner, all sharing one manual clock. Nodes are not yet connected.
    pub fn new(size: usize) -> Self {
        Self::with_configs(size, TieredCacheConfig::two_level(100, 1_000), ClusterConfig::for_testing())
    }

    pub fn with_configs(size: usize, cache_config: TieredCacheConfig, cluster: ClusterConfig) -> Self {
        let transport = Arc::new(LocalTransport::new());
        let clock = Arc::new(ManualClock::new(T0));
        let sink = Arc::new(RecordingSink::new());
        let shared: SharedClock = clock.clone();
        let diagnostics = Diagnostics::new(sink.clone());

        let nodes = (1..=size)
            .map(|n| {
                let id = format!("node-{n}");
                let planner = Arc::new(
                    EvictionPlanner::new(PlannerConfig::for_testing())
                        .clock(shared.clone())
                        .diagnostics(diagnostics.clone()),
                );
                let cache = TieredCache::builder(&id)
                    .config(cache_config.clone().name(&id))
                    .planner(planner.clone())
                    .clock(shared.clone())
                    .diagnostics(diagnostics.clone())
                    .build()
                    .expect("valid cache config");
                let coordinator = Arc::new(
                    ClusterCoordinator::new(
                        &id,
                        cluster.clone().address(&id),
                        Arc::new(cache),
                        transport.clone(),
                    )
                    .clock(shared.clone())
                    .diagnostics(diagnostics.clone()),
                );
                transport.register(&coordinator);
                TestNode {
                    coordinator,
                    planner,
                }
            })
            .collect();

        Self {
            transport,
            clock,
            sink,
            nodes,
        }
    }

    pub fn node(&self, n: usize) -> &TestNode {
        &self.nodes[n - 1]
    }

    /// Registers every node with every other one.
    pub async fn connect_all(&self) {
        for a in &self.nodes {
            for b in &self.nodes {
                if a.id() != b.id() {
                    a.coordinator
                        .add_node(NodeInfo::new(b.id(), b.id(), self.clock_now()))
                        .await
                        .unwrap();
                }
            }
        }
    }

    pub async fn sync_all(&self) {
        for node in &self.nodes {
            node.coordinator.sync_once().await;
        }
    }

    pub async fn heartbeat_all(&self) {
        for node in &self.nodes {
            node.coordinator.heartbeat_once().await;
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    fn clock_now(&self) -> u64 {
        use cairn::clock::Clock;
        self.clock.now_millis()
    }
}
