//! Cairn node entrypoint.
//!
//! Runs a small in-process cluster (this node plus `CAIRN_DEMO_PEERS` peers)
//! over [`LocalTransport`], writes through the first node and reports how the
//! writes replicate. Pass `--once` to exit after the report instead of waiting
//! for Ctrl-C.

use std::sync::Arc;

use bytes::Bytes;
use tokio::signal;

use cairn::cache::TieredCache;
use cairn::cluster::{ClusterCoordinator, ClusterWorkers, LocalTransport, NodeInfo};
use cairn::config::Config;
use cairn::diagnostics::{Diagnostics, FanoutSink, MetricsSink, TracingSink};
use cairn::eviction::EvictionPlanner;
use cairn::worker::WorkerHandle;

const DEFAULT_DEMO_PEERS: usize = 2;
const DEMO_KEYS: usize = 16;

struct Node {
    coordinator: Arc<ClusterCoordinator>,
    planner: Arc<EvictionPlanner>,
    cluster_workers: ClusterWorkers,
    analysis_worker: WorkerHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let once = std::env::args().any(|arg| arg == "--once");
    let config = Config::from_env()?;
    config.validate()?;

    let peers = std::env::var("CAIRN_DEMO_PEERS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_DEMO_PEERS);

    tracing::info!(
        node_id = %config.node_id,
        address = %config.cluster.address,
        peers,
        strategy = %config.planner.default_strategy,
        "Cairn starting"
    );

    let diagnostics = Diagnostics::new(Arc::new(
        FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(MetricsSink)),
    ));
    let transport = Arc::new(LocalTransport::new());

    let mut ids = vec![config.node_id.clone()];
    ids.extend((1..=peers).map(|n| format!("{}-peer-{n}", config.node_id)));

    let mut nodes = Vec::with_capacity(ids.len());
    for id in &ids {
        nodes.push(start_node(id, &config, &transport, &diagnostics)?);
    }

    for node in &nodes {
        for other in &nodes {
            let (a, b) = (&node.coordinator, &other.coordinator);
            if a.node_id() != b.node_id() {
                a.add_node(NodeInfo::new(b.node_id(), b.config().address.as_str(), 0))
                    .await?;
            }
        }
    }
    tracing::info!(nodes = nodes.len(), "Cluster formed");

    let primary = &nodes[0].coordinator;
    for i in 0..DEMO_KEYS {
        primary
            .put(&format!("key:{i}"), Bytes::from(format!("value-{i}")), None)
            .await?;
    }
    for node in &nodes {
        node.coordinator.sync_once().await;
    }

    for node in &nodes {
        let stats = node.coordinator.statistics().await;
        tracing::info!(
            node_id = %stats.node_id,
            local_cache_size = stats.local_cache_size,
            active_nodes = stats.active_nodes,
            backlog = stats.backlog_len,
            success_rate = stats.success_rate,
            "Replication status"
        );
    }

    let shed = primary
        .cache()
        .shed_l1(DEMO_KEYS / 4, config.planner.default_strategy.name())?;
    tracing::info!(evicted = shed.len(), "Shed L1 on primary");

    if !once {
        tracing::info!("Running; press Ctrl-C to stop");
        signal::ctrl_c().await?;
    }

    tracing::info!("Shutting down...");
    for node in nodes {
        let eviction = node.planner.statistics();
        tracing::debug!(node_id = node.coordinator.node_id(), ?eviction, "Planner statistics");
        node.cluster_workers.shutdown().await;
        node.analysis_worker.shutdown().await;
    }
    Ok(())
}

fn start_node(
    id: &str,
    config: &Config,
    transport: &Arc<LocalTransport>,
    diagnostics: &Diagnostics,
) -> anyhow::Result<Node> {
    let planner = Arc::new(
        EvictionPlanner::new(config.planner.clone()).diagnostics(diagnostics.clone()),
    );
    let cache = TieredCache::builder(id)
        .config(config.cache.clone().name(id))
        .planner(Arc::clone(&planner))
        .diagnostics(diagnostics.clone())
        .build()?;

    let cluster_config = config.cluster.clone().address(&format!("local://{id}"));
    let coordinator = Arc::new(
        ClusterCoordinator::new(id, cluster_config, Arc::new(cache), transport.clone())
            .diagnostics(diagnostics.clone()),
    );
    transport.register(&coordinator);

    let cluster_workers = coordinator.start();
    let analysis_worker = planner.start_analysis();

    Ok(Node {
        coordinator,
        planner,
        cluster_workers,
        analysis_worker,
    })
}
