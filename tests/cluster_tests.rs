//! Multi-node replication, membership and read-fallback tests.

mod common;

use std::time::Duration;

use bytes::Bytes;
use cairn::cluster::{NodeInfo, NodeStatus};
use cairn::store::BackingStore;

use common::harness::{T0, TestCluster};

fn v(s: &str) -> Bytes {
    Bytes::from(s.to_string())
}

#[tokio::test]
async fn test_writes_on_any_node_converge_everywhere() {
    let cluster = TestCluster::new(3);
    cluster.connect_all().await;

    for (n, node) in cluster.nodes.iter().enumerate() {
        node.coordinator
            .put(&format!("from-{n}"), v(&format!("{n}")), None)
            .await
            .unwrap();
    }
    cluster.sync_all().await;

    for node in &cluster.nodes {
        for n in 0..3 {
            assert_eq!(
                node.local(&format!("from-{n}")),
                Some(v(&format!("{n}"))),
                "{} is missing from-{n}",
                node.id()
            );
        }
        assert_eq!(node.coordinator.backlog_len().await, 0);
    }
}

#[tokio::test]
async fn test_replicated_writes_land_in_every_tier() {
    let cluster = TestCluster::new(2);
    cluster.connect_all().await;

    cluster
        .node(1)
        .coordinator
        .put("k", v("1"), Some(T0 + 60_000))
        .await
        .unwrap();
    cluster.sync_all().await;

    let cache = cluster.node(2).cache();
    let l2 = cache.l2().expect("two-level layout");
    assert_eq!(cache.l1().get("k").unwrap().unwrap().expire_at, Some(T0 + 60_000));
    assert_eq!(l2.get("k").unwrap().unwrap().value, v("1"));
}

#[tokio::test]
async fn test_partitioned_node_is_dropped_and_catches_up_on_rejoin() {
    let cluster = TestCluster::new(3);
    cluster.connect_all().await;
    let (n1, n2, n3) = (cluster.node(1), cluster.node(2), cluster.node(3));

    n1.coordinator.put("before", v("0"), None).await.unwrap();
    cluster.sync_all().await;
    assert_eq!(n3.local("before"), Some(v("0")));

    cluster.transport.set_partitioned(n3.id(), true);
    n1.coordinator.put("during", v("1"), None).await.unwrap();
    cluster.sync_all().await;
    assert_eq!(n2.local("during"), Some(v("1")));
    assert_eq!(n3.local("during"), None);
    assert_eq!(
        n1.coordinator.node_info(n3.id()).unwrap().status,
        NodeStatus::Failed
    );
    assert_eq!(n1.coordinator.backlog_len().await, 1);

    // Healthy nodes keep heartbeating; node-3 goes silent.
    for _ in 0..7 {
        cluster.advance(Duration::from_millis(500));
        cluster.heartbeat_all().await;
    }
    assert!(n1.coordinator.node_info(n3.id()).is_none());
    assert!(n2.coordinator.node_info(n3.id()).is_none());
    assert!(n1.coordinator.node_info(n2.id()).unwrap().is_active());

    // Deliveries owed to a removed node are dropped.
    cluster.sync_all().await;
    assert_eq!(n1.coordinator.backlog_len().await, 0);

    cluster.transport.set_partitioned(n3.id(), false);
    let report = n1
        .coordinator
        .add_node(NodeInfo::new(n3.id(), n3.id(), 0))
        .await
        .unwrap();
    assert_eq!(report.queued, 0);
    assert!(report.delivered >= 2);
    assert_eq!(n3.local("during"), Some(v("1")));

    n2.coordinator
        .add_node(NodeInfo::new(n3.id(), n3.id(), 0))
        .await
        .unwrap();
    for peer in [n1.id(), n2.id()] {
        n3.coordinator
            .add_node(NodeInfo::new(peer, peer, 0))
            .await
            .unwrap();
    }

    n3.coordinator.put("after", v("2"), None).await.unwrap();
    cluster.sync_all().await;
    assert_eq!(n1.local("after"), Some(v("2")));
    assert_eq!(n2.local("after"), Some(v("2")));
    assert_eq!(n1.coordinator.statistics().await.active_nodes, 3);
}

#[tokio::test]
async fn test_read_fallback_fetches_from_peer_and_expires_locally() {
    let cluster = TestCluster::new(3);
    cluster.connect_all().await;
    let (n1, n3) = (cluster.node(1), cluster.node(3));

    // Written directly into node-3's cache, so never replicated.
    n3.cache().put("only-on-3", v("x"), None).unwrap();
    assert_eq!(n1.local("only-on-3"), None);

    assert_eq!(n1.coordinator.get("only-on-3").await.unwrap(), Some(v("x")));
    assert_eq!(n1.local("only-on-3"), Some(v("x")));
    assert_eq!(n1.coordinator.backlog_len().await, 0);

    let ttl = n1.coordinator.config().remote_fetch_ttl;
    cluster.advance(ttl);
    assert_eq!(n1.local("only-on-3"), None, "fetched copy is only fresh for the ttl");
    assert_eq!(n3.local("only-on-3"), Some(v("x")));
}

#[tokio::test]
async fn test_remove_converges_after_concurrent_writes() {
    let cluster = TestCluster::new(2);
    cluster.connect_all().await;
    let (n1, n2) = (cluster.node(1), cluster.node(2));

    n1.coordinator.put("k", v("1"), None).await.unwrap();
    n1.coordinator.put("k", v("2"), None).await.unwrap();
    n1.coordinator.remove("k").await.unwrap();
    cluster.sync_all().await;

    assert_eq!(n1.local("k"), None);
    assert_eq!(n2.local("k"), None);
    assert_eq!(n1.coordinator.node_info(n1.id()).unwrap().version, 4);
}

#[tokio::test]
async fn test_background_workers_keep_cluster_in_sync() {
    let cluster = TestCluster::new(3);
    cluster.connect_all().await;
    let workers: Vec<_> = cluster
        .nodes
        .iter()
        .map(|node| node.coordinator.start())
        .collect();

    cluster
        .node(2)
        .coordinator
        .put("bg", v("1"), None)
        .await
        .unwrap();

    let mut converged = false;
    for _ in 0..100 {
        if cluster.nodes.iter().all(|node| node.local("bg").is_some()) {
            converged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(converged, "sync workers should replicate within a second");

    for handle in workers {
        handle.shutdown().await;
    }
    assert_eq!(cluster.sink.count("task_failed"), 0);
    assert!(cluster.sink.count("heartbeat_received") > 0);
}
