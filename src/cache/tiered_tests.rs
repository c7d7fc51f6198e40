use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::*;
use crate::clock::{ManualClock, SharedClock};
use crate::diagnostics::{CacheEvent, Diagnostics, RecordingSink};
use crate::eviction::{EvictionPlanner, PlannerConfig};
use crate::store::{BackingStore, FlakyStore, MemoryStore, StoreError};

const T0: u64 = 1_700_000_000_000;

fn v(s: &'static str) -> Bytes {
    Bytes::from_static(s.as_bytes())
}

struct Fixture {
    cache: TieredCache,
    l1: Arc<MemoryStore>,
    l2: Arc<MemoryStore>,
    l3: Arc<FlakyStore>,
    sink: Arc<RecordingSink>,
    clock: Arc<ManualClock>,
}

fn three_tier() -> Fixture {
    let clock = Arc::new(ManualClock::new(T0));
    let shared: SharedClock = clock.clone();
    let l1 = Arc::new(MemoryStore::with_capacity("l1", 100).clock(shared.clone()));
    let l2 = Arc::new(MemoryStore::with_capacity("l2", 100).clock(shared.clone()));
    let l3 = Arc::new(FlakyStore::new(
        MemoryStore::with_capacity("l3", 100).clock(shared.clone()),
    ));
    let sink = Arc::new(RecordingSink::new());

    let cache = TieredCache::builder("test")
        .l1(l1.clone())
        .l2(l2.clone())
        .l3(l3.clone())
        .clock(shared)
        .diagnostics(Diagnostics::new(sink.clone()))
        .build()
        .unwrap();

    Fixture {
        cache,
        l1,
        l2,
        l3,
        sink,
        clock,
    }
}

#[test]
fn test_put_fans_out_to_every_tier() {
    let f = three_tier();
    f.cache.put("k", v("value"), None).unwrap();

    let stores: [Arc<dyn BackingStore>; 3] = [f.l1.clone(), f.l2.clone(), f.l3.clone()];
    for store in stores {
        let entry = store.get("k").unwrap().expect("every tier holds the write");
        assert_eq!(entry.value, v("value"));
    }
    assert_eq!(f.sink.count("put"), 1);
}

#[test]
fn test_l3_hit_promotes_and_second_read_never_touches_l3() {
    let f = three_tier();
    f.l3.put("k", v("deep"), Some(T0 + 60_000)).unwrap();
    // One read allowed; any further L3 read fails.
    f.l3.fail_gets_after(1);

    let first = f.cache.lookup("k").unwrap();
    assert_eq!(first.level(), Some(CacheLevel::L3));

    let second = f.cache.lookup("k").unwrap();
    assert_eq!(second.level(), Some(CacheLevel::L1));
    assert_eq!(second.into_value(), Some(v("deep")));
    assert_eq!(f.l3.get_calls(), 1);

    // Promotion keeps the source expiry.
    assert_eq!(f.l1.get("k").unwrap().unwrap().expire_at, Some(T0 + 60_000));
    assert_eq!(f.l2.get("k").unwrap().unwrap().expire_at, Some(T0 + 60_000));

    let promotions: Vec<_> = f
        .sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            CacheEvent::Promotion { from, to, .. } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        promotions,
        vec![
            (CacheLevel::L3, CacheLevel::L2),
            (CacheLevel::L3, CacheLevel::L1)
        ]
    );
}

#[test]
fn test_l2_hit_promotes_into_l1_only() {
    let f = three_tier();
    f.l2.put("k", v("mid"), None).unwrap();

    assert_eq!(f.cache.get("k").unwrap(), Some(v("mid")));
    assert!(f.l1.get("k").unwrap().is_some());
    assert_eq!(f.l3.get_calls(), 0);

    let stats = f.cache.statistics();
    assert_eq!(stats.l2_hits, 1);
    assert_eq!(stats.promotions, 1);

    let misses: Vec<_> = f
        .sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            CacheEvent::TierMiss { level, .. } => Some(level),
            _ => None,
        })
        .collect();
    assert_eq!(misses, vec![CacheLevel::L1]);
    assert_eq!(f.sink.count("miss"), 0);
}

#[test]
fn test_promotion_disabled_leaves_upper_tiers_alone() {
    let l1 = Arc::new(MemoryStore::new("l1"));
    let l2 = Arc::new(MemoryStore::new("l2"));
    let cache = TieredCache::builder("no-promo")
        .l1(l1.clone())
        .l2(l2.clone())
        .enable_promotion(false)
        .build()
        .unwrap();

    l2.put("k", v("x"), None).unwrap();
    assert_eq!(cache.get("k").unwrap(), Some(v("x")));
    assert!(l1.get("k").unwrap().is_none());
    assert_eq!(cache.statistics().promotions, 0);
}

#[test]
fn test_miss_counts_and_hit_rates() {
    let f = three_tier();
    f.cache.put("a", v("1"), None).unwrap();

    assert!(f.cache.get("a").unwrap().is_some());
    assert!(f.cache.get("missing").unwrap().is_none());

    let stats = f.cache.statistics();
    assert_eq!(stats.l1_hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.total_requests(), 2);
    assert!((stats.overall_hit_rate - 0.5).abs() < f64::EPSILON);
    assert!((stats.l1_hit_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(stats.l2_hit_rate, 0.0);
    assert_eq!(stats.l1_size, 1);
    assert!(stats.total_memory_usage > 0);
    assert_eq!(f.sink.count("miss"), 1);
    assert_eq!(f.sink.count("tier_miss"), 3);
}

#[test]
fn test_empty_statistics_have_zero_rates() {
    let cache = TieredCache::from_config(&TieredCacheConfig::memory_only(10)).unwrap();
    let stats = cache.statistics();
    assert_eq!(stats.total_requests(), 0);
    assert_eq!(stats.overall_hit_rate, 0.0);
    assert!(cache.l2().is_none());
    assert!(cache.l3().is_none());
}

#[test]
fn test_remove_returns_fastest_copy_and_clears_all_tiers() {
    let f = three_tier();
    f.cache.put("k", v("new"), None).unwrap();
    f.l1.remove("k").unwrap();

    assert_eq!(f.cache.remove("k").unwrap(), Some(v("new")));
    assert!(f.l2.get("k").unwrap().is_none());
    assert!(f.l3.get("k").unwrap().is_none());
    assert_eq!(f.cache.remove("k").unwrap(), None);
}

#[test]
fn test_clear_empties_every_tier() {
    let f = three_tier();
    f.cache
        .put_all(vec![("a".to_string(), v("1")), ("b".to_string(), v("2"))], None)
        .unwrap();
    f.cache.clear().unwrap();

    assert_eq!(f.cache.size(), 0);
    assert_eq!(f.l2.size(), 0);
    assert_eq!(f.l3.size(), 0);
    assert_eq!(f.sink.count("clear"), 1);
}

#[test]
fn test_store_errors_propagate() {
    let f = three_tier();
    f.l3.set_unavailable(true);

    assert!(matches!(
        f.cache.put("k", v("x"), None),
        Err(CacheError::Store(StoreError::Unavailable { .. }))
    ));
    assert!(f.cache.get("absent").is_err());
    assert!(f.cache.clear().is_err());
}

#[test]
fn test_expired_entries_are_misses() {
    let f = three_tier();
    f.cache.put("k", v("x"), Some(T0 + 1_000)).unwrap();
    f.clock.advance(Duration::from_secs(2));

    assert!(f.cache.get("k").unwrap().is_none());
    assert!(f.cache.snapshot().unwrap().is_empty());
}

#[test]
fn test_small_l1_falls_back_to_l2() {
    let cache = TieredCache::from_config(&TieredCacheConfig::two_level(2, 10)).unwrap();

    for (key, value) in [("a", "1"), ("b", "2"), ("c", "3")] {
        cache.put(key, v(value), None).unwrap();
    }
    let mut in_l1: Vec<_> = cache
        .l1()
        .entries()
        .unwrap()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    in_l1.sort();
    assert_eq!(in_l1, vec!["b", "c"]);
    assert_eq!(cache.l2().map(|l2| l2.size()), Some(3));
    assert_eq!(cache.get("a").unwrap(), Some(v("1")));
}

#[test]
fn test_get_all_and_snapshot_merge_tiers() {
    let f = three_tier();
    f.cache.put("a", v("1"), None).unwrap();
    f.l3.put("b", v("2"), None).unwrap();
    f.l2.put("a", v("stale"), None).unwrap();

    let snapshot = f.cache.snapshot().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot["a"].value, v("1"));

    let found = f.cache.get_all(["a", "b", "c"]).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["b"], v("2"));
}

#[tokio::test]
async fn test_warm_up_loads_only_missing_keys() {
    let f = three_tier();
    f.cache.put("present", v("old"), None).unwrap();
    let keys = vec![
        "present".to_string(),
        "loaded".to_string(),
        "unknown".to_string(),
    ];

    let loaded = f
        .cache
        .warm_up(&keys, None, |key| async move {
            match key.as_str() {
                "unknown" => None,
                _ => Some(Bytes::from(format!("loaded:{key}"))),
            }
        })
        .await
        .unwrap();

    assert_eq!(loaded, 1);
    assert_eq!(f.cache.get("present").unwrap(), Some(v("old")));
    assert_eq!(f.cache.get("loaded").unwrap(), Some(v("loaded:loaded")));
    assert!(!f.cache.contains("unknown").unwrap());
}

#[tokio::test]
async fn test_get_or_insert_with_loads_once() {
    let f = three_tier();
    let first = f
        .cache
        .get_or_insert_with("k", None, || async { v("computed") })
        .await
        .unwrap();
    let second = f
        .cache
        .get_or_insert_with("k", None, || async { v("ignored") })
        .await
        .unwrap();

    assert_eq!(first, v("computed"));
    assert_eq!(second, v("computed"));
}

#[test]
fn test_builder_requires_l1() {
    assert!(matches!(
        TieredCache::builder("empty").build(),
        Err(CacheError::MissingL1)
    ));

    let mut config = TieredCacheConfig::default();
    config.l1 = TierConfig::disabled();
    assert!(matches!(
        TieredCache::from_config(&config),
        Err(CacheError::Config { .. })
    ));
}

fn planned_cache(clock: &Arc<ManualClock>) -> (TieredCache, Arc<EvictionPlanner>) {
    let shared: SharedClock = clock.clone();
    let planner = Arc::new(EvictionPlanner::new(PlannerConfig::for_testing()).clock(shared.clone()));
    let cache = TieredCache::builder("planned")
        .config(TieredCacheConfig::two_level(10, 100))
        .planner(planner.clone())
        .clock(shared)
        .build()
        .unwrap();
    (cache, planner)
}

#[test]
fn test_shed_l1_keeps_lower_tier_copies() {
    let clock = Arc::new(ManualClock::new(T0));
    let (cache, planner) = planned_cache(&clock);

    for key in ["a", "b", "c"] {
        cache.put(key, v("x"), None).unwrap();
        clock.advance(Duration::from_secs(1));
    }
    cache.get("a").unwrap();

    let evicted = cache.shed_l1(2, "lru").unwrap();
    assert_eq!(evicted, vec!["b", "c"]);
    assert!(cache.l1().get("b").unwrap().is_none());
    assert!(cache.l1().get("a").unwrap().is_some());

    // Still readable through L2.
    assert_eq!(cache.lookup("b").unwrap().level(), Some(CacheLevel::L2));

    let stats = planner.statistics();
    assert_eq!(stats.total_evictions, 2);
    assert_eq!(stats.evictions_by_strategy["lru"], 2);
}

#[test]
fn test_planner_sees_reads_writes_and_deletes() {
    let clock = Arc::new(ManualClock::new(T0));
    let (cache, planner) = planned_cache(&clock);

    cache.put("k", v("abc"), Some(T0 + 10_000)).unwrap();
    cache.get("k").unwrap();
    cache.get("k").unwrap();

    let infos = cache.entry_infos().unwrap();
    let info = &infos["k"];
    assert_eq!(info.access_count, 2);
    assert_eq!(info.hit_count, 2);
    assert_eq!(info.size_bytes, 4);
    assert_eq!(info.expire_at, Some(T0 + 10_000));

    cache.remove("k").unwrap();
    let kinds: Vec<_> = planner
        .access_history("k", 10)
        .into_iter()
        .map(|record| record.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            crate::eviction::AccessKind::Write,
            crate::eviction::AccessKind::Read,
            crate::eviction::AccessKind::Read,
            crate::eviction::AccessKind::Delete,
        ]
    );
    assert!(cache.entry_infos().unwrap().is_empty());
}

#[test]
fn test_shed_without_planner_is_an_error() {
    let cache = TieredCache::from_config(&TieredCacheConfig::memory_only(10)).unwrap();
    assert!(matches!(
        cache.shed_l1(1, "lru"),
        Err(CacheError::PlannerNotConfigured { .. })
    ));
}

#[test]
fn test_shed_l1_relieves_an_overfilled_l1() {
    let clock = Arc::new(ManualClock::new(T0));
    let shared: SharedClock = clock.clone();
    let planner = Arc::new(EvictionPlanner::new(PlannerConfig::for_testing()).clock(shared.clone()));
    let cache = TieredCache::builder("small")
        .config(TieredCacheConfig::two_level(2, 10))
        .planner(planner.clone())
        .clock(shared)
        .build()
        .unwrap();

    for key in ["a", "b", "c"] {
        cache.put(key, v("x"), None).unwrap();
        clock.advance(Duration::from_secs(1));
    }

    let evicted = cache.shed_l1(1, "lru").unwrap();
    assert_eq!(evicted.len(), 1);
    assert_ne!(evicted[0], "a", "already gone from L1");
    assert_eq!(cache.l1().size(), 1);
    assert_eq!(planner.statistics().total_evictions, 1);
}

#[test]
fn test_metadata_follows_store_evictions() {
    let clock = Arc::new(ManualClock::new(T0));
    let shared: SharedClock = clock.clone();
    let planner = Arc::new(EvictionPlanner::new(PlannerConfig::for_testing()).clock(shared.clone()));
    let cache = TieredCache::builder("churn")
        .config(TieredCacheConfig::memory_only(4))
        .planner(planner)
        .clock(shared)
        .build()
        .unwrap();

    for i in 0..5_000 {
        cache.put(&format!("k{i}"), v("x"), None).unwrap();
    }
    assert!(cache.tracked_keys() <= 8, "tracked {}", cache.tracked_keys());

    for _ in 0..3 {
        cache.shed_l1(1, "lru").unwrap();
    }
    assert!(cache.tracked_keys() <= cache.l1().size());
}
