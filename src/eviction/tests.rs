use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::clock::{ManualClock, SharedClock};
use crate::diagnostics::{Diagnostics, RecordingSink};

const T0: u64 = 1_700_000_000_000;

fn info(key: &str, size: u64, last_accessed_at: u64, access_count: u64) -> CacheEntryInfo {
    CacheEntryInfo {
        key: key.to_string(),
        size_bytes: size,
        created_at: T0,
        last_accessed_at,
        expire_at: None,
        access_count,
        hit_count: access_count,
        miss_count: 0,
    }
}

fn entries(infos: Vec<CacheEntryInfo>) -> HashMap<String, CacheEntryInfo> {
    infos.into_iter().map(|i| (i.key.clone(), i)).collect()
}

fn planner_at(clock: &Arc<ManualClock>, config: PlannerConfig) -> EvictionPlanner {
    let shared: SharedClock = clock.clone();
    EvictionPlanner::new(config).clock(shared)
}

#[test]
fn test_lru_orders_by_last_access_with_key_tiebreak() {
    let map = entries(vec![
        info("c", 10, T0 + 5, 1),
        info("b", 10, T0 + 1, 1),
        info("a", 10, T0 + 1, 1),
        info("d", 10, T0 + 9, 1),
    ]);
    let ctx = SelectionContext::at(T0 + 10);

    assert_eq!(
        EvictionStrategy::Lru.select_candidates(&ctx, &map, 3),
        vec!["a", "b", "c"]
    );
}

#[test]
fn test_lfu_and_size_ordering() {
    let map = entries(vec![
        info("small-hot", 10, T0, 50),
        info("big-cold", 5_000, T0, 1),
        info("mid", 500, T0, 5),
    ]);
    let ctx = SelectionContext::at(T0);

    assert_eq!(
        EvictionStrategy::Lfu.select_candidates(&ctx, &map, 2),
        vec!["big-cold", "mid"]
    );
    assert_eq!(
        EvictionStrategy::Size.select_candidates(&ctx, &map, 1),
        vec!["big-cold"]
    );
}

#[test]
fn test_expire_time_skips_entries_without_expiry() {
    let mut later = info("later", 10, T0, 1);
    later.expire_at = Some(T0 + 2_000);
    let mut sooner = info("sooner", 10, T0, 1);
    sooner.expire_at = Some(T0 + 1_000);
    let forever = info("forever", 10, T0, 1);
    let map = entries(vec![later, sooner, forever]);

    let picked = EvictionStrategy::ExpireTime.select_candidates(&SelectionContext::at(T0), &map, 5);
    assert_eq!(picked, vec!["sooner", "later"]);
}

#[test]
fn test_cost_benefit_prefers_low_value_per_byte() {
    let map = entries(vec![
        info("cheap", 10, T0 + 1_000, 100),
        info("wasteful", 10_000, T0 + 1_000, 1),
    ]);
    let picked =
        EvictionStrategy::CostBenefit.select_candidates(&SelectionContext::at(T0 + 1_000), &map, 1);
    assert_eq!(picked, vec!["wasteful"]);
}

#[test]
fn test_empty_map_and_short_maps() {
    let ctx = SelectionContext::at(T0);
    let empty = HashMap::new();
    for strategy in EvictionStrategy::ALL {
        assert!(strategy.select_candidates(&ctx, &empty, 3).is_empty());
    }

    let map = entries(vec![info("only", 1, T0, 1)]);
    assert_eq!(
        EvictionStrategy::Lru.select_candidates(&ctx, &map, 10),
        vec!["only"]
    );
    assert!(EvictionStrategy::Lru.select_candidates(&ctx, &map, 0).is_empty());
}

#[test]
fn test_strategy_names_round_trip_through_registry() {
    for strategy in EvictionStrategy::ALL {
        assert_eq!(strategy.name().parse::<EvictionStrategy>(), Ok(strategy));
    }
    assert_eq!("ml_prediction".parse::<EvictionStrategy>(), Ok(EvictionStrategy::Predictive));
    assert_eq!("Cost-Benefit".parse::<EvictionStrategy>(), Ok(EvictionStrategy::CostBenefit));
    assert!("random".parse::<EvictionStrategy>().is_err());
}

#[test]
fn test_unknown_strategy_falls_back_to_lru() {
    let clock = Arc::new(ManualClock::new(T0 + 100));
    let planner = planner_at(&clock, PlannerConfig::for_testing());
    let map = entries(vec![info("new", 1, T0 + 50, 1), info("old", 1, T0, 1)]);

    assert_eq!(planner.select_candidates(&map, 1, "no-such-thing"), vec!["old"]);
}

#[test]
fn test_untrained_predictive_matches_lru() {
    let clock = Arc::new(ManualClock::new(T0 + 100));
    let planner = planner_at(&clock, PlannerConfig::for_testing());
    let map = entries(vec![
        info("a", 1, T0 + 30, 9),
        info("b", 1, T0 + 10, 1),
        info("c", 1, T0 + 20, 4),
    ]);

    assert!(!planner.is_model_trained());
    assert_eq!(planner.predict_access_probability("a"), 0.0);
    assert_eq!(
        planner.select_candidates(&map, 3, "predictive"),
        planner.select_candidates(&map, 3, "lru")
    );
    assert_eq!(planner.select_default_candidates(&map, 2), vec!["b", "c"]);
}

#[test]
fn test_hybrid_selection_is_deterministic() {
    let clock = Arc::new(ManualClock::new(T0 + 10_000));
    let planner = planner_at(&clock, PlannerConfig::for_testing());
    let infos: Vec<CacheEntryInfo> = (0..20)
        .map(|i| info(&format!("k{i:02}"), (i % 5 + 1) * 100, T0 + i * 37 % 11, i % 7))
        .collect();

    let forward = entries(infos.clone());
    let reversed = entries(infos.into_iter().rev().collect());
    let weights = default_hybrid_weights();

    let first = planner.select_hybrid_candidates(&forward, 5, &weights);
    let second = planner.select_hybrid_candidates(&reversed, 5, &weights);
    assert_eq!(first.len(), 5);
    assert_eq!(first, second);
    assert_eq!(first, planner.select_hybrid_default(&forward, 5));
}

#[test]
fn test_hybrid_single_weight_matches_that_strategy() {
    let clock = Arc::new(ManualClock::new(T0 + 1_000));
    let planner = planner_at(&clock, PlannerConfig::for_testing());
    let map = entries(vec![
        info("a", 1, T0 + 3, 1),
        info("b", 1, T0 + 1, 1),
        info("c", 1, T0 + 2, 1),
    ]);
    let weights: StrategyWeights = [("lru".to_string(), 1.0), ("bogus".to_string(), 5.0)]
        .into_iter()
        .collect();

    assert_eq!(
        planner.select_hybrid_candidates(&map, 2, &weights),
        vec!["b", "c"]
    );
}

#[test]
fn test_model_trains_once_min_samples_reached() {
    let clock = Arc::new(ManualClock::new(T0));
    let sink = Arc::new(RecordingSink::new());
    let planner = planner_at(&clock, PlannerConfig::for_testing().min_samples(5))
        .diagnostics(Diagnostics::new(sink.clone()));

    for _ in 0..3 {
        planner.record_access_kind("hot", AccessKind::Read);
    }
    let report = planner.analyze();
    assert_eq!(report.samples, 3);
    assert!(!report.retrained);
    assert!(!planner.is_model_trained());

    planner.record_access_kind("hot", AccessKind::Read);
    planner.record_access_kind("cold", AccessKind::Write);
    let report = planner.analyze();
    assert!(report.retrained);
    assert!(planner.is_model_trained());
    assert_eq!(sink.count("model_retrained"), 1);

    // hot: (4/5 + 4/4) / 2, cold: (1/5 + 1/1) / 2
    assert!((planner.predict_access_probability("hot") - 0.9).abs() < 1e-9);
    assert!((planner.predict_access_probability("cold") - 0.6).abs() < 1e-9);
    assert_eq!(planner.predict_access_probability("never"), 0.0);

    let map = entries(vec![info("hot", 1, T0, 4), info("cold", 1, T0 + 5, 1)]);
    assert_eq!(planner.select_candidates(&map, 1, "predictive"), vec!["cold"]);
}

#[test]
fn test_recent_window_lowers_stale_keys() {
    let clock = Arc::new(ManualClock::new(T0));
    let config = PlannerConfig::for_testing()
        .min_samples(1)
        .windows(Duration::from_secs(60), Duration::from_secs(10));
    let planner = planner_at(&clock, config);

    planner.record_access_kind("stale", AccessKind::Read);
    clock.advance(Duration::from_secs(30));
    planner.record_access_kind("fresh", AccessKind::Read);
    planner.analyze();

    assert!(
        planner.predict_access_probability("fresh") > planner.predict_access_probability("stale")
    );
}

#[test]
fn test_ledger_prunes_outside_learning_window() {
    let clock = Arc::new(ManualClock::new(T0));
    let planner = planner_at(&clock, PlannerConfig::for_testing());

    planner.record_access_kind("old", AccessKind::Read);
    clock.advance(Duration::from_secs(120));
    planner.record_access_kind("new", AccessKind::Read);
    planner.analyze();

    let stats = planner.statistics();
    assert_eq!(stats.total_access_records, 1);
    assert_eq!(stats.unique_keys, 1);
    assert!(planner.access_history("old", 10).is_empty());
    assert_eq!(planner.recent_access_history(10)[0].key, "new");
}

#[test]
fn test_record_access_uses_info_timestamp() {
    let clock = Arc::new(ManualClock::new(T0 + 500));
    let planner = planner_at(&clock, PlannerConfig::for_testing());

    planner.record_access("k", &info("k", 1, T0 + 100, 1));
    planner.record_access("k", &info("k", 1, 0, 1));

    let history = planner.access_history("k", 10);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].timestamp, T0 + 100);
    assert_eq!(history[1].timestamp, T0 + 500);
    assert_eq!(history[0].kind, AccessKind::Read);
    assert_eq!(planner.access_history("k", 1).len(), 1);
}

#[test]
fn test_regretted_eviction_lowers_strategy_score() {
    let clock = Arc::new(ManualClock::new(T0));
    let planner = planner_at(&clock, PlannerConfig::for_testing());

    planner.record_eviction("k", "lru", "capacity");
    clock.advance(Duration::from_secs(1));
    planner.record_access_kind("k", AccessKind::Read);

    let stats = planner.statistics();
    // 0.5 + 0.1 * (0.0 - 0.5)
    assert!((stats.strategy_performance["lru"] - 0.45).abs() < 1e-9);
    assert_eq!(stats.total_evictions, 1);
    assert_eq!(stats.evictions_by_strategy["lru"], 1);
    assert_eq!(stats.last_eviction_at, Some(T0));
}

#[test]
fn test_unregretted_eviction_settles_on_analysis() {
    let clock = Arc::new(ManualClock::new(T0));
    let planner = planner_at(&clock, PlannerConfig::for_testing());

    planner.record_eviction("k", "size", "capacity");
    clock.advance(Duration::from_secs(10));
    let report = planner.analyze();

    assert_eq!(report.settled_outcomes, 1);
    let score = planner.statistics().strategy_performance["size"];
    assert!((score - 0.55).abs() < 1e-9);

    // A read after settlement is not a regret.
    planner.record_access_kind("k", AccessKind::Read);
    assert!((planner.statistics().strategy_performance["size"] - 0.55).abs() < 1e-9);
}

#[test]
fn test_adaptive_weights_follow_outcomes() {
    let tuner = AdaptiveTuner::new(0.5, Duration::from_secs(5));
    for _ in 0..10 {
        tuner.record_outcome(EvictionStrategy::Lru, 0.0);
        tuner.record_outcome(EvictionStrategy::Size, 1.0);
    }
    let weights: HashMap<_, _> = tuner.weights().into_iter().collect();

    assert!(weights[&EvictionStrategy::Size] > weights[&EvictionStrategy::Lfu]);
    assert!(weights[&EvictionStrategy::Lru] >= 0.01);
    assert!(weights[&EvictionStrategy::Lru] < weights[&EvictionStrategy::Lfu]);
}

#[test]
fn test_adaptive_selection_favours_trusted_strategy() {
    let clock = Arc::new(ManualClock::new(T0 + 10_000));
    let planner = planner_at(&clock, PlannerConfig::for_testing().learning_rate(1.0));
    for strategy in ["lru", "lfu", "cost_benefit"] {
        planner.record_strategy_outcome(strategy, 0.0);
    }
    planner.record_strategy_outcome("size", 1.0);

    let map = entries(vec![
        info("big", 10_000, T0 + 9_000, 50),
        info("tiny", 1, T0, 0),
    ]);
    assert_eq!(planner.select_candidates(&map, 1, "adaptive"), vec!["big"]);
}

#[test]
fn test_selection_emits_candidate_events() {
    let clock = Arc::new(ManualClock::new(T0));
    let sink = Arc::new(RecordingSink::new());
    let planner = planner_at(&clock, PlannerConfig::for_testing())
        .diagnostics(Diagnostics::new(sink.clone()));
    let map = entries(vec![info("a", 1, T0, 1)]);

    planner.select_candidates(&map, 1, "lfu");
    planner.select_hybrid_default(&map, 1);
    planner.record_eviction("a", "lfu", "test");

    assert_eq!(sink.count("eviction_candidates"), 2);
    assert_eq!(sink.count("evicted"), 1);
}

#[test]
fn test_config_validation() {
    assert!(PlannerConfig::default().validate().is_ok());
    assert!(PlannerConfig::for_testing().validate().is_ok());
    assert!(PlannerConfig::default().learning_rate(0.0).validate().is_err());
    assert!(
        PlannerConfig::default()
            .windows(Duration::from_secs(1), Duration::from_secs(2))
            .validate()
            .is_err()
    );
    let mut weights = default_hybrid_weights();
    weights.insert("lru".to_string(), -1.0);
    assert!(PlannerConfig::default().hybrid_weights(weights).validate().is_err());
}

#[test]
fn test_available_strategies_lists_registry() {
    let planner = EvictionPlanner::new(PlannerConfig::default());
    let names = planner.available_strategies();
    assert_eq!(names.len(), 8);
    assert!(names.contains(&"time_weighted"));
    assert!(names.contains(&"predictive"));
}

#[tokio::test]
async fn test_analysis_worker_runs_periodically() {
    let planner = Arc::new(EvictionPlanner::new(
        PlannerConfig::for_testing().analysis_interval(Duration::from_millis(10)),
    ));
    let handle = planner.start_analysis();

    for _ in 0..100 {
        if planner.statistics().total_analyses >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(planner.statistics().total_analyses >= 2);
    handle.shutdown().await;
}
