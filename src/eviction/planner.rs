use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use super::adaptive::AdaptiveTuner;
use super::config::{PlannerConfig, StrategyWeights};
use super::ledger::AccessLedger;
use super::model::AccessModel;
use super::strategy::{EvictionStrategy, SelectionContext, blend};
use super::types::{AccessKind, AccessRecord, AnalysisReport, CacheEntryInfo, EvictionStatistics};
use crate::clock::{SharedClock, Timestamp, system_clock};
use crate::diagnostics::{CacheEvent, Diagnostics};
use crate::worker::{WorkerHandle, spawn_periodic};

/// Chooses eviction candidates and learns from access patterns.
///
/// Selection is a pure function of the entry snapshot plus the current model
/// and adaptive weights. Recording is infallible and never blocks on
/// selection. The model is rebuilt by [`analyze`](Self::analyze) and swapped
/// in whole.
pub struct EvictionPlanner {
    config: PlannerConfig,
    ledger: AccessLedger,
    model: RwLock<Option<Arc<AccessModel>>>,
    tuner: AdaptiveTuner,
    total_analyses: AtomicU64,
    total_evictions: AtomicU64,
    evictions_by_strategy: DashMap<String, u64>,
    last_eviction_at: AtomicU64,
    last_analysis_at: AtomicU64,
    clock: SharedClock,
    diagnostics: Diagnostics,
}

impl EvictionPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            ledger: AccessLedger::new(config.learning_window),
            tuner: AdaptiveTuner::new(config.learning_rate, config.regret_window),
            config,
            model: RwLock::new(None),
            total_analyses: AtomicU64::new(0),
            total_evictions: AtomicU64::new(0),
            evictions_by_strategy: DashMap::new(),
            last_eviction_at: AtomicU64::new(0),
            last_analysis_at: AtomicU64::new(0),
            clock: system_clock(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    fn current_model(&self) -> Option<Arc<AccessModel>> {
        self.model.read().clone()
    }

    /// Selects with the named strategy; unknown names fall back to LRU.
    pub fn select_candidates(
        &self,
        entries: &HashMap<String, CacheEntryInfo>,
        count: usize,
        strategy: &str,
    ) -> Vec<String> {
        let strategy = strategy.parse().unwrap_or_else(|_| {
            debug!(strategy, "Unknown eviction strategy, using lru");
            EvictionStrategy::Lru
        });
        self.select_with(entries, count, strategy)
    }

    /// Selects with the configured default strategy.
    pub fn select_default_candidates(
        &self,
        entries: &HashMap<String, CacheEntryInfo>,
        count: usize,
    ) -> Vec<String> {
        self.select_with(entries, count, self.config.default_strategy)
    }

    pub fn select_with(
        &self,
        entries: &HashMap<String, CacheEntryInfo>,
        count: usize,
        strategy: EvictionStrategy,
    ) -> Vec<String> {
        let model = self.current_model();
        let weights = self.tuner.weights();
        let ctx = self.context(model.as_deref(), &weights);
        let candidates = strategy.select_candidates(&ctx, entries, count);
        self.diagnostics.emit(CacheEvent::EvictionCandidates {
            strategy: strategy.name().to_string(),
            count: candidates.len(),
        });
        candidates
    }

    /// Blends the named strategies by weight. Names that do not resolve are skipped.
    pub fn select_hybrid_candidates(
        &self,
        entries: &HashMap<String, CacheEntryInfo>,
        count: usize,
        weights: &StrategyWeights,
    ) -> Vec<String> {
        let resolved: Vec<(EvictionStrategy, f64)> = weights
            .iter()
            .filter_map(|(name, weight)| match name.parse::<EvictionStrategy>() {
                Ok(strategy) => Some((strategy, *weight)),
                Err(_) => {
                    debug!(strategy = %name, "Skipping unknown strategy in hybrid weights");
                    None
                }
            })
            .collect();

        let model = self.current_model();
        let adaptive = self.tuner.weights();
        let ctx = self.context(model.as_deref(), &adaptive);
        let candidates = blend(&ctx, entries, count, &resolved);
        self.diagnostics.emit(CacheEvent::EvictionCandidates {
            strategy: "hybrid".to_string(),
            count: candidates.len(),
        });
        candidates
    }

    /// Hybrid selection with the configured weights.
    pub fn select_hybrid_default(
        &self,
        entries: &HashMap<String, CacheEntryInfo>,
        count: usize,
    ) -> Vec<String> {
        self.select_hybrid_candidates(entries, count, &self.config.hybrid_weights)
    }

    fn context<'a>(
        &self,
        model: Option<&'a AccessModel>,
        adaptive_weights: &'a [(EvictionStrategy, f64)],
    ) -> SelectionContext<'a> {
        SelectionContext {
            now: self.clock.now_millis(),
            model,
            adaptive_weights,
            time_weights: self.config.time_weights,
        }
    }

    /// Records a read of `key`, stamped with `info.last_accessed_at` when set.
    pub fn record_access(&self, key: &str, info: &CacheEntryInfo) {
        let at = if info.last_accessed_at > 0 {
            info.last_accessed_at
        } else {
            self.clock.now_millis()
        };
        self.ledger.record(key, AccessKind::Read, at);
        self.tuner.note_access(key, at);
    }

    pub fn record_access_kind(&self, key: &str, kind: AccessKind) {
        let now = self.clock.now_millis();
        self.ledger.record(key, kind, now);
        if kind == AccessKind::Read {
            self.tuner.note_access(key, now);
        }
    }

    pub fn record_eviction(&self, key: &str, strategy: &str, reason: &str) {
        let now = self.clock.now_millis();
        self.total_evictions.fetch_add(1, Ordering::Relaxed);
        *self
            .evictions_by_strategy
            .entry(strategy.to_string())
            .or_insert(0) += 1;
        self.last_eviction_at.store(now, Ordering::Relaxed);

        if let Ok(resolved) = strategy.parse::<EvictionStrategy>() {
            self.tuner.note_eviction(key, resolved, now);
        }

        self.diagnostics.emit(CacheEvent::Evicted {
            key: key.to_string(),
            strategy: strategy.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Feeds an explicit outcome in `[0, 1]` into the adaptive score of `strategy`.
    pub fn record_strategy_outcome(&self, strategy: &str, outcome: f64) {
        match strategy.parse::<EvictionStrategy>() {
            Ok(resolved) => self.tuner.record_outcome(resolved, outcome),
            Err(_) => debug!(strategy, "Ignoring outcome for unknown strategy"),
        }
    }

    /// Probability in `[0, 1]` that `key` is accessed again; 0.0 while untrained.
    pub fn predict_access_probability(&self, key: &str) -> f64 {
        self.current_model()
            .map(|model| model.predict(key))
            .unwrap_or(0.0)
    }

    pub fn is_model_trained(&self) -> bool {
        self.current_model().is_some_and(|model| model.is_trained())
    }

    /// One analysis tick: prune the ledger, retrain when enough samples exist,
    /// and settle adaptive outcomes whose regret window has passed.
    #[instrument(skip(self))]
    pub fn analyze(&self) -> AnalysisReport {
        let now = self.clock.now_millis();
        self.ledger.prune(now);
        let records = self.ledger.snapshot();
        let samples = records.len();

        let retrained = if samples >= self.config.min_samples && samples > 0 {
            let model = AccessModel::train(&records, now, self.config.recent_window);
            *self.model.write() = Some(Arc::new(model));
            self.diagnostics.emit(CacheEvent::ModelRetrained { samples });
            info!(samples, "Access model retrained");
            true
        } else {
            *self.model.write() = None;
            debug!(
                samples,
                min_samples = self.config.min_samples,
                "Not enough samples to train access model"
            );
            false
        };

        let settled_outcomes = self.tuner.settle(now);
        self.total_analyses.fetch_add(1, Ordering::Relaxed);
        self.last_analysis_at.store(now, Ordering::Relaxed);

        AnalysisReport {
            samples,
            retrained,
            settled_outcomes,
        }
    }

    /// Spawns the periodic analysis worker.
    pub fn start_analysis(self: &Arc<Self>) -> WorkerHandle {
        let planner = Arc::clone(self);
        spawn_periodic(
            "eviction_analysis",
            self.config.analysis_interval,
            self.diagnostics.clone(),
            move || {
                let planner = Arc::clone(&planner);
                async move {
                    planner.analyze();
                    Ok::<(), std::convert::Infallible>(())
                }
            },
        )
    }

    pub fn available_strategies(&self) -> Vec<&'static str> {
        EvictionStrategy::ALL.iter().map(|s| s.name()).collect()
    }

    pub fn access_history(&self, key: &str, limit: usize) -> Vec<AccessRecord> {
        self.ledger.history(key, limit)
    }

    pub fn recent_access_history(&self, limit: usize) -> Vec<AccessRecord> {
        self.ledger.recent(limit)
    }

    pub fn statistics(&self) -> EvictionStatistics {
        let model = self.current_model();
        let nonzero = |v: Timestamp| (v > 0).then_some(v);
        EvictionStatistics {
            total_analyses: self.total_analyses.load(Ordering::Relaxed),
            total_evictions: self.total_evictions.load(Ordering::Relaxed),
            evictions_by_strategy: self
                .evictions_by_strategy
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            last_eviction_at: nonzero(self.last_eviction_at.load(Ordering::Relaxed)),
            last_analysis_at: nonzero(self.last_analysis_at.load(Ordering::Relaxed)),
            model_trained: model.as_ref().is_some_and(|m| m.is_trained()),
            model_samples: model.as_ref().map_or(0, |m| m.samples()),
            total_access_records: self.ledger.total_records(),
            unique_keys: self.ledger.unique_keys(),
            strategy_performance: self
                .tuner
                .snapshot()
                .into_iter()
                .map(|(strategy, score)| (strategy.name().to_string(), score))
                .collect(),
        }
    }
}

impl std::fmt::Debug for EvictionPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionPlanner")
            .field("config", &self.config)
            .field("model_trained", &self.is_model_trained())
            .field("total_evictions", &self.total_evictions.load(Ordering::Relaxed))
            .finish()
    }
}
