use std::collections::HashMap;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::strategy::EvictionStrategy;
use crate::clock::Timestamp;

const INITIAL_PERFORMANCE: f64 = 0.5;
const MIN_WEIGHT: f64 = 0.01;

/// Tracks how well each strategy's evictions turn out.
///
/// A key evicted by strategy S that is read again inside the regret window
/// scores S with 0.0; an eviction that survives the window scores 1.0. Scores
/// are an exponential moving average: `p += rate * (outcome - p)`.
#[derive(Debug)]
pub struct AdaptiveTuner {
    performance: RwLock<HashMap<EvictionStrategy, f64>>,
    pending: DashMap<String, (EvictionStrategy, Timestamp)>,
    learning_rate: f64,
    regret_window: Duration,
}

impl AdaptiveTuner {
    pub fn new(learning_rate: f64, regret_window: Duration) -> Self {
        Self {
            performance: RwLock::new(HashMap::new()),
            pending: DashMap::new(),
            learning_rate,
            regret_window,
        }
    }

    pub fn record_outcome(&self, strategy: EvictionStrategy, outcome: f64) {
        let outcome = outcome.clamp(0.0, 1.0);
        let mut performance = self.performance.write();
        let current = performance.entry(strategy).or_insert(INITIAL_PERFORMANCE);
        *current += self.learning_rate * (outcome - *current);
    }

    pub fn performance(&self, strategy: EvictionStrategy) -> f64 {
        self.performance
            .read()
            .get(&strategy)
            .copied()
            .unwrap_or(INITIAL_PERFORMANCE)
    }

    /// Blend weights for the adaptive base strategies.
    pub fn weights(&self) -> Vec<(EvictionStrategy, f64)> {
        EvictionStrategy::ADAPTIVE_BASE
            .into_iter()
            .map(|strategy| (strategy, self.performance(strategy).max(MIN_WEIGHT)))
            .collect()
    }

    /// Remembers an eviction so a quick re-access can be held against `strategy`.
    pub fn note_eviction(&self, key: &str, strategy: EvictionStrategy, at: Timestamp) {
        self.pending.insert(key.to_string(), (strategy, at));
    }

    /// Charges a regret if `key` was evicted recently.
    pub fn note_access(&self, key: &str, at: Timestamp) {
        if let Some((_, (strategy, evicted_at))) = self.pending.remove(key) {
            let window = self.regret_window.as_millis() as u64;
            let outcome = if at.saturating_sub(evicted_at) <= window {
                0.0
            } else {
                1.0
            };
            self.record_outcome(strategy, outcome);
        }
    }

    /// Credits every eviction whose regret window has passed; returns how many.
    pub fn settle(&self, now: Timestamp) -> usize {
        let window = self.regret_window.as_millis() as u64;
        let matured: Vec<(String, EvictionStrategy)> = self
            .pending
            .iter()
            .filter(|entry| now.saturating_sub(entry.value().1) > window)
            .map(|entry| (entry.key().clone(), entry.value().0))
            .collect();

        let mut settled = 0;
        for (key, strategy) in matured {
            if self.pending.remove(&key).is_some() {
                self.record_outcome(strategy, 1.0);
                settled += 1;
            }
        }
        settled
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn snapshot(&self) -> Vec<(EvictionStrategy, f64)> {
        let mut scores: Vec<_> = self
            .performance
            .read()
            .iter()
            .map(|(strategy, score)| (*strategy, *score))
            .collect();
        scores.sort_by_key(|(strategy, _)| *strategy);
        scores
    }
}
