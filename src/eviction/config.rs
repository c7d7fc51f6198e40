use std::collections::BTreeMap;
use std::time::Duration;

use super::error::{EvictionError, EvictionResult};
use super::strategy::EvictionStrategy;

/// Strategy name to blend weight. Ordered so hybrid selection is deterministic.
pub type StrategyWeights = BTreeMap<String, f64>;

pub const DEFAULT_ANALYSIS_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_LEARNING_WINDOW: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REGRET_WINDOW: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MIN_SAMPLES: usize = 100;
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Hybrid weights used when none are configured.
pub fn default_hybrid_weights() -> StrategyWeights {
    [
        ("lru", 0.3),
        ("lfu", 0.2),
        ("size", 0.2),
        ("cost_benefit", 0.2),
        ("predictive", 0.1),
    ]
    .into_iter()
    .map(|(name, weight)| (name.to_string(), weight))
    .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Period of the analysis worker.
    pub analysis_interval: Duration,
    /// Ledger records older than this are pruned.
    pub learning_window: Duration,
    /// Trailing part of the learning window counted as "recent" by the model.
    pub recent_window: Duration,
    /// Ledger size required before the model is trained.
    pub min_samples: usize,
    /// Used by `select_default_candidates`.
    pub default_strategy: EvictionStrategy,
    pub hybrid_weights: StrategyWeights,
    /// Adaptive moving-average rate.
    pub learning_rate: f64,
    /// A re-access this soon after an eviction counts against the strategy.
    pub regret_window: Duration,
    /// `(idle_weight, frequency_weight)` for the time-weighted strategy.
    pub time_weights: (f64, f64),
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            analysis_interval: DEFAULT_ANALYSIS_INTERVAL,
            learning_window: DEFAULT_LEARNING_WINDOW,
            recent_window: DEFAULT_RECENT_WINDOW,
            min_samples: DEFAULT_MIN_SAMPLES,
            default_strategy: EvictionStrategy::Predictive,
            hybrid_weights: default_hybrid_weights(),
            learning_rate: DEFAULT_LEARNING_RATE,
            regret_window: DEFAULT_REGRET_WINDOW,
            time_weights: (0.5, 0.5),
        }
    }
}

impl PlannerConfig {
    /// Small windows and a low sample threshold.
    pub fn for_testing() -> Self {
        Self {
            analysis_interval: Duration::from_millis(50),
            learning_window: Duration::from_secs(60),
            recent_window: Duration::from_secs(10),
            min_samples: 5,
            regret_window: Duration::from_secs(5),
            ..Default::default()
        }
    }

    pub fn analysis_interval(mut self, interval: Duration) -> Self {
        self.analysis_interval = interval;
        self
    }

    pub fn min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn default_strategy(mut self, strategy: EvictionStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn hybrid_weights(mut self, weights: StrategyWeights) -> Self {
        self.hybrid_weights = weights;
        self
    }

    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    pub fn windows(mut self, learning: Duration, recent: Duration) -> Self {
        self.learning_window = learning;
        self.recent_window = recent;
        self
    }

    pub fn regret_window(mut self, window: Duration) -> Self {
        self.regret_window = window;
        self
    }

    pub fn validate(&self) -> EvictionResult<()> {
        if self.analysis_interval.is_zero() {
            return Err(EvictionError::Config {
                reason: "analysis_interval must be > 0".to_string(),
            });
        }
        if self.recent_window > self.learning_window {
            return Err(EvictionError::Config {
                reason: format!(
                    "recent_window ({:?}) cannot exceed learning_window ({:?})",
                    self.recent_window, self.learning_window
                ),
            });
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(EvictionError::Config {
                reason: format!("learning_rate must be in (0, 1], got {}", self.learning_rate),
            });
        }
        if let Some((name, weight)) = self
            .hybrid_weights
            .iter()
            .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
        {
            return Err(EvictionError::Config {
                reason: format!("hybrid weight for '{name}' must be a non-negative number, got {weight}"),
            });
        }
        Ok(())
    }
}
