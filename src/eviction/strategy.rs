//! Eviction strategies.
//!
//! Every strategy orders candidates "evict first" to "evict last" and breaks
//! ties on the key, so the same snapshot always yields the same list no matter
//! how the input map iterates.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::model::AccessModel;
use super::types::CacheEntryInfo;
use crate::clock::Timestamp;

/// The closed set of eviction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EvictionStrategy {
    /// Oldest `last_accessed_at` first.
    Lru,
    /// Lowest `access_count` first.
    Lfu,
    /// Largest `size_bytes` first.
    Size,
    /// Soonest `expire_at` first; entries without expiry are never chosen.
    ExpireTime,
    /// Lowest accesses-per-millisecond-per-byte first.
    CostBenefit,
    /// Blend of idle time and access count, stalest first.
    TimeWeighted,
    /// Base strategies blended by their observed performance.
    Adaptive,
    /// Lowest predicted access probability first; LRU while the model is untrained.
    Predictive,
}

impl EvictionStrategy {
    pub const ALL: [EvictionStrategy; 8] = [
        EvictionStrategy::Lru,
        EvictionStrategy::Lfu,
        EvictionStrategy::Size,
        EvictionStrategy::ExpireTime,
        EvictionStrategy::CostBenefit,
        EvictionStrategy::TimeWeighted,
        EvictionStrategy::Adaptive,
        EvictionStrategy::Predictive,
    ];

    /// Strategies the adaptive blend draws from.
    pub const ADAPTIVE_BASE: [EvictionStrategy; 4] = [
        EvictionStrategy::Lru,
        EvictionStrategy::Lfu,
        EvictionStrategy::Size,
        EvictionStrategy::CostBenefit,
    ];

    /// Registry name.
    pub fn name(&self) -> &'static str {
        match self {
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Lfu => "lfu",
            EvictionStrategy::Size => "size",
            EvictionStrategy::ExpireTime => "expire_time",
            EvictionStrategy::CostBenefit => "cost_benefit",
            EvictionStrategy::TimeWeighted => "time_weighted",
            EvictionStrategy::Adaptive => "adaptive",
            EvictionStrategy::Predictive => "predictive",
        }
    }

    /// Returns up to `count` keys to evict, best candidate first.
    pub fn select_candidates(
        &self,
        ctx: &SelectionContext<'_>,
        entries: &HashMap<String, CacheEntryInfo>,
        count: usize,
    ) -> Vec<String> {
        if count == 0 || entries.is_empty() {
            return Vec::new();
        }
        match self {
            EvictionStrategy::Lru => ranked(entries.values(), count, |a, b| {
                a.last_accessed_at.cmp(&b.last_accessed_at)
            }),
            EvictionStrategy::Lfu => ranked(entries.values(), count, |a, b| {
                a.access_count.cmp(&b.access_count)
            }),
            EvictionStrategy::Size => {
                ranked(entries.values(), count, |a, b| b.size_bytes.cmp(&a.size_bytes))
            }
            EvictionStrategy::ExpireTime => ranked(
                entries.values().filter(|info| info.expire_at.is_some()),
                count,
                |a, b| a.expire_at.cmp(&b.expire_at),
            ),
            EvictionStrategy::CostBenefit => ranked(entries.values(), count, |a, b| {
                cost_benefit(a, ctx.now).total_cmp(&cost_benefit(b, ctx.now))
            }),
            EvictionStrategy::TimeWeighted => ranked(entries.values(), count, |a, b| {
                staleness(b, ctx).total_cmp(&staleness(a, ctx))
            }),
            EvictionStrategy::Adaptive => blend(ctx, entries, count, ctx.adaptive_weights),
            EvictionStrategy::Predictive => match ctx.model.filter(|m| m.is_trained()) {
                Some(model) => ranked(entries.values(), count, |a, b| {
                    model
                        .predict(&a.key)
                        .total_cmp(&model.predict(&b.key))
                        .then_with(|| a.last_accessed_at.cmp(&b.last_accessed_at))
                }),
                None => EvictionStrategy::Lru.select_candidates(ctx, entries, count),
            },
        }
    }
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        EvictionStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == normalized)
            .or(match normalized.as_str() {
                "ml_prediction" | "ml" => Some(EvictionStrategy::Predictive),
                _ => None,
            })
            .ok_or_else(|| format!("Unknown eviction strategy: {}", s))
    }
}

/// Inputs shared by every strategy for one selection.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub now: Timestamp,
    /// Current prediction model, if one has been trained.
    pub model: Option<&'a AccessModel>,
    /// Weights used by [`EvictionStrategy::Adaptive`].
    pub adaptive_weights: &'a [(EvictionStrategy, f64)],
    /// `(idle_weight, frequency_weight)` for [`EvictionStrategy::TimeWeighted`].
    pub time_weights: (f64, f64),
}

impl<'a> SelectionContext<'a> {
    /// A context with no model and no adaptive weights.
    pub fn at(now: Timestamp) -> Self {
        Self {
            now,
            model: None,
            adaptive_weights: &[],
            time_weights: (0.5, 0.5),
        }
    }
}

/// Weighted rank blend used by hybrid and adaptive selection.
///
/// Each strategy picks from a pool of `2 * count`; a key at position `i` of a
/// list of length `n` scores `weight * (1 - i / n)`. Keys are returned by
/// descending accumulated score.
pub(crate) fn blend(
    ctx: &SelectionContext<'_>,
    entries: &HashMap<String, CacheEntryInfo>,
    count: usize,
    weights: &[(EvictionStrategy, f64)],
) -> Vec<String> {
    if count == 0 || entries.is_empty() {
        return Vec::new();
    }
    let pool = count.saturating_mul(2);
    let mut scores: HashMap<&str, f64> = HashMap::new();

    for (strategy, weight) in weights {
        let candidates = strategy.select_candidates(ctx, entries, pool);
        let len = candidates.len() as f64;
        for (position, key) in candidates.iter().enumerate() {
            if let Some((stored, _)) = entries.get_key_value(key) {
                *scores.entry(stored.as_str()).or_insert(0.0) +=
                    weight * (1.0 - position as f64 / len);
            }
        }
    }

    let mut scored: Vec<(&str, f64)> = scores.into_iter().collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(count)
        .map(|(key, _)| key.to_string())
        .collect()
}

fn ranked<'e, I, F>(entries: I, count: usize, compare: F) -> Vec<String>
where
    I: Iterator<Item = &'e CacheEntryInfo>,
    F: Fn(&CacheEntryInfo, &CacheEntryInfo) -> Ordering,
{
    let mut items: Vec<&CacheEntryInfo> = entries.collect();
    items.sort_by(|a, b| compare(a, b).then_with(|| a.key.cmp(&b.key)));
    items
        .into_iter()
        .take(count)
        .map(|info| info.key.clone())
        .collect()
}

fn cost_benefit(info: &CacheEntryInfo, now: Timestamp) -> f64 {
    let age = now.saturating_sub(info.created_at);
    let frequency = if age > 0 {
        info.access_count as f64 / age as f64
    } else {
        0.0
    };
    if info.size_bytes > 0 {
        frequency / info.size_bytes as f64
    } else {
        0.0
    }
}

fn staleness(info: &CacheEntryInfo, ctx: &SelectionContext<'_>) -> f64 {
    let idle_secs = ctx.now.saturating_sub(info.last_accessed_at) as f64 / 1000.0;
    let (idle_weight, frequency_weight) = ctx.time_weights;
    idle_weight * idle_secs - frequency_weight * info.access_count as f64
}
