use std::collections::HashMap;
use std::time::Duration;

use super::types::AccessRecord;
use crate::clock::Timestamp;

/// Frequency/recency access model.
///
/// Built once from a ledger snapshot and never mutated; retraining replaces it.
/// The probability for a key is
/// `(count(key) / total + recent(key) / count(key)) / 2`, where `recent`
/// counts accesses inside the trailing recent window at training time.
#[derive(Debug, Clone, Default)]
pub struct AccessModel {
    frequencies: HashMap<String, usize>,
    recent: HashMap<String, usize>,
    total: usize,
    trained_at: Timestamp,
}

impl AccessModel {
    pub fn train<'a, I>(records: I, now: Timestamp, recent_window: Duration) -> Self
    where
        I: IntoIterator<Item = &'a AccessRecord>,
    {
        let recent_cutoff = now.saturating_sub(recent_window.as_millis() as u64);
        let mut frequencies: HashMap<String, usize> = HashMap::new();
        let mut recent: HashMap<String, usize> = HashMap::new();
        let mut total = 0;

        for record in records {
            total += 1;
            *frequencies.entry(record.key.clone()).or_insert(0) += 1;
            if record.timestamp >= recent_cutoff {
                *recent.entry(record.key.clone()).or_insert(0) += 1;
            }
        }

        Self {
            frequencies,
            recent,
            total,
            trained_at: now,
        }
    }

    #[inline]
    pub fn is_trained(&self) -> bool {
        self.total > 0
    }

    /// Number of records the model was built from.
    #[inline]
    pub fn samples(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn trained_at(&self) -> Timestamp {
        self.trained_at
    }

    pub fn predict(&self, key: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let count = self.frequencies.get(key).copied().unwrap_or(0);
        if count == 0 {
            return 0.0;
        }
        let frequency = count as f64 / self.total as f64;
        let recency = self.recent.get(key).copied().unwrap_or(0) as f64 / count as f64;
        (frequency + recency) / 2.0
    }
}
