use std::time::Duration;

use dashmap::DashMap;

use super::types::{AccessKind, AccessRecord};
use crate::clock::Timestamp;

/// Per-key access history bounded by the learning window.
///
/// Appends for one key serialize on that key's shard; readers may see a view
/// that is a tick behind, which the model tolerates.
#[derive(Debug)]
pub struct AccessLedger {
    history: DashMap<String, Vec<AccessRecord>>,
    window: Duration,
}

impl AccessLedger {
    pub fn new(window: Duration) -> Self {
        Self {
            history: DashMap::new(),
            window,
        }
    }

    fn cutoff(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.window.as_millis() as u64)
    }

    /// Appends a record and prunes that key's expired history.
    pub fn record(&self, key: &str, kind: AccessKind, at: Timestamp) {
        let cutoff = self.cutoff(at);
        let mut history = self.history.entry(key.to_string()).or_default();
        history.push(AccessRecord {
            timestamp: at,
            key: key.to_string(),
            kind,
        });
        history.retain(|record| record.timestamp >= cutoff);
    }

    /// Prunes every key and drops keys with no remaining history.
    pub fn prune(&self, now: Timestamp) {
        let cutoff = self.cutoff(now);
        self.history.retain(|_, history| {
            history.retain(|record| record.timestamp >= cutoff);
            !history.is_empty()
        });
    }

    /// Copies every record.
    pub fn snapshot(&self) -> Vec<AccessRecord> {
        self.history
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// The latest `limit` records for `key`, oldest first.
    pub fn history(&self, key: &str, limit: usize) -> Vec<AccessRecord> {
        self.history
            .get(key)
            .map(|history| {
                let skip = history.len().saturating_sub(limit);
                history[skip..].to_vec()
            })
            .unwrap_or_default()
    }

    /// The latest `limit` records across all keys, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AccessRecord> {
        let mut all = self.snapshot();
        all.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.key.cmp(&b.key))
        });
        all.truncate(limit);
        all
    }

    pub fn total_records(&self) -> usize {
        self.history.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn unique_keys(&self) -> usize {
        self.history.len()
    }

    pub fn clear(&self) {
        self.history.clear();
    }
}
