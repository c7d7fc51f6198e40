use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::store::CacheValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncOperationKind {
    Put,
    Remove,
    Clear,
}

impl SyncOperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperationKind::Put => "put",
            SyncOperationKind::Remove => "remove",
            SyncOperationKind::Clear => "clear",
        }
    }
}

impl std::fmt::Display for SyncOperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local mutation to be replayed on peers. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub kind: SyncOperationKind,
    /// Empty for `Clear`.
    pub key: String,
    /// Present only for `Put`.
    pub value: Option<CacheValue>,
    pub expire_at: Option<Timestamp>,
    /// When the origin applied the mutation.
    pub timestamp: Timestamp,
    pub origin_node_id: String,
}

impl SyncOperation {
    pub fn put(
        origin: &str,
        key: &str,
        value: CacheValue,
        expire_at: Option<Timestamp>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            kind: SyncOperationKind::Put,
            key: key.to_string(),
            value: Some(value),
            expire_at,
            timestamp,
            origin_node_id: origin.to_string(),
        }
    }

    pub fn remove(origin: &str, key: &str, timestamp: Timestamp) -> Self {
        Self {
            kind: SyncOperationKind::Remove,
            key: key.to_string(),
            value: None,
            expire_at: None,
            timestamp,
            origin_node_id: origin.to_string(),
        }
    }

    pub fn clear(origin: &str, timestamp: Timestamp) -> Self {
        Self {
            kind: SyncOperationKind::Clear,
            key: String::new(),
            value: None,
            expire_at: None,
            timestamp,
            origin_node_id: origin.to_string(),
        }
    }
}
