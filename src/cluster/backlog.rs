use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::operation::SyncOperation;

/// One pending replication.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSync {
    pub op: Arc<SyncOperation>,
    /// Peers still owed a delivery; `None` means every active peer at drain time.
    pub targets: Option<BTreeSet<String>>,
}

impl PendingSync {
    pub fn broadcast(op: Arc<SyncOperation>) -> Self {
        Self { op, targets: None }
    }

    pub fn to_peers(op: Arc<SyncOperation>, peers: BTreeSet<String>) -> Self {
        Self {
            op,
            targets: Some(peers),
        }
    }
}

/// Ordered, bounded replication backlog behind a single async mutex.
#[derive(Debug)]
pub struct Backlog {
    items: Mutex<VecDeque<PendingSync>>,
    capacity: usize,
}

impl Backlog {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Appends `item`; returns how many of the oldest items were dropped to fit.
    pub async fn push(&self, item: PendingSync) -> usize {
        let mut items = self.items.lock().await;
        items.push_back(item);
        Self::trim(&mut items, self.capacity)
    }

    /// Takes every pending item, oldest first.
    pub async fn drain(&self) -> Vec<PendingSync> {
        let mut items = self.items.lock().await;
        items.drain(..).collect()
    }

    /// Puts `requeued` back ahead of anything enqueued since the drain, keeping
    /// its order. Returns how many of the oldest items were dropped to fit.
    pub async fn requeue_front(&self, requeued: Vec<PendingSync>) -> usize {
        if requeued.is_empty() {
            return 0;
        }
        let mut items = self.items.lock().await;
        for item in requeued.into_iter().rev() {
            items.push_front(item);
        }
        Self::trim(&mut items, self.capacity)
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<PendingSync> {
        self.items.lock().await.iter().cloned().collect()
    }

    fn trim(items: &mut VecDeque<PendingSync>, capacity: usize) -> usize {
        let overflow = items.len().saturating_sub(capacity);
        items.drain(..overflow);
        overflow
    }
}
