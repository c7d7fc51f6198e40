use crate::worker::WorkerHandle;

/// Background workers of one coordinator.
///
/// Cancelling one worker leaves the other running.
#[derive(Debug)]
pub struct ClusterWorkers {
    sync: WorkerHandle,
    heartbeat: WorkerHandle,
}

impl ClusterWorkers {
    pub(crate) fn new(sync: WorkerHandle, heartbeat: WorkerHandle) -> Self {
        Self { sync, heartbeat }
    }

    pub fn sync(&self) -> &WorkerHandle {
        &self.sync
    }

    pub fn heartbeat(&self) -> &WorkerHandle {
        &self.heartbeat
    }

    pub fn cancel_sync(&self) {
        self.sync.cancel();
    }

    pub fn cancel_heartbeat(&self) {
        self.heartbeat.cancel();
    }

    pub fn cancel(&self) {
        self.cancel_sync();
        self.cancel_heartbeat();
    }

    /// Cancels both workers and waits for them to stop.
    pub async fn shutdown(self) {
        self.cancel();
        self.sync.shutdown().await;
        self.heartbeat.shutdown().await;
    }
}
