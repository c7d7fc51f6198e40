//! Periodic background workers.
//!
//! Sync, heartbeat and analysis loops all run through [`spawn_periodic`]: a
//! tokio task that ticks on an interval, contains errors and panics of a
//! single tick, and stops when its [`WorkerHandle`] is cancelled.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::diagnostics::{CacheEvent, Diagnostics};

/// Handle to a running periodic worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    stop: Arc<AtomicBool>,
    notify: Arc<Notify>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Asks the worker to stop after its current tick (if any).
    pub fn cancel(&self) {
        // Release: pairs with the Acquire load at the top of each loop iteration.
        self.stop.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Cancels the worker and waits for it to exit.
    pub async fn shutdown(self) {
        self.cancel();
        if let Err(e) = self.join.await {
            warn!(worker = self.name, error = %e, "Worker task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Runs `tick` every `period` until cancelled.
///
/// The first tick fires one full period after spawning. A tick that returns
/// `Err` or panics emits [`CacheEvent::TaskFailed`] and the loop continues.
pub fn spawn_periodic<F, Fut, E>(
    name: &'static str,
    period: Duration,
    diagnostics: Diagnostics,
    mut tick: F,
) -> WorkerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let notify = Arc::new(Notify::new());
    let task_stop = Arc::clone(&stop);
    let task_notify = Arc::clone(&notify);

    let join = tokio::spawn(async move {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(worker = name, period_ms = period.as_millis() as u64, "Worker started");

        loop {
            if task_stop.load(Ordering::Acquire) {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {}
                _ = task_notify.notified() => continue,
            }

            match AssertUnwindSafe(tick()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(worker = name, error = %e, "Worker tick failed");
                    diagnostics.emit(CacheEvent::TaskFailed {
                        task: name,
                        error: e.to_string(),
                    });
                }
                Err(panic) => {
                    let error = panic_message(panic.as_ref());
                    warn!(worker = name, error = %error, "Worker tick panicked");
                    diagnostics.emit(CacheEvent::TaskFailed { task: name, error });
                }
            }
        }

        debug!(worker = name, "Worker stopped");
    });

    WorkerHandle {
        name,
        stop,
        notify,
        join,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
