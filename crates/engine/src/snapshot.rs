// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight rolling snapshot rebuilds
//!
//! Requests travel over a capacity-1 channel, so any number of requests made
//! while one is pending collapse into it. The worker additionally refuses to
//! start while a rebuild is in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_core::Clock;
use tally_storage::{StorageError, Store};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A blocking snapshot rebuild
pub trait Rebuild: Send + Sync + 'static {
    /// Rebuild the snapshot, returning the number of videos written
    fn rebuild(&self) -> Result<usize, StorageError>;
}

/// Rebuilds the rolling-window snapshot as of the clock's current day
#[derive(Clone)]
pub struct RollingSnapshot<C: Clock> {
    store: Store,
    window_days: u32,
    clock: C,
}

impl<C: Clock> RollingSnapshot<C> {
    pub fn new(store: Store, window_days: u32, clock: C) -> Self {
        Self {
            store,
            window_days,
            clock,
        }
    }
}

impl<C: Clock> Rebuild for RollingSnapshot<C> {
    fn rebuild(&self) -> Result<usize, StorageError> {
        self.store
            .build_rolling_snapshot(self.clock.today(), self.window_days)
    }
}

/// Handle for requesting rebuilds and observing the worker
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    tx: mpsc::Sender<()>,
    running: Arc<AtomicBool>,
}

impl SnapshotHandle {
    /// Ask for a rebuild
    ///
    /// Returns false when a request is already pending (the new one is
    /// coalesced into it) or the worker has stopped.
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }

    /// True while a rebuild is executing
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

pub(crate) fn snapshot_channel() -> (SnapshotHandle, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    let handle = SnapshotHandle {
        tx,
        running: Arc::new(AtomicBool::new(false)),
    };
    (handle, rx)
}

/// Request a rebuild immediately and then every `period`
pub(crate) async fn run_snapshot_scheduler(
    handle: SnapshotHandle,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !handle.request() {
                    debug!("snapshot rebuild already pending, tick coalesced");
                }
            }
        }
    }
}

/// Execute rebuild requests one at a time
pub(crate) async fn run_snapshot_worker<R: Rebuild>(
    rebuild: Arc<R>,
    running: Arc<AtomicBool>,
    mut rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            request = rx.recv() => {
                if request.is_none() {
                    break;
                }
                rebuild_once(&rebuild, &running).await;
            }
        }
    }
}

async fn rebuild_once<R: Rebuild>(rebuild: &Arc<R>, running: &AtomicBool) {
    if running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("snapshot rebuild in flight, request dropped");
        return;
    }

    let started = std::time::Instant::now();
    let job = Arc::clone(rebuild);
    let result = tokio::task::spawn_blocking(move || job.rebuild()).await;
    running.store(false, Ordering::Release);

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(Ok(videos)) => info!(videos, elapsed_ms, "rolling snapshot rebuilt"),
        Ok(Err(e)) => error!(error = %e, elapsed_ms, "snapshot rebuild failed"),
        Err(e) => error!(error = %e, "snapshot rebuild task panicked"),
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
