// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicUsize;
use std::sync::Mutex;
use tally_core::FakeClock;
use tempfile::TempDir;

/// Rebuild that blocks until the test hands it a permit
struct GatedRebuild {
    calls: AtomicUsize,
    gate: Mutex<std::sync::mpsc::Receiver<()>>,
}

impl Rebuild for GatedRebuild {
    fn rebuild(&self) -> Result<usize, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap();
        let _ = gate.recv();
        Ok(0)
    }
}

struct FailingRebuild {
    calls: AtomicUsize,
}

impl Rebuild for FailingRebuild {
    fn rebuild(&self) -> Result<usize, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Io(std::io::Error::other("disk gone")))
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn requests_during_rebuild_coalesce_into_one() {
    let (permit_tx, permit_rx) = std::sync::mpsc::channel();
    let rebuild = Arc::new(GatedRebuild {
        calls: AtomicUsize::new(0),
        gate: Mutex::new(permit_rx),
    });
    let (handle, rx) = snapshot_channel();
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(run_snapshot_worker(
        Arc::clone(&rebuild),
        handle.running_flag(),
        rx,
        cancel.clone(),
    ));

    assert!(handle.request());
    wait_until(|| handle.is_running()).await;

    // Two more requests while the first rebuild is blocked
    assert!(handle.request());
    assert!(!handle.request());

    permit_tx.send(()).unwrap();
    permit_tx.send(()).unwrap();
    wait_until(|| rebuild.calls.load(Ordering::SeqCst) == 2 && !handle.is_running()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(rebuild.calls.load(Ordering::SeqCst), 2);
    cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn failed_rebuild_returns_to_idle() {
    let rebuild = Arc::new(FailingRebuild {
        calls: AtomicUsize::new(0),
    });
    let (handle, rx) = snapshot_channel();
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(run_snapshot_worker(
        Arc::clone(&rebuild),
        handle.running_flag(),
        rx,
        cancel.clone(),
    ));

    handle.request();
    wait_until(|| rebuild.calls.load(Ordering::SeqCst) == 1 && !handle.is_running()).await;
    wait_until(|| handle.request()).await;
    wait_until(|| rebuild.calls.load(Ordering::SeqCst) == 2).await;

    cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn scheduler_requests_immediately_on_start() {
    let (handle, mut rx) = snapshot_channel();
    let cancel = CancellationToken::new();
    let scheduler = tokio::spawn(run_snapshot_scheduler(
        handle,
        Duration::from_secs(3600),
        cancel.clone(),
    ));

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
    assert!(matches!(first, Ok(Some(()))));

    cancel.cancel();
    scheduler.await.unwrap();
}

#[test]
fn rolling_snapshot_merges_window_ending_today() {
    let dir = TempDir::new().unwrap();
    let store = Store::new(dir.path());
    store.ensure_layout().unwrap();
    let day = |d| NaiveDate::from_ymd_opt(2024, 9, d).unwrap();
    let views = |n| BTreeMap::from([("v1".to_string(), n)]);
    store
        .segments()
        .append_aggregates(day(1), &views(4), &BTreeSet::new())
        .unwrap();
    store
        .segments()
        .append_aggregates(day(3), &views(6), &BTreeSet::new())
        .unwrap();
    let clock = FakeClock::at(Utc.with_ymd_and_hms(2024, 9, 3, 18, 0, 0).unwrap());

    let videos = RollingSnapshot::new(store.clone(), 2, clock).rebuild().unwrap();

    assert_eq!(videos, 1);
    assert_eq!(store.read_snapshot(2).unwrap()["v1"], 6);
}
