//! Recovery specs
//!
//! Whatever reached the WAL survives a restart.

use std::io::Write;
use std::time::Duration;

use crate::prelude::*;

fn slow_flush() -> PipelineConfig {
    PipelineConfig {
        flush_interval: Duration::from_secs(3600),
        ..PipelineConfig::default()
    }
}

async fn wait_for_wal_records(store: &Store, count: usize) {
    eventually(|| (store.wal_tail(0).unwrap().filter(Result::is_ok).count() == count).then_some(()))
        .await;
}

async fn wait_for_drain(store: &Store) {
    eventually(|| {
        let wal = store.wal_len().unwrap();
        (wal > 0 && store.read_offset().unwrap() == wal).then_some(())
    })
    .await;
}

#[tokio::test]
async fn logged_but_unflushed_events_are_replayed_on_restart() {
    let root = Root::new();
    let store = root.store();
    let pipeline = root.start_with(slow_flush());
    for user in ["a", "b", "c"] {
        pipeline.ingest().try_ingest(view_at(8, "v1", user)).unwrap();
    }
    wait_for_wal_records(&store, 3).await;
    pipeline.shutdown(GRACE).await.unwrap();

    let restarted = root.start();

    assert_eq!(restarted.recovery().replayed, 3);
    let report = restarted.reader().read_analytics(1).unwrap();
    assert_eq!(report.total_views, 3);
    assert_eq!(report.total_users, 3);
    restarted.shutdown(GRACE).await.unwrap();
}

#[tokio::test]
async fn torn_wal_tail_is_skipped_and_logging_resumes() {
    let root = Root::new();
    let store = root.store();
    let pipeline = root.start_with(slow_flush());
    pipeline.ingest().try_ingest(view_at(8, "v1", "a")).unwrap();
    wait_for_wal_records(&store, 1).await;
    pipeline.shutdown(GRACE).await.unwrap();

    // Crash in the middle of an append
    let mut wal = std::fs::OpenOptions::new()
        .append(true)
        .open(&store.paths().wal)
        .unwrap();
    wal.write_all(br#"{"timestamp":"2025-03-14T08:00:00Z","type":"vi"#)
        .unwrap();
    drop(wal);

    let restarted = root.start();
    assert_eq!(restarted.recovery().replayed, 1);
    assert_eq!(restarted.recovery().skipped, 1);

    restarted.ingest().try_ingest(view_at(9, "v2", "b")).unwrap();
    wait_for_drain(&store).await;
    let report = restarted.reader().read_analytics(1).unwrap();
    assert_eq!(report.total_views, 2);
    restarted.shutdown(GRACE).await.unwrap();
}

#[tokio::test]
async fn lost_cursor_write_double_counts_at_least_once() {
    let root = Root::new();
    let store = root.store();
    let pipeline = root.start();
    pipeline.ingest().try_ingest(view_at(8, "v1", "a")).unwrap();
    wait_for_drain(&store).await;
    pipeline.shutdown(GRACE).await.unwrap();

    // Simulate a crash after the segment append but before the cursor rename
    store.write_offset(0).unwrap();
    let restarted = root.start();

    let report = restarted.reader().read_analytics(1).unwrap();
    assert_eq!(report.total_views, 2);
    // The repeated user hash is deduplicated at read time
    assert_eq!(report.total_users, 1);
    restarted.shutdown(GRACE).await.unwrap();
}

#[tokio::test]
async fn corrupt_cursor_aborts_startup() {
    let root = Root::new();
    let store = root.store();
    store.ensure_layout().unwrap();
    std::fs::write(&store.paths().offset, b"abc").unwrap();

    let result = Pipeline::new(store, PipelineConfig::default(), clock())
        .start(CancellationToken::new());

    assert!(result.is_err());
}

#[tokio::test]
async fn cursor_beyond_wal_aborts_startup() {
    let root = Root::new();
    let store = root.store();
    store.ensure_layout().unwrap();
    store.write_offset(1_000).unwrap();

    let result = Pipeline::new(store, PipelineConfig::default(), clock())
        .start(CancellationToken::new());

    assert!(result.is_err());
}
