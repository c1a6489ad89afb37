//! Ingest specs
//!
//! Events accepted at the edge become day aggregates and a durable cursor.

use crate::prelude::*;
use similar_asserts::assert_eq;
use tally_engine::VideoCount;

#[tokio::test]
async fn views_of_one_day_are_counted_and_ranked() {
    let root = Root::new();
    let pipeline = root.start();

    for (video, user) in [("v1", "a"), ("v1", "b"), ("v1", "c"), ("v2", "d"), ("v2", "e")] {
        pipeline.ingest().try_ingest(view_at(9, video, user)).unwrap();
    }

    let report = eventually(|| {
        let report = pipeline.reader().read_analytics(1).unwrap();
        (report.total_views == 5).then_some(report)
    })
    .await;

    assert_eq!(report.total_users, 5);
    assert_eq!(
        report.top_50_videos,
        vec![
            VideoCount {
                video_id: "v1".to_string(),
                views: 3
            },
            VideoCount {
                video_id: "v2".to_string(),
                views: 2
            },
        ]
    );
    pipeline.shutdown(GRACE).await.unwrap();
}

#[tokio::test]
async fn cursor_reaches_wal_end_once_queues_drain() {
    let root = Root::new();
    let pipeline = root.start();
    let store = root.store();

    for i in 0..20 {
        pipeline
            .ingest()
            .try_ingest(view_at(10, &format!("v{}", i % 4), &format!("u{i}")))
            .unwrap();
    }

    eventually(|| {
        let wal = store.wal_len().unwrap();
        (wal > 0 && store.read_offset().unwrap() == wal).then_some(())
    })
    .await;
    pipeline.shutdown(GRACE).await.unwrap();
}

#[tokio::test]
async fn midnight_splits_partitions() {
    let root = Root::new();
    let pipeline = root.start();
    let store = root.store();
    let yesterday = today().pred_opt().unwrap();

    pipeline
        .ingest()
        .try_ingest(Event::view(
            Utc.with_ymd_and_hms(2025, 3, 13, 23, 59, 59).unwrap(),
            "v1",
            "u1",
        ))
        .unwrap();
    pipeline
        .ingest()
        .try_ingest(Event::view(
            Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 1).unwrap(),
            "v1",
            "u1",
        ))
        .unwrap();

    eventually(|| {
        let wal = store.wal_len().unwrap();
        (wal > 0 && store.read_offset().unwrap() == wal).then_some(())
    })
    .await;

    assert!(store.paths().view_segment(yesterday).exists());
    assert!(store.paths().view_segment(today()).exists());
    assert_eq!(pipeline.reader().read_analytics(1).unwrap().total_views, 1);
    assert_eq!(pipeline.reader().read_analytics(2).unwrap().total_views, 2);
    // The same user on two days counts once per day
    assert_eq!(pipeline.reader().read_analytics(2).unwrap().total_users, 2);
    pipeline.shutdown(GRACE).await.unwrap();
}

#[tokio::test]
async fn non_view_events_are_logged_but_not_counted() {
    let root = Root::new();
    let pipeline = root.start();
    let store = root.store();

    for kind in ["search", "like", "comment", "share"] {
        pipeline
            .ingest()
            .try_ingest(Event::new(now(), kind, "v1", "u1"))
            .unwrap();
    }

    eventually(|| {
        let wal = store.wal_len().unwrap();
        (wal > 0 && store.read_offset().unwrap() == wal).then_some(())
    })
    .await;

    assert_eq!(store.wal_tail(0).unwrap().count(), 4);
    assert_eq!(pipeline.reader().read_analytics(1).unwrap().total_views, 0);
    pipeline.shutdown(GRACE).await.unwrap();
}
