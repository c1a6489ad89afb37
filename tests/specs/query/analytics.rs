//! Analytics query specs

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::prelude::*;
use tally_engine::{QueryError, ViewSource};

fn seed(store: &Store, days_ago: u64, videos: &[(&str, u64)]) {
    let day = today() - chrono::Days::new(days_ago);
    let views: BTreeMap<String, u64> = videos.iter().map(|(v, n)| (v.to_string(), *n)).collect();
    store
        .segments()
        .append_aggregates(day, &views, &BTreeSet::new())
        .unwrap();
}

#[tokio::test]
async fn thirty_day_window_is_served_from_the_startup_snapshot() {
    let root = Root::new();
    let store = root.store();
    store.ensure_layout().unwrap();
    seed(&store, 0, &[("a", 5), ("b", 5)]);
    seed(&store, 29, &[("c", 10)]);
    seed(&store, 30, &[("old", 100)]);

    let pipeline = root.start();
    let snapshot = store.paths().snapshot(30);
    eventually(|| snapshot.exists().then_some(())).await;

    let report = pipeline.reader().read_analytics(30).unwrap();
    assert_eq!(report.source, ViewSource::Snapshot);
    assert_eq!(report.total_views, 20);
    let ranked: Vec<_> = report
        .top_50_videos
        .iter()
        .map(|v| (v.video_id.as_str(), v.views))
        .collect();
    assert_eq!(ranked, vec![("c", 10), ("a", 5), ("b", 5)]);
    pipeline.shutdown(GRACE).await.unwrap();
}

#[tokio::test]
async fn other_windows_merge_segments_on_demand() {
    let root = Root::new();
    let store = root.store();
    store.ensure_layout().unwrap();
    seed(&store, 0, &[("a", 1)]);
    seed(&store, 6, &[("a", 2)]);
    seed(&store, 7, &[("a", 4)]);

    let pipeline = root.start_with(PipelineConfig {
        snapshot_interval: Duration::from_secs(3600),
        ..PipelineConfig::default()
    });

    let week = pipeline.reader().read_analytics(7).unwrap();
    assert_eq!(week.source, ViewSource::Segments);
    assert_eq!(week.total_views, 3);
    assert_eq!(pipeline.reader().read_analytics(8).unwrap().total_views, 7);
    pipeline.shutdown(GRACE).await.unwrap();
}

#[tokio::test]
async fn non_positive_days_are_rejected() {
    let root = Root::new();
    let pipeline = root.start();

    for days in [0, -1] {
        assert!(matches!(
            pipeline.reader().read_analytics(days),
            Err(QueryError::InvalidDays { .. })
        ));
    }
    pipeline.shutdown(GRACE).await.unwrap();
}

#[tokio::test]
async fn event_support_lists_registered_types() {
    let root = Root::new();
    let pipeline = root.start();

    let report = pipeline.reader().read_analytics(1).unwrap();

    assert_eq!(
        report.event_support,
        vec!["comment", "like", "search", "view"]
    );
    pipeline.shutdown(GRACE).await.unwrap();
}
