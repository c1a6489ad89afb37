//! Daemon socket specs
//!
//! Drive a started daemon over its Unix socket with the wire protocol.

use std::path::Path;
use std::sync::Arc;

use crate::prelude::*;
use tally_core::EventDraft;
use tally_daemon::lifecycle::{self, Config, DaemonState};
use tally_daemon::protocol;
use tally_daemon::server;
use tally_daemon::{Request, Response};
use tokio::net::UnixStream;

/// Start a daemon and serve connections until shutdown is requested
async fn serve(config: &Config) -> tokio::task::JoinHandle<()> {
    let daemon: DaemonState = lifecycle::startup(config).await.unwrap();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = daemon.listener.accept() => {
                    let (stream, _) = accepted.unwrap();
                    let context = Arc::clone(&daemon.context);
                    tokio::spawn(async move {
                        let _ = server::handle_connection(&context, stream).await;
                    });
                }
                _ = daemon.shutdown_requested.cancelled() => break,
            }
        }
        daemon.shutdown().await.unwrap();
    })
}

async fn call(socket: &Path, request: &Request) -> Response {
    let stream = UnixStream::connect(socket).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    let bytes = protocol::encode(request).unwrap();
    protocol::write_message(&mut writer, &bytes).await.unwrap();
    let reply = protocol::read_message(&mut reader).await.unwrap();
    protocol::decode(&reply).unwrap()
}

fn draft(kind: &str, video: &str, user: &str) -> EventDraft {
    EventDraft {
        timestamp: Utc::now().to_rfc3339(),
        kind: kind.to_string(),
        video_id: video.to_string(),
        user_id: user.to_string(),
        ..EventDraft::default()
    }
}

#[tokio::test]
async fn events_sent_over_the_socket_reach_analytics() {
    let root = Root::new();
    let config = Config::for_data_dir(root.dir.path());
    std::fs::write(&config.config_path, "flush_interval = \"20ms\"\n").unwrap();
    let daemon = serve(&config).await;

    for user in ["a", "b"] {
        let reply = call(
            &config.socket_path,
            &Request::Ingest {
                event: draft("View", "v1", user),
            },
        )
        .await;
        assert_eq!(reply, Response::Accepted);
    }

    let mut total_views = 0;
    for _ in 0..300 {
        if let Response::Analytics { report } =
            call(&config.socket_path, &Request::Analytics { days: 1 }).await
        {
            total_views = report.total_views;
        }
        if total_views == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(total_views, 2);

    assert_eq!(
        call(&config.socket_path, &Request::Shutdown).await,
        Response::ShuttingDown
    );
    daemon.await.unwrap();
    assert!(!config.socket_path.exists());
}

#[tokio::test]
async fn invalid_events_are_rejected_at_the_boundary() {
    let root = Root::new();
    let config = Config::for_data_dir(root.dir.path());
    let daemon = serve(&config).await;

    let mut bad = draft("view", "v1", "u1");
    bad.timestamp = "last tuesday".to_string();
    let reply = call(&config.socket_path, &Request::Ingest { event: bad }).await;

    assert!(matches!(reply, Response::Invalid { .. }));
    let wal = root.store().wal_len().unwrap();
    assert_eq!(wal, 0);

    call(&config.socket_path, &Request::Shutdown).await;
    daemon.await.unwrap();
}

#[tokio::test]
async fn health_ready_and_status_answer() {
    let root = Root::new();
    let config = Config::for_data_dir(root.dir.path());
    let daemon = serve(&config).await;

    assert!(matches!(
        call(&config.socket_path, &Request::Health).await,
        Response::Health { .. }
    ));
    assert!(matches!(
        call(&config.socket_path, &Request::Ready).await,
        Response::Ready { .. }
    ));
    match call(&config.socket_path, &Request::Status).await {
        Response::Status {
            wal_bytes, cursor, ..
        } => {
            assert_eq!(wal_bytes, 0);
            assert_eq!(cursor, 0);
        }
        other => panic!("unexpected response: {:?}", other),
    }

    call(&config.socket_path, &Request::Shutdown).await;
    daemon.await.unwrap();
}
