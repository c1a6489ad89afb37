// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL writer task
//!
//! The only writer of `events.wal`. Each event is durable before it is
//! forwarded to the processor along with its end position.

use tally_core::Event;
use tally_storage::{WalRecord, WalWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

pub(crate) async fn run_wal_writer(
    mut writer: WalWriter,
    mut rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<WalRecord>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(event) => event,
                None => break,
            },
        };

        // Dedicated task: the append's fsync blocks this worker thread
        let end = match writer.append(&event) {
            Ok(end) => end,
            Err(e) => {
                error!(
                    video_id = %event.video_id,
                    kind = %event.kind,
                    error = %e,
                    "WAL append failed, dropping event"
                );
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tx.send(WalRecord { event, end }) => {
                if sent.is_err() {
                    warn!(end, "processor is gone, stopping WAL writer");
                    break;
                }
            }
        }
    }
}
