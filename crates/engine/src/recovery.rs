// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup replay of the WAL tail
//!
//! Everything past the cursor was durably logged but never folded into the
//! segments. Recovery pushes it through the same [`BatchProcessor`] the live
//! path uses, in bounded chunks, before any new traffic is accepted.

use crate::error::EngineError;
use crate::processor::BatchProcessor;
use tally_storage::{Store, WalReadError, WalRecord};
use tracing::{info, warn};

/// What a recovery pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Cursor before replay
    pub start: u64,
    /// Cursor after replay
    pub end: u64,
    /// Records replayed
    pub replayed: usize,
    /// Malformed lines skipped
    pub skipped: usize,
    /// Chunks flushed
    pub batches: usize,
}

/// Replay the WAL from the durable cursor to end-of-file
///
/// Malformed lines are skipped. Any other read error, a cursor past the end
/// of the WAL, or a failed aggregate write aborts recovery.
pub fn recover(
    store: &Store,
    processor: &mut BatchProcessor,
    batch_size: usize,
) -> Result<RecoveryReport, EngineError> {
    let start = store.read_offset()?;
    let mut tail = store.wal_tail(start)?;
    let mut report = RecoveryReport {
        start,
        end: start,
        ..RecoveryReport::default()
    };

    let mut chunk = Vec::with_capacity(batch_size);
    for item in tail.by_ref() {
        match item {
            Ok(record) => {
                chunk.push(record);
                if chunk.len() >= batch_size {
                    replay_chunk(processor, &mut chunk, None, &mut report)?;
                }
            }
            Err(WalReadError::Malformed { offset, reason }) => {
                warn!(offset, %reason, "skipping malformed WAL record");
                report.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Covers the last partial chunk and any trailing malformed bytes
    let wal_end = tail.position();
    if !chunk.is_empty() || wal_end > processor.cursor() {
        replay_chunk(processor, &mut chunk, Some(wal_end), &mut report)?;
    }

    report.end = processor.cursor();
    if report.replayed > 0 || report.skipped > 0 {
        info!(
            start = report.start,
            end = report.end,
            replayed = report.replayed,
            skipped = report.skipped,
            batches = report.batches,
            "recovered WAL tail"
        );
    }
    Ok(report)
}

fn replay_chunk(
    processor: &mut BatchProcessor,
    chunk: &mut Vec<WalRecord>,
    wal_end: Option<u64>,
    report: &mut RecoveryReport,
) -> Result<(), EngineError> {
    let end = wal_end
        .or_else(|| chunk.last().map(|r| r.end))
        .unwrap_or(processor.cursor());
    processor.process_batch(chunk, end)?;
    report.replayed += chunk.len();
    if !chunk.is_empty() {
        report.batches += 1;
    }
    chunk.clear();
    Ok(())
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
