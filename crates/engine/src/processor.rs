// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch processor
//!
//! Folds WAL records into per-day aggregates and advances the offset cursor
//! once every day of the batch is durably written.

use crate::error::EngineError;
use crate::strategy::{BatchState, StrategyRegistry};
use std::sync::Arc;
use std::time::Duration;
use tally_storage::{Store, WalRecord};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Outcome of one successful flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    /// Records in the batch
    pub events: usize,
    /// Records whose type has no strategy
    pub ignored: usize,
    /// Distinct days written
    pub days: usize,
    /// Durable cursor after the flush
    pub cursor: u64,
}

/// Applies batches of WAL records to the segment store
pub struct BatchProcessor {
    store: Store,
    strategies: Arc<StrategyRegistry>,
    cursor: u64,
    cursor_pinned: bool,
}

impl BatchProcessor {
    /// Create a processor positioned at the store's current cursor
    pub fn new(store: Store, strategies: Arc<StrategyRegistry>) -> Result<Self, EngineError> {
        let cursor = store.read_offset()?;
        Ok(Self {
            store,
            strategies,
            cursor,
            cursor_pinned: false,
        })
    }

    /// Durable cursor as last written by this processor
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// True once a flush has failed; the cursor no longer moves
    pub fn is_cursor_pinned(&self) -> bool {
        self.cursor_pinned
    }

    /// Fold `records` into aggregates, then advance the cursor to `wal_end`
    ///
    /// Days are written in ascending order and strategies in ascending type
    /// order. A failed day write leaves the cursor where it was and pins it
    /// for the lifetime of this processor, so the failed records are replayed
    /// on the next start.
    pub fn process_batch(
        &mut self,
        records: &[WalRecord],
        wal_end: u64,
    ) -> Result<FlushSummary, EngineError> {
        let mut state = BatchState::default();
        let mut ignored = 0;
        for record in records {
            if !self.strategies.accumulate(&record.event, &mut state) {
                ignored += 1;
            }
        }

        let days = state.days();
        for day in &days {
            if let Err(e) = self
                .strategies
                .flush_day(*day, &state, self.store.segments())
            {
                self.cursor_pinned = true;
                return Err(e.into());
            }
        }

        if self.cursor_pinned {
            warn!(
                cursor = self.cursor,
                wal_end, "cursor pinned by an earlier failed flush, not advancing"
            );
        } else if wal_end > self.cursor {
            self.store.write_offset(wal_end)?;
            self.cursor = wal_end;
        }

        Ok(FlushSummary {
            events: records.len(),
            ignored,
            days: days.len(),
            cursor: self.cursor,
        })
    }

    /// Flush and clear `buffer`, logging the outcome
    fn flush_buffer(&mut self, buffer: &mut Vec<WalRecord>) {
        let Some(wal_end) = buffer.last().map(|r| r.end) else {
            return;
        };
        match self.process_batch(buffer, wal_end) {
            Ok(summary) => debug!(
                events = summary.events,
                ignored = summary.ignored,
                days = summary.days,
                cursor = summary.cursor,
                "batch flushed"
            ),
            Err(e) => error!(
                events = buffer.len(),
                error = %e,
                "batch flush failed, events will be replayed on restart"
            ),
        }
        buffer.clear();
    }
}

/// Drain the process queue, flushing on size or on the timer
///
/// Flushes fsync segments and the cursor inline, blocking this task's
/// worker thread for their duration. Anything still buffered when cancelled
/// stays in the WAL for the next start to replay.
pub(crate) async fn run_processor(
    mut processor: BatchProcessor,
    mut rx: mpsc::Receiver<WalRecord>,
    batch_size: usize,
    flush_interval: Duration,
    cancel: CancellationToken,
) {
    let mut buffer = Vec::with_capacity(batch_size);
    let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(record) => {
                    buffer.push(record);
                    if buffer.len() >= batch_size {
                        processor.flush_buffer(&mut buffer);
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    processor.flush_buffer(&mut buffer);
                }
            }
        }
    }

    if !buffer.is_empty() {
        debug!(
            buffered = buffer.len(),
            "processor stopped with unflushed events, left for replay"
        );
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
