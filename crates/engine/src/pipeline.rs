// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline wiring: recovery, task startup, and shutdown
//!
//! ```text
//! IngestHandle → [ingest queue] → WAL writer → [process queue] → processor
//!                                                                    ↓
//! QueryReader ← snapshot / segments ← snapshot worker ← scheduler   segments
//! ```

use crate::error::EngineError;
use crate::ingest::{ingest_channel, IngestHandle};
use crate::processor::{run_processor, BatchProcessor};
use crate::query::QueryReader;
use crate::recovery::{recover, RecoveryReport};
use crate::snapshot::{
    run_snapshot_scheduler, run_snapshot_worker, snapshot_channel, RollingSnapshot,
    SnapshotHandle,
};
use crate::strategy::StrategyRegistry;
use crate::wal_writer::run_wal_writer;
use std::sync::Arc;
use std::time::Duration;
use tally_core::{Clock, PipelineConfig};
use tally_storage::Store;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A configured, not yet started pipeline
pub struct Pipeline<C: Clock> {
    store: Store,
    config: PipelineConfig,
    clock: C,
    strategies: StrategyRegistry,
}

impl<C: Clock> Pipeline<C> {
    pub fn new(store: Store, config: PipelineConfig, clock: C) -> Self {
        Self {
            store,
            config,
            clock,
            strategies: StrategyRegistry::default(),
        }
    }

    /// Replace the default strategy set
    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    /// Recover the WAL tail and spawn every pipeline task
    ///
    /// Must be called from within a Tokio runtime. Recovery completes before
    /// any task is spawned, so no live event can interleave with replay.
    pub fn start(self, cancel: CancellationToken) -> Result<RunningPipeline<C>, EngineError> {
        let Self {
            store,
            config,
            clock,
            strategies,
        } = self;
        config.validate()?;
        store.ensure_layout()?;

        let strategies = Arc::new(strategies);
        let event_support = strategies.event_types();
        let mut processor = BatchProcessor::new(store.clone(), Arc::clone(&strategies))?;
        let recovery = recover(&store, &mut processor, config.batch_size)?;
        let writer = store.open_wal_writer()?;

        let (ingest, ingest_rx) = ingest_channel(config.ingest_capacity);
        let (process_tx, process_rx) = mpsc::channel(config.process_capacity);
        let (snapshots, snapshot_rx) = snapshot_channel();
        let rebuild = Arc::new(RollingSnapshot::new(
            store.clone(),
            config.window_days,
            clock.clone(),
        ));

        let tasks = vec![
            (
                "wal-writer",
                tokio::spawn(run_wal_writer(
                    writer,
                    ingest_rx,
                    process_tx,
                    cancel.clone(),
                )),
            ),
            (
                "processor",
                tokio::spawn(run_processor(
                    processor,
                    process_rx,
                    config.batch_size,
                    config.flush_interval,
                    cancel.clone(),
                )),
            ),
            (
                "snapshot-worker",
                tokio::spawn(run_snapshot_worker(
                    rebuild,
                    snapshots.running_flag(),
                    snapshot_rx,
                    cancel.clone(),
                )),
            ),
            (
                "snapshot-scheduler",
                tokio::spawn(run_snapshot_scheduler(
                    snapshots.clone(),
                    config.snapshot_interval,
                    cancel.clone(),
                )),
            ),
        ];

        info!(
            root = %store.paths().root.display(),
            cursor = recovery.end,
            batch_size = config.batch_size,
            window_days = config.window_days,
            "pipeline started"
        );

        Ok(RunningPipeline {
            reader: QueryReader::new(store.clone(), config.window_days, event_support, clock),
            store,
            ingest,
            snapshots,
            recovery,
            cancel,
            tasks,
        })
    }
}

/// Handles onto a started pipeline
pub struct RunningPipeline<C: Clock> {
    store: Store,
    ingest: IngestHandle,
    snapshots: SnapshotHandle,
    reader: QueryReader<C>,
    recovery: RecoveryReport,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl<C: Clock> RunningPipeline<C> {
    pub fn ingest(&self) -> &IngestHandle {
        &self.ingest
    }

    pub fn snapshots(&self) -> &SnapshotHandle {
        &self.snapshots
    }

    pub fn reader(&self) -> &QueryReader<C> {
        &self.reader
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// What startup recovery replayed
    pub fn recovery(&self) -> RecoveryReport {
        self.recovery
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel every task and wait up to `grace` for them to stop
    ///
    /// Tasks still running at the deadline are aborted and named in the
    /// returned error. Queued and buffered events are not drained; whatever
    /// reached the WAL is replayed on the next start.
    pub async fn shutdown(self, grace: Duration) -> Result<(), EngineError> {
        self.cancel.cancel();
        let deadline = tokio::time::Instant::now() + grace;

        let mut stuck = Vec::new();
        let mut failed = None;
        for (task, mut handle) in self.tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(task, error = %e, "pipeline task failed");
                    failed.get_or_insert(EngineError::TaskFailed {
                        task,
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(task, "pipeline task did not stop in time, aborting");
                    handle.abort();
                    stuck.push(task);
                }
            }
        }

        if !stuck.is_empty() {
            return Err(EngineError::ShutdownTimeout(stuck));
        }
        match failed {
            Some(e) => Err(e),
            None => {
                info!("pipeline stopped");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
