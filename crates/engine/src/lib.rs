// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tally-engine: the asynchronous ingest and aggregation pipeline
//!
//! Validated events flow through a bounded ingest queue into the WAL writer,
//! then to the batch processor, which folds them into day segments and
//! advances the offset cursor. A single-flight worker keeps the rolling
//! snapshot fresh for the query reader.

mod error;
mod ingest;
mod pipeline;
pub mod processor;
pub mod query;
pub mod recovery;
pub mod snapshot;
pub mod strategy;
mod wal_writer;

pub use error::{EngineError, IngestError, QueryError};
pub use ingest::IngestHandle;
pub use pipeline::{Pipeline, RunningPipeline};
pub use processor::{BatchProcessor, FlushSummary};
pub use query::{AnalyticsReport, QueryReader, VideoCount, ViewSource};
pub use recovery::{recover, RecoveryReport};
pub use snapshot::{Rebuild, RollingSnapshot, SnapshotHandle};
pub use strategy::{BatchState, EventStrategy, NoopStrategy, StrategyRegistry, ViewStrategy};
