// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the pipeline engine

use tally_core::ConfigError;
use tally_storage::{StorageError, WalReadError};
use thiserror::Error;

/// Errors that stop the pipeline from starting or shutting down cleanly
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("WAL read error: {0}")]
    WalRead(#[from] WalReadError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("task {task} failed: {message}")]
    TaskFailed { task: &'static str, message: String },
    #[error("tasks did not stop within the grace period: {}", .0.join(", "))]
    ShutdownTimeout(Vec<&'static str>),
}

/// Errors surfaced to callers of the query reader
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("days must be a positive day count, got {days}")]
    InvalidDays { days: i64 },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Reasons an event could not be handed to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("ingest queue is full")]
    QueueFull,
    #[error("pipeline is shutting down")]
    Closed,
}
