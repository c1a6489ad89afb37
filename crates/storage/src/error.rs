// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt offset file {path}: expected 0 or 8 bytes, found {len}")]
    CorruptOffset { path: PathBuf, len: usize },
    #[error("WAL {path} holds a partial record that could not be truncated; reopen to recover")]
    WalPoisoned { path: PathBuf },
}
