// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store facade over every file under the storage root

use crate::error::StorageError;
use crate::offset;
use crate::paths::StoragePaths;
use crate::segment::{SegmentStore, ViewCounts};
use crate::snapshot;
use crate::wal::{self, WalReadError, WalTail, WalWriter};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

/// Owner of the WAL, offset cursor, segments, and snapshot
///
/// Cloning is cheap and every clone addresses the same files. Writers are
/// kept single per file by the pipeline, not by the store.
#[derive(Debug, Clone)]
pub struct Store {
    paths: StoragePaths,
    segments: SegmentStore,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let paths = StoragePaths::new(root);
        Self {
            segments: SegmentStore::new(paths.clone()),
            paths,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn segments(&self) -> &SegmentStore {
        &self.segments
    }

    /// Create the directory tree and a zero cursor on first start
    pub fn ensure_layout(&self) -> Result<(), StorageError> {
        for dir in self.paths.directories() {
            std::fs::create_dir_all(dir)?;
        }
        if !self.paths.offset.exists() {
            info!(root = %self.paths.root.display(), "initializing empty storage root");
            offset::write_offset(&self.paths.offset, 0)?;
        }
        Ok(())
    }

    pub fn open_wal_writer(&self) -> Result<WalWriter, StorageError> {
        WalWriter::open(&self.paths.wal)
    }

    pub fn wal_tail(&self, offset: u64) -> Result<WalTail, WalReadError> {
        WalTail::open(&self.paths.wal, offset)
    }

    pub fn wal_len(&self) -> Result<u64, StorageError> {
        wal::wal_len(&self.paths.wal)
    }

    pub fn read_offset(&self) -> Result<u64, StorageError> {
        offset::read_offset(&self.paths.offset)
    }

    pub fn write_offset(&self, value: u64) -> Result<(), StorageError> {
        offset::write_offset(&self.paths.offset, value)
    }

    pub fn merge_views(
        &self,
        as_of: NaiveDate,
        window_days: u32,
    ) -> Result<ViewCounts, StorageError> {
        self.segments.merge_views(as_of, window_days)
    }

    pub fn count_distinct_users(
        &self,
        as_of: NaiveDate,
        window_days: u32,
    ) -> Result<u64, StorageError> {
        self.segments.count_distinct_users(as_of, window_days)
    }

    /// Merge the window ending at `as_of` and atomically replace its snapshot
    ///
    /// Returns the number of videos in the snapshot.
    pub fn build_rolling_snapshot(
        &self,
        as_of: NaiveDate,
        window_days: u32,
    ) -> Result<usize, StorageError> {
        let views = self.segments.merge_views(as_of, window_days)?;
        snapshot::write_snapshot(&self.paths.snapshot(window_days), &views)?;
        Ok(views.len())
    }

    pub fn read_snapshot(&self, window_days: u32) -> Result<ViewCounts, StorageError> {
        snapshot::read_snapshot(&self.paths.snapshot(window_days))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
