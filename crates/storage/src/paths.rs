// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout under the storage root
//!
//! ```text
//! <root>/wal/events.wal
//! <root>/meta/wal.offset
//! <root>/segments/views/<YYYY-MM-DD>.seg
//! <root>/segments/dau/<YYYY-MM-DD>.seg
//! <root>/snapshots/views.rolling<N>.snapshot
//! ```

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Resolved paths for every file the store owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub root: PathBuf,
    pub wal: PathBuf,
    pub offset: PathBuf,
    pub views_dir: PathBuf,
    pub dau_dir: PathBuf,
    pub snapshots_dir: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            wal: root.join("wal").join("events.wal"),
            offset: root.join("meta").join("wal.offset"),
            views_dir: root.join("segments").join("views"),
            dau_dir: root.join("segments").join("dau"),
            snapshots_dir: root.join("snapshots"),
            root,
        }
    }

    /// Directories that must exist before the pipeline starts
    pub fn directories(&self) -> Vec<&Path> {
        let mut dirs = Vec::with_capacity(5);
        if let Some(parent) = self.wal.parent() {
            dirs.push(parent);
        }
        if let Some(parent) = self.offset.parent() {
            dirs.push(parent);
        }
        dirs.push(&self.views_dir);
        dirs.push(&self.dau_dir);
        dirs.push(&self.snapshots_dir);
        dirs
    }

    pub fn view_segment(&self, day: NaiveDate) -> PathBuf {
        self.views_dir.join(segment_file_name(day))
    }

    pub fn dau_segment(&self, day: NaiveDate) -> PathBuf {
        self.dau_dir.join(segment_file_name(day))
    }

    pub fn snapshot(&self, window_days: u32) -> PathBuf {
        self.snapshots_dir
            .join(format!("views.rolling{}.snapshot", window_days))
    }
}

fn segment_file_name(day: NaiveDate) -> String {
    format!("{}.seg", day.format("%Y-%m-%d"))
}
