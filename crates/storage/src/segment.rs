// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Day-partitioned aggregate segments
//!
//! Each UTC day owns two append-only files:
//! - `views/<day>.seg`: `video_id,count` lines, summed on read
//! - `dau/<day>.seg`: hashed user ids, counted distinct on read
//!
//! Files are never rewritten. A video id may repeat across flushes and the
//! same user hash may repeat across batches; readers fold both.

use crate::error::StorageError;
use crate::paths::StoragePaths;
use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Per-video view totals
pub type ViewCounts = BTreeMap<String, u64>;

/// Append-only store of per-day view and DAU segments
#[derive(Debug, Clone)]
pub struct SegmentStore {
    paths: StoragePaths,
}

impl SegmentStore {
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Append one batch's aggregates for `day`
    ///
    /// Both files are fsync'd before returning. Empty inputs leave the
    /// corresponding file untouched.
    pub fn append_aggregates(
        &self,
        day: NaiveDate,
        view_deltas: &BTreeMap<String, u64>,
        user_hashes: &BTreeSet<String>,
    ) -> Result<(), StorageError> {
        if !view_deltas.is_empty() {
            append_lines(
                &self.paths.view_segment(day),
                view_deltas
                    .iter()
                    .map(|(video_id, count)| format!("{},{}", video_id, count)),
            )?;
        }
        if !user_hashes.is_empty() {
            append_lines(&self.paths.dau_segment(day), user_hashes.iter().cloned())?;
        }
        Ok(())
    }

    /// Sum view counts over `[as_of - window_days + 1, as_of]`
    ///
    /// Days without a segment contribute nothing.
    pub fn merge_views(
        &self,
        as_of: NaiveDate,
        window_days: u32,
    ) -> Result<ViewCounts, StorageError> {
        let mut merged = ViewCounts::new();
        for day in window(as_of, window_days) {
            merge_view_segment(&self.paths.view_segment(day), &mut merged)?;
        }
        Ok(merged)
    }

    /// Distinct users on one day
    pub fn daily_active_users(&self, day: NaiveDate) -> Result<u64, StorageError> {
        let path = self.paths.dau_segment(day);
        let Some(reader) = open_segment(&path)? else {
            return Ok(0);
        };

        let mut distinct = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            let hash = line.trim();
            if !hash.is_empty() {
                distinct.insert(hash.to_string());
            }
        }
        Ok(distinct.len() as u64)
    }

    /// Sum of per-day distinct users over the window
    ///
    /// Each day is deduplicated independently, so a user active on three days
    /// counts three times.
    pub fn count_distinct_users(
        &self,
        as_of: NaiveDate,
        window_days: u32,
    ) -> Result<u64, StorageError> {
        let mut total = 0;
        for day in window(as_of, window_days) {
            total += self.daily_active_users(day)?;
        }
        Ok(total)
    }
}

/// Days in `[as_of - window_days + 1, as_of]`, newest first
fn window(as_of: NaiveDate, window_days: u32) -> impl Iterator<Item = NaiveDate> {
    (0..u64::from(window_days)).map_while(move |back| as_of.checked_sub_days(Days::new(back)))
}

fn append_lines(path: &Path, lines: impl Iterator<Item = String>) -> Result<(), StorageError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_data()?;
    Ok(())
}

fn open_segment(path: &Path) -> Result<Option<BufReader<File>>, StorageError> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn merge_view_segment(path: &Path, merged: &mut ViewCounts) -> Result<(), StorageError> {
    let Some(reader) = open_segment(path)? else {
        return Ok(());
    };

    for line in reader.lines() {
        let line = line?;
        match parse_view_line(&line) {
            Some((video_id, count)) => *merged.entry(video_id.to_string()).or_default() += count,
            None if line.trim().is_empty() => {}
            None => debug!(path = %path.display(), line = %line, "skipping malformed view line"),
        }
    }
    Ok(())
}

fn parse_view_line(line: &str) -> Option<(&str, u64)> {
    let (video_id, count) = line.trim().rsplit_once(',')?;
    if video_id.is_empty() {
        return None;
    }
    Some((video_id, count.parse().ok()?))
}

#[cfg(test)]
#[path = "segment_tests.rs"]
mod tests;
