// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only analytics over segments and the rolling snapshot

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use tally_core::Clock;
use tally_storage::{Store, ViewCounts};
use tracing::debug;

/// Number of videos in a report's ranking
pub const TOP_VIDEOS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCount {
    pub video_id: String,
    pub views: u64,
}

/// Which path served the view counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSource {
    Snapshot,
    Segments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub days: u32,
    /// Views across every video, not just the ranked ones
    pub total_views: u64,
    pub total_users: u64,
    pub top_50_videos: Vec<VideoCount>,
    pub event_support: Vec<String>,
    pub source: ViewSource,
}

/// Views descending, ties broken by video id ascending, truncated to `limit`
pub fn rank_videos(views: &ViewCounts, limit: usize) -> Vec<VideoCount> {
    let mut ranked: Vec<_> = views.iter().collect();
    ranked.sort_by(|(a_id, a_views), (b_id, b_views)| {
        b_views.cmp(a_views).then_with(|| a_id.cmp(b_id))
    });
    ranked
        .into_iter()
        .take(limit)
        .map(|(video_id, views)| VideoCount {
            video_id: video_id.clone(),
            views: *views,
        })
        .collect()
}

/// Serves analytics reports; never writes
#[derive(Clone)]
pub struct QueryReader<C: Clock> {
    store: Store,
    window_days: u32,
    event_support: Vec<String>,
    clock: C,
}

impl<C: Clock> QueryReader<C> {
    pub fn new(store: Store, window_days: u32, event_support: Vec<String>, clock: C) -> Self {
        Self {
            store,
            window_days,
            event_support,
            clock,
        }
    }

    /// Report for the `days` ending today (UTC)
    ///
    /// The rolling snapshot answers when `days` equals its window and it can
    /// be read; otherwise the segments are merged on demand. Windows reaching
    /// past the calendar start stop there.
    pub fn read_analytics(&self, days: i64) -> Result<AnalyticsReport, QueryError> {
        let days = match u32::try_from(days) {
            Ok(days) if days > 0 => days,
            _ => return Err(QueryError::InvalidDays { days }),
        };
        let today = self.clock.today();

        let (views, source) = self.views_for(today, days)?;
        let total_views = views.values().sum();
        let total_users = self.store.count_distinct_users(today, days)?;

        Ok(AnalyticsReport {
            days,
            total_views,
            total_users,
            top_50_videos: rank_videos(&views, TOP_VIDEOS),
            event_support: self.event_support.clone(),
            source,
        })
    }

    fn views_for(
        &self,
        today: chrono::NaiveDate,
        days: u32,
    ) -> Result<(ViewCounts, ViewSource), QueryError> {
        if days == self.window_days {
            match self.store.read_snapshot(days) {
                Ok(views) => return Ok((views, ViewSource::Snapshot)),
                Err(e) => debug!(error = %e, "snapshot unavailable, merging segments"),
            }
        }
        let views = self.store.merge_views(today, days)?;
        Ok((views, ViewSource::Segments))
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
