// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::fmt;

use serde::Serialize;
use tally_engine::AnalyticsReport;

use crate::client::DaemonStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Text rendering of an analytics report
#[derive(Serialize)]
#[serde(transparent)]
pub struct ReportView<'a>(pub &'a AnalyticsReport);

impl fmt::Display for ReportView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "Window:      last {} day(s)", report.days)?;
        writeln!(f, "Total views: {}", report.total_views)?;
        writeln!(f, "Total users: {}", report.total_users)?;
        writeln!(f, "Event types: {}", report.event_support.join(", "))?;
        if report.top_50_videos.is_empty() {
            write!(f, "No views")
        } else {
            writeln!(f)?;
            write!(f, "{:<5} {:<32} VIEWS", "RANK", "VIDEO")?;
            for (rank, video) in report.top_50_videos.iter().enumerate() {
                write!(f, "\n{:<5} {:<32} {}", rank + 1, video.video_id, video.views)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Uptime:   {}s", self.uptime_secs)?;
        writeln!(f, "WAL:      {} bytes", self.wal_bytes)?;
        writeln!(f, "Cursor:   {} ({} bytes behind)", self.cursor, self.lag_bytes())?;
        write!(
            f,
            "Snapshot: {}",
            if self.snapshot_running { "rebuilding" } else { "idle" }
        )
    }
}
