//! Shared helpers for specs

use std::time::Duration;

pub use chrono::{DateTime, NaiveDate, TimeZone, Utc};
pub use tally_core::{Event, FakeClock, PipelineConfig};
pub use tally_engine::{Pipeline, RunningPipeline};
pub use tally_storage::Store;
pub use tempfile::TempDir;
pub use tokio_util::sync::CancellationToken;

/// The wall-clock "now" every spec runs at
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 16, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    now().date_naive()
}

pub fn clock() -> FakeClock {
    FakeClock::at(now())
}

/// A view at `hour`:00 UTC today
pub fn view_at(hour: u32, video: &str, user: &str) -> Event {
    Event::view(
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap(),
        video,
        user,
    )
}

/// A storage root that lives as long as the value
pub struct Root {
    pub dir: TempDir,
}

impl Root {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn store(&self) -> Store {
        Store::new(self.dir.path())
    }

    /// Start a pipeline that flushes quickly
    pub fn start(&self) -> RunningPipeline<FakeClock> {
        self.start_with(PipelineConfig {
            flush_interval: Duration::from_millis(20),
            ..PipelineConfig::default()
        })
    }

    pub fn start_with(&self, config: PipelineConfig) -> RunningPipeline<FakeClock> {
        Pipeline::new(self.store(), config, clock())
            .start(CancellationToken::new())
            .unwrap()
    }
}

/// Poll `probe` until it yields a value or a few seconds pass
pub async fn eventually<T>(mut probe: impl FnMut() -> Option<T>) -> T {
    for _ in 0..300 {
        if let Some(value) = probe() {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

pub const GRACE: Duration = Duration::from_secs(5);
