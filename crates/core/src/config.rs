// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline tunables
//!
//! All knobs live in one structure handed to the pipeline constructor so
//! tests can run the full pipeline with tiny batches and short intervals.
//! The daemon loads it from an optional `tally.toml`:
//!
//! ```toml
//! batch_size = 500
//! flush_interval = "2s"
//! snapshot_interval = "1m"
//! window_days = 7
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the ingestion and aggregation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Buffered events that force an immediate flush
    pub batch_size: usize,
    /// Capacity of the ingest queue in front of the WAL writer
    pub ingest_capacity: usize,
    /// Capacity of the queue between the WAL writer and the processor
    pub process_capacity: usize,
    /// Period of the flush timer for partially filled batches
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Period between rolling snapshot rebuild requests
    #[serde(with = "humantime_serde")]
    pub snapshot_interval: Duration,
    /// Length of the rolling window in days
    pub window_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            ingest_capacity: 4096,
            process_capacity: 4096,
            flush_interval: Duration::from_secs(10),
            snapshot_interval: Duration::from_secs(5 * 60),
            window_days: 30,
        }
    }
}

impl PipelineConfig {
    /// Parse from TOML text; absent keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Reject values that would stall or disable the pipeline
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.batch_size == 0, "batch_size must be positive"),
            (self.ingest_capacity == 0, "ingest_capacity must be positive"),
            (self.process_capacity == 0, "process_capacity must be positive"),
            (self.flush_interval.is_zero(), "flush_interval must be positive"),
            (self.snapshot_interval.is_zero(), "snapshot_interval must be positive"),
            (self.window_days == 0, "window_days must be positive"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(ConfigError::Invalid((*message).to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
