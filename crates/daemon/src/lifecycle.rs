// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use tally_core::{ConfigError, PipelineConfig, SystemClock};
use tally_engine::{EngineError, Pipeline, RunningPipeline};
use tally_storage::Store;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::server::ServerContext;

/// Default storage root when `TALLY_DATA_DIR` is unset
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default time allowed for pipeline tasks to stop
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Storage root; also holds the daemon's own files
    pub data_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Optional pipeline tunables
    pub config_path: PathBuf,
    pub shutdown_grace: Duration,
}

impl Config {
    /// Default layout for a storage root
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            socket_path: data_dir.join("tallyd.sock"),
            lock_path: data_dir.join("tallyd.pid"),
            log_path: data_dir.join("logs").join("tallyd.log"),
            config_path: data_dir.join("tally.toml"),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Resolve from `TALLY_DATA_DIR`, `TALLY_SOCKET`, and `TALLY_SHUTDOWN_GRACE_MS`
    pub fn from_env() -> Result<Self, LifecycleError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, LifecycleError> {
        let data_dir = var("TALLY_DATA_DIR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let mut config = Self::for_data_dir(Path::new(&data_dir));

        if let Some(socket) = var("TALLY_SOCKET").filter(|v| !v.is_empty()) {
            config.socket_path = PathBuf::from(socket);
        }
        if let Some(grace) = var("TALLY_SHUTDOWN_GRACE_MS") {
            let millis = grace
                .trim()
                .parse::<u64>()
                .map_err(|_| LifecycleError::InvalidEnv {
                    var: "TALLY_SHUTDOWN_GRACE_MS",
                    value: grace.clone(),
                })?;
            config.shutdown_grace = Duration::from_millis(millis);
        }
        Ok(config)
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    pub pipeline: RunningPipeline<SystemClock>,
    /// Shared with every connection task
    pub context: Arc<ServerContext<SystemClock>>,
    /// Cancelled when a client asks the daemon to stop
    pub shutdown_requested: CancellationToken,
}

impl DaemonState {
    /// Stop the pipeline, then remove the socket and PID file
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        let result = self.pipeline.shutdown(self.config.shutdown_grace).await;

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // Lock is released when self.lock_file is dropped
        result?;
        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // Another daemon owns these files
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create the storage root
    std::fs::create_dir_all(&config.data_dir)?;

    // 2. Acquire lock file FIRST - prevents two daemons sharing a root
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Load tunables before touching storage (fail fast)
    let pipeline_config = PipelineConfig::load_or_default(&config.config_path)?;
    info!(
        batch_size = pipeline_config.batch_size,
        flush_interval = ?pipeline_config.flush_interval,
        snapshot_interval = ?pipeline_config.snapshot_interval,
        window_days = pipeline_config.window_days,
        "Loaded pipeline config"
    );

    // 4. Recover and start the pipeline
    let store = Store::new(&config.data_dir);
    let pipeline =
        Pipeline::new(store, pipeline_config, SystemClock).start(CancellationToken::new())?;
    let recovery = pipeline.recovery();
    info!(
        replayed = recovery.replayed,
        skipped = recovery.skipped,
        cursor = recovery.end,
        "Recovered WAL"
    );

    // 5. Remove stale socket and bind (LAST - only after all validation passes)
    let listener = match bind_socket(&config.socket_path) {
        Ok(listener) => listener,
        Err(e) => {
            pipeline.cancel_token().cancel();
            return Err(e);
        }
    };

    let shutdown_requested = CancellationToken::new();
    let context = Arc::new(ServerContext::new(&pipeline, shutdown_requested.clone()));

    info!("Daemon started for storage root: {}", config.data_dir.display());

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        pipeline,
        context,
        shutdown_requested,
    })
}

fn bind_socket(path: &Path) -> Result<UnixListener, LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    UnixListener::bind(path).map_err(|e| LifecycleError::BindFailed(path.to_path_buf(), e))
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
