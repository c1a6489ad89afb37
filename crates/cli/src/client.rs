// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tally_core::EventDraft;
use tally_daemon::protocol::{self, ProtocolError};
use tally_daemon::{Request, Response};
use tally_engine::AnalyticsReport;
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("TALLY_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running (no socket at {})", .0.display())]
    DaemonNotRunning(PathBuf),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Daemon overloaded, retry later: {0}")]
    Overloaded(String),

    #[error("Daemon error: {0}")]
    Daemon(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon status as reported over the socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub wal_bytes: u64,
    pub cursor: u64,
    pub snapshot_running: bool,
}

impl DaemonStatus {
    /// WAL bytes not yet folded into aggregates
    pub fn lag_bytes(&self) -> u64 {
        self.wal_bytes.saturating_sub(self.cursor)
    }
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to a running daemon
    pub fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(socket_path.to_path_buf()));
        }
        Ok(Self {
            socket_path: socket_path.to_path_buf(),
        })
    }

    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(&request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        let response: Response = protocol::decode(&response_bytes)?;
        debug!("Received response: {:?}", response);
        Ok(response)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    /// Submit one event
    pub async fn emit(&self, event: EventDraft) -> Result<(), ClientError> {
        match self.send(Request::Ingest { event }).await? {
            Response::Accepted => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn analytics(&self, days: i64) -> Result<AnalyticsReport, ClientError> {
        match self.send(Request::Analytics { days }).await? {
            Response::Analytics { report } => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                wal_bytes,
                cursor,
                snapshot_running,
            } => Ok(DaemonStatus {
                uptime_secs,
                wal_bytes,
                cursor,
                snapshot_running,
            }),
            other => Err(unexpected(other)),
        }
    }

    /// Round-trip time of a ping
    pub async fn ping(&self) -> Result<Duration, ClientError> {
        let start = Instant::now();
        match self.send(Request::Ping).await? {
            Response::Pong => Ok(start.elapsed()),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Request a snapshot rebuild; false if one was already pending
    pub async fn rebuild(&self) -> Result<bool, ClientError> {
        match self.send(Request::RebuildSnapshot).await? {
            Response::SnapshotRequested { queued } => Ok(queued),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

/// Map a response the caller did not ask for onto an error
fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Invalid { message } => ClientError::Rejected(message),
        Response::Overloaded { message } => ClientError::Overloaded(message),
        Response::Error { message } => ClientError::Daemon(message),
        _ => ClientError::UnexpectedResponse,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
