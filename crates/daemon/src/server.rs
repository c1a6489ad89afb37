// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::time::Instant;

use tally_core::Clock;
use tally_engine::{
    IngestError, IngestHandle, QueryError, QueryReader, RunningPipeline, SnapshotHandle,
};
use tally_storage::Store;
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Everything a connection needs, cloned out of the running pipeline
pub struct ServerContext<C: Clock> {
    ingest: IngestHandle,
    reader: QueryReader<C>,
    snapshots: SnapshotHandle,
    store: Store,
    start_time: Instant,
    shutdown_requested: CancellationToken,
}

impl<C: Clock> ServerContext<C> {
    pub fn new(pipeline: &RunningPipeline<C>, shutdown_requested: CancellationToken) -> Self {
        Self {
            ingest: pipeline.ingest().clone(),
            reader: pipeline.reader().clone(),
            snapshots: pipeline.snapshots().clone(),
            store: pipeline.store().clone(),
            start_time: Instant::now(),
            shutdown_requested,
        }
    }
}

/// Handle a single client connection
pub async fn handle_connection<C: Clock>(
    context: &ServerContext<C>,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(protocol::ProtocolError::Json(e)) => {
            // Framing was fine, so the client can still hear why
            warn!("Malformed request: {}", e);
            let response = Response::Invalid {
                message: format!("malformed request: {}", e),
            };
            protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    let response = handle_request(context, request).await;

    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
pub async fn handle_request<C: Clock>(context: &ServerContext<C>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Health => Response::Health {
            status: "ok".to_string(),
        },

        Request::Ready => Response::Ready {
            status: "ready".to_string(),
        },

        Request::Ingest { event } => {
            let event = match event.validate() {
                Ok(event) => event,
                Err(e) => {
                    return Response::Invalid {
                        message: e.to_string(),
                    }
                }
            };
            match context.ingest.try_ingest(event) {
                Ok(()) => Response::Accepted,
                Err(e @ IngestError::QueueFull) => {
                    warn!("Rejecting event: {}", e);
                    Response::Overloaded {
                        message: e.to_string(),
                    }
                }
                Err(e @ IngestError::Closed) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::Analytics { days } => handle_analytics(context, days).await,

        Request::Status => {
            let uptime_secs = context.start_time.elapsed().as_secs();
            let position = context
                .store
                .wal_len()
                .and_then(|wal| Ok((wal, context.store.read_offset()?)));
            match position {
                Ok((wal_bytes, cursor)) => Response::Status {
                    uptime_secs,
                    wal_bytes,
                    cursor,
                    snapshot_running: context.snapshots.is_running(),
                },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::RebuildSnapshot => Response::SnapshotRequested {
            queued: context.snapshots.request(),
        },

        Request::Shutdown => {
            context.shutdown_requested.cancel();
            Response::ShuttingDown
        }
    }
}

/// Segment merges read many files, so they run off the async workers
async fn handle_analytics<C: Clock>(context: &ServerContext<C>, days: i64) -> Response {
    let reader = context.reader.clone();
    match tokio::task::spawn_blocking(move || reader.read_analytics(days)).await {
        Ok(Ok(report)) => Response::Analytics { report },
        Ok(Err(e @ QueryError::InvalidDays { .. })) => Response::Invalid {
            message: e.to_string(),
        },
        Ok(Err(e)) => {
            error!("Analytics query failed: {}", e);
            Response::Error {
                message: e.to_string(),
            }
        }
        Err(e) => Response::Error {
            message: format!("analytics task failed: {}", e),
        },
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
