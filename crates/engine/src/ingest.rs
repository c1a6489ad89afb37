// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded ingest queue in front of the WAL writer

use crate::error::IngestError;
use tally_core::Event;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Cloneable, non-blocking entry point into the pipeline
#[derive(Debug, Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<Event>,
}

impl IngestHandle {
    /// Enqueue a validated event without waiting
    pub fn try_ingest(&self, event: Event) -> Result<(), IngestError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => IngestError::QueueFull,
            TrySendError::Closed(_) => IngestError::Closed,
        })
    }

    /// Free slots in the queue right now
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub(crate) fn ingest_channel(capacity: usize) -> (IngestHandle, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (IngestHandle { tx }, rx)
}
