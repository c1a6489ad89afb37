// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage for the tally pipeline
//!
//! Owns every file under the storage root: the event WAL, the offset cursor,
//! the day-partitioned view and DAU segments, and the rolling snapshot.
//!
//! ## Durability Guarantees
//!
//! - WAL appends and segment appends are fsync'd before returning
//! - The cursor and snapshot are replaced via temp file, fsync, and rename
//! - Nothing is rewritten in place during normal operation

mod atomic;
mod error;
pub mod offset;
mod paths;
pub mod segment;
pub mod snapshot;
mod store;
pub mod wal;

pub use error::StorageError;
pub use paths::StoragePaths;
pub use segment::{SegmentStore, ViewCounts};
pub use store::Store;
pub use wal::{WalReadError, WalRecord, WalTail, WalWriter};
