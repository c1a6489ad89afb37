// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tally-core: shared model for the tally analytics service
//!
//! This crate provides:
//! - The activity [`Event`] and its boundary validation
//! - UTC day keys and user-id pseudonymization
//! - A [`Clock`] abstraction for testable wall-clock time
//! - [`PipelineConfig`], the pipeline's tunables

pub mod clock;
pub mod config;
pub mod event;
pub mod hash;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, PipelineConfig};
pub use event::{Event, EventDraft, ValidationError, VIEW_EVENT};
pub use hash::hash_user_id;
