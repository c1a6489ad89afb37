// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tally daemon library: lifecycle, socket server, and wire protocol
//!
//! The protocol module is shared with the `tally` CLI.

pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use protocol::{Request, Response, PROTOCOL_VERSION};
