// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tally analytics` - View counts and top videos

use clap::Args;

#[derive(Args)]
pub struct AnalyticsArgs {
    /// Window length in days, ending today (UTC)
    #[arg(long, default_value_t = 30, allow_negative_numbers = true)]
    pub days: i64,

    /// Print the raw report as JSON
    #[arg(long)]
    pub json: bool,
}
