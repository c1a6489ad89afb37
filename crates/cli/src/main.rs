// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tally - video analytics CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analytics, emit};

use crate::client::DaemonClient;
use crate::output::{OutputFormat, ReportView};

#[derive(Parser)]
#[command(name = "tally", version, about = "tally - durable video view analytics")]
struct Cli {
    /// Storage root of the daemon
    #[arg(long, global = true, env = "TALLY_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Daemon socket; defaults to <data-dir>/tallyd.sock
    #[arg(long, global = true, env = "TALLY_SOCKET")]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an activity event
    Emit(emit::EmitArgs),
    /// Show view totals and top videos
    Analytics(analytics::AnalyticsArgs),
    /// Show daemon status
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Check that the daemon is answering
    Ping,
    /// Ask for an immediate snapshot rebuild
    Rebuild,
    /// Stop the daemon
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let socket = cli
        .socket
        .unwrap_or_else(|| cli.data_dir.join("tallyd.sock"));
    let client = DaemonClient::connect(&socket)?;

    match cli.command {
        Commands::Emit(args) => {
            client.emit(args.into_draft()).await?;
            println!("Event accepted");
        }

        Commands::Analytics(args) => {
            let report = client.analytics(args.days).await?;
            output::print(&ReportView(&report), OutputFormat::from_json_flag(args.json));
        }

        Commands::Status { json } => {
            let status = client.status().await?;
            output::print(&status, OutputFormat::from_json_flag(json));
        }

        Commands::Ping => {
            let version = client.hello().await?;
            let rtt = client.ping().await?;
            println!("pong from tallyd {} in {:?}", version, rtt);
        }

        Commands::Rebuild => {
            if client.rebuild().await? {
                println!("Snapshot rebuild requested");
            } else {
                println!("Snapshot rebuild already pending");
            }
        }

        Commands::Shutdown => {
            client.shutdown().await?;
            println!("Daemon shutting down");
        }
    }

    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
