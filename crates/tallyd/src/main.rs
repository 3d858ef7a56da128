//! tallyd — the tally daemon.
//!
//! Single binary with two modes:
//! - `server`: the collector — metric store, optional restore, periodic or
//!   sync-on-update snapshots, HTTP API
//! - `agent`: the reporter — runtime sampler plus bounded-concurrency
//!   fan-out to a collector
//!
//! # Usage
//!
//! ```text
//! tallyd server --addr 127.0.0.1:8080 --snapshot-path ./metrics.json --restore
//! tallyd agent --collector 127.0.0.1:8080 --report-interval 10
//! ```

mod agent;
mod server;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tallyd", about = "Tally metrics daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the metrics collector server.
    Server {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,

        /// Path of the JSON snapshot file.
        #[arg(long, default_value = "./metrics.json")]
        snapshot_path: PathBuf,

        /// Snapshot interval in seconds; 0 snapshots on every update.
        #[arg(long, default_value = "300")]
        snapshot_interval: u64,

        /// Restore the store from the snapshot file on start.
        #[arg(long)]
        restore: bool,
    },

    /// Run the metrics reporting agent.
    Agent {
        /// Collector address (host:port).
        #[arg(long, default_value = "127.0.0.1:8080")]
        collector: String,

        /// Sample interval in seconds.
        #[arg(long, default_value = "2")]
        poll_interval: u64,

        /// Report interval in seconds.
        #[arg(long, default_value = "10")]
        report_interval: u64,

        /// Maximum simultaneous in-flight reports.
        #[arg(long, default_value = "8")]
        max_in_flight: usize,

        /// Disable gzip compression of report bodies.
        #[arg(long)]
        no_compress: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tallyd=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Server {
            addr,
            snapshot_path,
            snapshot_interval,
            restore,
        } => server::run_server(addr, snapshot_path, snapshot_interval, restore).await,
        Command::Agent {
            collector,
            poll_interval,
            report_interval,
            max_in_flight,
            no_compress,
        } => {
            let config = tally_agent::AgentConfig {
                collector_addr: collector,
                poll_interval: std::time::Duration::from_secs(poll_interval),
                report_interval: std::time::Duration::from_secs(report_interval),
                max_in_flight,
                compress: !no_compress,
            };
            agent::run_agent(config).await
        }
    }
}
