//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Ingests commit and builder status feeds and serves the aggregated revisions.
#[derive(Parser, Debug)]
#[command(name = "buildwatch", version, about)]
pub struct Cli {
    /// Builder list (TOML). Defaults to BUILDERS_CONFIG from the environment.
    #[arg(long)]
    pub builders: Option<PathBuf>,

    /// Seconds to wait for pollers to stop after a shutdown signal.
    #[arg(long, env = "BUILDWATCH_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    pub shutdown_timeout: u64,

    /// Run the pollers without the HTTP server.
    #[arg(long)]
    pub ingest_only: bool,
}
