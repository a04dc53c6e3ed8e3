//! Command-line argument definitions for podwire.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Command-line interface for podwire.
#[derive(Debug, Parser)]
#[command(name = "podwire")]
#[command(
    author,
    version,
    about = "Talk to a Docker or Podman daemon over its control protocol"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Daemon endpoint (`unix://`, `npipe://`, `tcp://` or `https://`).
    #[arg(long, global = true)]
    pub engine_host: Option<String>,

    /// API version prefix, e.g. `v1.41`.
    #[arg(long, global = true)]
    pub api_version: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that the daemon answers.
    Ping,

    /// Print the daemon's version information.
    Version,

    /// Print a container's output.
    Logs(LogsArgs),

    /// Follow the daemon's event stream.
    Events(EventsArgs),
}

/// Arguments for the `logs` subcommand.
#[derive(Debug, Parser)]
pub struct LogsArgs {
    /// Container ID or name.
    #[arg(required = true)]
    pub container: String,

    /// Keep streaming new output.
    #[arg(long)]
    pub follow: bool,

    /// Number of lines to show from the end of the logs.
    #[arg(long)]
    pub tail: Option<u64>,

    /// The container runs without a TTY, so output is multiplexed.
    #[arg(long)]
    pub multiplexed: bool,
}

/// Arguments for the `events` subcommand.
#[derive(Debug, Parser)]
pub struct EventsArgs {
    /// Only show events created since this timestamp.
    #[arg(long)]
    pub since: Option<String>,

    /// Stop after this many events.
    #[arg(long)]
    pub limit: Option<u64>,
}
