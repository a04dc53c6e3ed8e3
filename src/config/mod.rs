//! Configuration system for podwire.
//!
//! This module provides the configuration structures and CLI definitions for the
//! podwire client. Configuration loading and precedence merging is handled by
//! the `ortho_config` crate. Precedence: CLI flags override environment
//! variables, which override configuration files, which override defaults.
//!
//! The configuration file is expected at `~/.config/podwire/config.toml` by default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_host = "tcp://build-host.internal:2376"
//! api_version = "v1.41"
//!
//! [tls]
//! verify = true
//! cert_path = "/home/user/.docker/machine/certs"
//!
//! [timeouts]
//! request_secs = 60
//! stream_secs = 3600
//! ```

mod cli;
mod loader;
mod types;


pub use cli::{Cli, Commands, EventsArgs, LogsArgs};
pub use loader::{env_var_names, load_config};
pub use types::{AppConfig, TimeoutConfig, TlsConfig};
