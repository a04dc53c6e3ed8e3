//! Configuration data types for podwire.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::engine::normalize_api_version;

/// TLS settings for `tcp`/`https` endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Require TLS; a `tcp://` endpoint is upgraded to `https`.
    pub verify: bool,

    /// Directory holding `ca.pem`, `cert.pem` and `key.pem`.
    pub cert_path: Option<Utf8PathBuf>,
}

/// Call and streaming timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Seconds to wait for a response head.
    #[default = 120]
    pub request_secs: u64,

    /// Upper bound in seconds on a whole streaming session.
    #[default = 86_400]
    pub stream_secs: u64,
}

impl TimeoutConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    /// Streaming session timeout as a `Duration`.
    #[must_use]
    pub const fn stream(&self) -> Duration {
        Duration::from_secs(self.stream_secs)
    }
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `PODWIRE_CONFIG_PATH` environment variable
/// 2. `.podwire.toml` in the current working directory
/// 3. `.podwire.toml` in the home directory
/// 4. `~/.config/podwire/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "PODWIRE",
    post_merge_hook,
    discovery(
        app_name = "podwire",
        env_var = "PODWIRE_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".podwire.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The daemon endpoint, e.g. `unix:///var/run/docker.sock`.
    pub engine_host: Option<String>,

    /// API version used as the path prefix, e.g. `v1.41`.
    pub api_version: Option<String>,

    /// TLS configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub tls: TlsConfig,

    /// Timeout configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub timeouts: TimeoutConfig,
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        self.api_version = self.api_version.as_deref().and_then(normalize_api_version);
        Ok(())
    }
}
