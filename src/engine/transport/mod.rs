//! Transport selection for the engine control protocol.
//!
//! The daemon speaks HTTP/1.1 over one of several byte-stream transports. This
//! module parses endpoint URIs into a [`TransportConfig`] and maps the scheme to
//! an [`EngineConnector`] that opens channels of the matching kind.

mod stream;
mod tls;


use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use camino::{Utf8Path, Utf8PathBuf};
use http::Uri;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tower_service::Service;
use tracing::debug;

pub use self::stream::EngineIo;
use self::stream::EngineStream;
use crate::error::{ConfigError, TransportError, WireError};

/// Default port for plain TCP daemons.
const DEFAULT_TCP_PORT: u16 = 2375;

/// Default port for TLS daemons.
const DEFAULT_TLS_PORT: u16 = 2376;

/// Host used in request URIs for socket and pipe transports.
const LOCAL_AUTHORITY: &str = "localhost";

/// Connection scheme understood by the transport selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain TCP (`tcp://` or `http://`).
    Tcp,
    /// TCP wrapped in TLS (`https://`).
    Https,
    /// Unix domain socket (`unix://`).
    Unix,
    /// Windows named pipe (`npipe://`).
    NamedPipe,
}

impl Scheme {
    /// Parse a scheme name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedScheme` naming the scheme when it is
    /// not recognised.
    pub fn parse(scheme: &str) -> Result<Self, ConfigError> {
        match scheme.to_ascii_lowercase().as_str() {
            "tcp" | "http" => Ok(Self::Tcp),
            "https" => Ok(Self::Https),
            "unix" => Ok(Self::Unix),
            "npipe" => Ok(Self::NamedPipe),
            _ => Err(ConfigError::UnsupportedScheme {
                scheme: scheme.to_owned(),
            }),
        }
    }

    /// Canonical scheme name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Https => "https",
            Self::Unix => "unix",
            Self::NamedPipe => "npipe",
        }
    }

    /// Whether the daemon path lives in the host field.
    #[must_use]
    pub const fn is_local_socket(self) -> bool {
        matches!(self, Self::Unix | Self::NamedPipe)
    }
}

/// Where and how to reach the daemon.
///
/// For `unix` and `npipe` endpoints the socket or pipe path is carried in
/// `host` and `port` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    cert_path: Option<Utf8PathBuf>,
}

impl TransportConfig {
    /// Parse an endpoint URI such as `tcp://host:2375`, `unix:///var/run/docker.sock`
    /// or `npipe:////./pipe/docker_engine`.
    ///
    /// Bare paths are accepted: paths starting with `\\` or `//` are treated
    /// as named pipes, all other paths as Unix sockets. Detection is
    /// syntax-based, not platform-based.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedScheme` for unknown schemes and
    /// `ConfigError::InvalidEndpoint` when the host or port cannot be read.
    pub fn from_endpoint(endpoint: &str) -> Result<Self, ConfigError> {
        let Some((scheme_name, rest)) = endpoint.split_once("://") else {
            return Self::from_bare_path(endpoint);
        };
        let scheme = Scheme::parse(scheme_name)?;
        if scheme.is_local_socket() {
            if rest.is_empty() {
                return Err(invalid_endpoint(endpoint, "missing socket path"));
            }
            return Ok(Self::local(scheme, rest));
        }

        let url = url::Url::parse(endpoint)
            .map_err(|error| invalid_endpoint(endpoint, &error.to_string()))?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid_endpoint(endpoint, "missing host"))?;
        let default_port = match scheme {
            Scheme::Https => DEFAULT_TLS_PORT,
            _ => DEFAULT_TCP_PORT,
        };

        Ok(Self {
            scheme,
            host: host.to_owned(),
            port: Some(url.port().unwrap_or(default_port)),
            cert_path: None,
        })
    }

    fn from_bare_path(path: &str) -> Result<Self, ConfigError> {
        if path.is_empty() {
            return Err(invalid_endpoint(path, "empty endpoint"));
        }
        if path.starts_with("\\\\") || path.starts_with("//") {
            Ok(Self::local(Scheme::NamedPipe, path))
        } else {
            Ok(Self::local(Scheme::Unix, path))
        }
    }

    fn local(scheme: Scheme, path: &str) -> Self {
        Self {
            scheme,
            host: path.to_owned(),
            port: None,
            cert_path: None,
        }
    }

    /// Attach a certificate bundle directory.
    ///
    /// When `verify` is set, a plain `tcp` endpoint is promoted to `https`.
    #[must_use]
    pub fn with_tls(mut self, cert_path: Option<Utf8PathBuf>, verify: bool) -> Self {
        if verify && self.scheme == Scheme::Tcp {
            self.scheme = Scheme::Https;
            if self.port == Some(DEFAULT_TCP_PORT) {
                self.port = Some(DEFAULT_TLS_PORT);
            }
        }
        self.cert_path = cert_path;
        self
    }

    /// Endpoint scheme.
    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host name, or the socket/pipe path for local transports.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port, absent for local transports.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Certificate bundle directory, if any.
    #[must_use]
    pub fn cert_path(&self) -> Option<&Utf8Path> {
        self.cert_path.as_deref()
    }

    /// Socket or pipe path for local transports.
    #[must_use]
    pub fn socket_path(&self) -> Option<&str> {
        self.scheme.is_local_socket().then_some(self.host.as_str())
    }

    /// Base URI (scheme and authority) used to address requests.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEndpoint` when the host cannot form a URI
    /// authority.
    pub fn base_uri(&self) -> Result<Uri, ConfigError> {
        let (scheme, authority) = match (self.scheme, self.port) {
            (Scheme::Unix | Scheme::NamedPipe, _) => ("http", LOCAL_AUTHORITY.to_owned()),
            (Scheme::Https, Some(port)) => ("https", format!("{}:{port}", self.host)),
            (Scheme::Https, None) => ("https", self.host.clone()),
            (Scheme::Tcp, Some(port)) => ("http", format!("{}:{port}", self.host)),
            (Scheme::Tcp, None) => ("http", self.host.clone()),
        };
        Uri::builder()
            .scheme(scheme)
            .authority(authority.as_str())
            .path_and_query("/")
            .build()
            .map_err(|error| invalid_endpoint(&self.host, &error.to_string()))
    }
}

fn invalid_endpoint(endpoint: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        reason: reason.to_owned(),
    }
}

/// Concrete channel target chosen by the selector.
enum Target {
    Tcp {
        address: String,
    },
    Tls {
        address: String,
        server_name: ServerName<'static>,
        connector: TlsConnector,
    },
    #[cfg(unix)]
    Unix { path: std::path::PathBuf },
    #[cfg(windows)]
    NamedPipe { name: String },
}

/// Opens byte-stream channels to the daemon.
///
/// Cloning is cheap; clones share the selected target and TLS configuration.
/// The connector is the `tower` service the pooled HTTP client uses to open
/// new connections.
#[derive(Clone)]
pub struct EngineConnector {
    target: Arc<Target>,
}

impl EngineConnector {
    /// Select and configure the connector for a transport.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::TransportUnavailable` when the scheme cannot be
    /// served on this platform, and `TransportError::TlsSetupFailed` when the
    /// certificate bundle cannot be loaded.
    pub fn select(config: &TransportConfig) -> Result<Self, WireError> {
        let target = match config.scheme() {
            Scheme::Tcp => Target::Tcp {
                address: tcp_address(config),
            },
            Scheme::Https => Self::tls_target(config)?,
            Scheme::Unix => Self::unix_target(config)?,
            Scheme::NamedPipe => Self::named_pipe_target(config)?,
        };
        Ok(Self {
            target: Arc::new(target),
        })
    }

    fn tls_target(config: &TransportConfig) -> Result<Target, WireError> {
        let cert_path = config.cert_path().ok_or_else(|| ConfigError::MissingRequired {
            field: String::from("tls.cert_path"),
        })?;
        let client_config = tls::load_client_config(cert_path)?;
        let server_name = ServerName::try_from(config.host().to_owned()).map_err(|error| {
            TransportError::TlsSetupFailed {
                path: cert_path.as_std_path().to_path_buf(),
                message: format!("invalid server name '{}': {error}", config.host()),
            }
        })?;
        Ok(Target::Tls {
            address: tcp_address(config),
            server_name,
            connector: TlsConnector::from(client_config),
        })
    }

    #[cfg(unix)]
    #[expect(
        clippy::unnecessary_wraps,
        reason = "signature matches the non-unix variant, which fails"
    )]
    fn unix_target(config: &TransportConfig) -> Result<Target, WireError> {
        Ok(Target::Unix {
            path: std::path::PathBuf::from(config.host()),
        })
    }

    #[cfg(not(unix))]
    fn unix_target(_config: &TransportConfig) -> Result<Target, WireError> {
        Err(ConfigError::TransportUnavailable {
            scheme: String::from(Scheme::Unix.as_str()),
        }
        .into())
    }

    #[cfg(windows)]
    #[expect(
        clippy::unnecessary_wraps,
        reason = "signature matches the non-windows variant, which fails"
    )]
    fn named_pipe_target(config: &TransportConfig) -> Result<Target, WireError> {
        Ok(Target::NamedPipe {
            name: config.host().replace('/', "\\"),
        })
    }

    #[cfg(not(windows))]
    fn named_pipe_target(_config: &TransportConfig) -> Result<Target, WireError> {
        Err(ConfigError::TransportUnavailable {
            scheme: String::from(Scheme::NamedPipe.as_str()),
        }
        .into())
    }

    /// Open a fresh channel to the daemon.
    async fn open(&self) -> io::Result<EngineStream> {
        match self.target.as_ref() {
            Target::Tcp { address } => {
                debug!(address = %address, "opening tcp channel");
                Ok(EngineStream::Tcp(TcpStream::connect(address.as_str()).await?))
            }
            Target::Tls {
                address,
                server_name,
                connector,
            } => {
                debug!(address = %address, "opening tls channel");
                let tcp = TcpStream::connect(address.as_str()).await?;
                let tls = connector.connect(server_name.clone(), tcp).await?;
                Ok(EngineStream::Tls(Box::new(tls)))
            }
            #[cfg(unix)]
            Target::Unix { path } => {
                debug!(path = %path.display(), "opening unix socket channel");
                Ok(EngineStream::Unix(tokio::net::UnixStream::connect(path).await?))
            }
            #[cfg(windows)]
            Target::NamedPipe { name } => {
                debug!(pipe = %name, "opening named pipe channel");
                let client = tokio::net::windows::named_pipe::ClientOptions::new().open(name)?;
                Ok(EngineStream::NamedPipe(client))
            }
        }
    }
}

fn tcp_address(config: &TransportConfig) -> String {
    config.port().map_or_else(
        || config.host().to_owned(),
        |port| format!("{}:{port}", config.host()),
    )
}

impl Service<Uri> for EngineConnector {
    type Response = EngineIo;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<EngineIo>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        let connector = self.clone();
        Box::pin(async move { connector.open().await.map(EngineIo::new) })
    }
}
