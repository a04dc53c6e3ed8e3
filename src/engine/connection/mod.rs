//! Endpoint resolution and the engine client.
//!
//! This module resolves the daemon endpoint from configuration, environment
//! variables and platform defaults, and owns [`EngineClient`], the pooled HTTP
//! client every call is dispatched through.

mod error_classification;
mod health_check;


use std::future::Future;
use std::time::Duration;

use camino::Utf8PathBuf;
use hyper::body::Incoming;
use hyper::Response;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::content_type::{self, ContentTypeFallback};
use super::request::{Body, RequestBuilder, RequestDescriptor};
use super::transport::{EngineConnector, TransportConfig};
use crate::config::AppConfig;
use crate::error::{TransportError, WireError};

/// Environment variable names checked in fallback order after configuration sources.
const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// Certificate bundle directory for `https` endpoints.
const CERT_PATH_ENV_VAR: &str = "DOCKER_CERT_PATH";

/// Enables TLS verification when set to anything but `0` or `false`.
const TLS_VERIFY_ENV_VAR: &str = "DOCKER_TLS_VERIFY";

/// Per-call timeout in seconds covering connect, response head and any
/// buffered body.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Upper bound in seconds on a streaming session.
const STREAM_TIMEOUT_SECS: u64 = 86_400;

/// Timeout in seconds for health check operations.
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Default endpoint for Unix platforms.
#[cfg(unix)]
const DEFAULT_ENDPOINT: &str = "unix:///var/run/docker.sock";

/// Default endpoint for Windows platforms.
#[cfg(windows)]
const DEFAULT_ENDPOINT: &str = "npipe:////./pipe/docker_engine";

/// Resolves the daemon endpoint and TLS settings from environment variables.
///
/// # Type Parameters
///
/// * `E` - An environment provider implementing the `mockable::Env` trait,
///   allowing for testable environment variable access.
///
/// # Example
///
/// ```ignore
/// use mockable::DefaultEnv;
/// use podwire::engine::EndpointResolver;
///
/// let env = DefaultEnv::new();
/// let resolver = EndpointResolver::new(&env);
/// let endpoint = resolver.resolve(None);
/// ```
pub struct EndpointResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> EndpointResolver<'a, E> {
    /// Creates a new resolver with the given environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Resolves the endpoint from `DOCKER_HOST`, `CONTAINER_HOST` or
    /// `PODMAN_HOST`, in that order.
    ///
    /// Returns `None` if no fallback variable is set or all are empty.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// Returns the platform default endpoint.
    #[must_use]
    pub const fn default_endpoint() -> &'static str {
        DEFAULT_ENDPOINT
    }

    /// Resolves the endpoint to use.
    ///
    /// Resolution order:
    /// 1. `configured` (from CLI, config file, or `PODWIRE_ENGINE_HOST`)
    /// 2. `DOCKER_HOST`, `CONTAINER_HOST`, `PODMAN_HOST`
    /// 3. Platform default endpoint
    #[must_use]
    pub fn resolve(&self, configured: Option<&str>) -> String {
        configured
            .filter(|endpoint| !endpoint.is_empty())
            .map(String::from)
            .or_else(|| self.resolve_from_env())
            .unwrap_or_else(|| Self::default_endpoint().to_owned())
    }

    /// Certificate bundle directory from `DOCKER_CERT_PATH`.
    #[must_use]
    pub fn cert_path(&self) -> Option<Utf8PathBuf> {
        self.env
            .string(CERT_PATH_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(Utf8PathBuf::from)
    }

    /// Whether `DOCKER_TLS_VERIFY` requests TLS.
    #[must_use]
    pub fn tls_verify(&self) -> bool {
        self.env
            .string(TLS_VERIFY_ENV_VAR)
            .is_some_and(|value| !matches!(value.trim(), "" | "0" | "false"))
    }
}

/// Pooled client for one daemon.
///
/// Cloning is cheap; clones share the connection pool. There is no global
/// client: construct one per daemon and pass it where it is needed.
#[derive(Clone)]
pub struct EngineClient {
    http: Client<EngineConnector, Body>,
    transport: TransportConfig,
    builder: RequestBuilder,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("transport", &self.transport)
            .field("api_version", &self.builder.api_version())
            .field("request_timeout", &self.request_timeout)
            .field("stream_timeout", &self.stream_timeout)
            .finish_non_exhaustive()
    }
}

impl EngineClient {
    /// Create a client for `transport`.
    ///
    /// No connection is opened until the first call.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::TransportUnavailable` when the platform cannot
    /// serve the scheme and `TransportError::TlsSetupFailed` when the
    /// certificate bundle is unusable.
    pub fn new(transport: TransportConfig, api_version: Option<&str>) -> Result<Self, WireError> {
        let connector = EngineConnector::select(&transport)?;
        let builder = RequestBuilder::new(transport.base_uri()?, api_version);
        let http = Client::builder(TokioExecutor::new()).build(connector);
        debug!(
            scheme = transport.scheme().as_str(),
            host = transport.host(),
            "engine client created"
        );
        Ok(Self {
            http,
            transport,
            builder,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            stream_timeout: Duration::from_secs(STREAM_TIMEOUT_SECS),
        })
    }

    /// Create a client for an endpoint URI or bare socket path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEndpoint` or
    /// `ConfigError::UnsupportedScheme` when the endpoint cannot be parsed,
    /// plus the errors of [`Self::new`].
    pub fn connect(endpoint: &str) -> Result<Self, WireError> {
        Self::new(TransportConfig::from_endpoint(endpoint)?, None)
    }

    /// Create a client for the resolved endpoint.
    ///
    /// Resolution order:
    /// 1. `configured` (from CLI, config file, or `PODWIRE_ENGINE_HOST`)
    /// 2. `DOCKER_HOST`, `CONTAINER_HOST`, `PODMAN_HOST` (via resolver)
    /// 3. Platform default endpoint
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::connect`].
    pub fn connect_with_fallback<E: mockable::Env>(
        configured: Option<&str>,
        resolver: &EndpointResolver<'_, E>,
    ) -> Result<Self, WireError> {
        Self::connect(&resolver.resolve(configured))
    }

    /// Create a client from loaded configuration.
    ///
    /// Configured TLS settings take precedence over `DOCKER_CERT_PATH` and
    /// `DOCKER_TLS_VERIFY`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::new`].
    pub fn from_config<E: mockable::Env>(
        config: &AppConfig,
        resolver: &EndpointResolver<'_, E>,
    ) -> Result<Self, WireError> {
        let endpoint = resolver.resolve(config.engine_host.as_deref());
        let cert_path = config.tls.cert_path.clone().or_else(|| resolver.cert_path());
        let verify = config.tls.verify || resolver.tls_verify();
        let transport = TransportConfig::from_endpoint(&endpoint)?.with_tls(cert_path, verify);
        let client = Self::new(transport, config.api_version.as_deref())?
            .with_request_timeout(config.timeouts.request())
            .with_stream_timeout(config.timeouts.stream());
        Ok(client)
    }

    /// Replace the default per-call timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Replace the default streaming session timeout.
    #[must_use]
    pub const fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// The transport this client talks over.
    #[must_use]
    pub const fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// API version prefix, if any.
    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        self.builder.api_version()
    }

    /// Default per-call timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Default streaming session timeout.
    #[must_use]
    pub const fn stream_timeout(&self) -> Duration {
        self.stream_timeout
    }

    /// Send `descriptor` and return the response with its content type
    /// repaired, plus the deadline the rest of the call must meet.
    pub(crate) async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        fallback: Option<&str>,
    ) -> Result<(Response<Incoming>, CallDeadline), WireError> {
        let request = self.builder.build(descriptor, fallback).await?;
        let tag = request.extensions().get::<ContentTypeFallback>().cloned();
        let deadline =
            CallDeadline::start(descriptor.timeout_override().unwrap_or(self.request_timeout));
        debug!(method = %request.method(), uri = %request.uri(), "dispatching request");

        let mut response = deadline
            .run(self.http.request(request))
            .await?
            .map_err(|error| {
                let classified =
                    error_classification::classify_request_error(&error, &self.transport);
                warn!(error = %classified, "request to container engine failed");
                classified
            })?;

        content_type::enforce(&mut response, tag.as_ref());
        debug!(status = response.status().as_u16(), "response received");
        Ok((response, deadline))
    }
}

/// Point by which a call, reading of a buffered body included, must finish.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallDeadline {
    at: Option<Instant>,
    budget: Duration,
}

impl CallDeadline {
    /// A deadline `budget` from now. A budget too large to represent never
    /// expires.
    pub(crate) fn start(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
            budget,
        }
    }

    /// Drive `future` to completion unless the deadline passes first.
    pub(crate) async fn run<F: Future>(self, future: F) -> Result<F::Output, TransportError> {
        let Some(at) = self.at else {
            return Ok(future.await);
        };
        tokio::time::timeout_at(at, future)
            .await
            .map_err(|_| TransportError::Timeout {
                seconds: self.budget.as_secs(),
            })
    }
}
