//! Semantic error types for the podwire transport layer.
//!
//! This module defines the error hierarchy for podwire, following the principle of
//! using semantic error enums (via `thiserror`) for conditions the caller might
//! inspect, retry, or map to a status, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while configuring the client or preparing a request.
///
/// These are always fatal to the call and are never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The endpoint scheme is not one of `tcp`, `http`, `https`, `unix` or `npipe`.
    #[error("unsupported engine endpoint scheme: {scheme}")]
    UnsupportedScheme {
        /// The scheme that was rejected.
        scheme: String,
    },

    /// The scheme is recognised but the current platform cannot provide it.
    #[error("{scheme} transport is not available on this platform")]
    TransportUnavailable {
        /// The scheme whose transport is unavailable.
        scheme: String,
    },

    /// The endpoint URI could not be interpreted.
    #[error("invalid engine endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint as supplied.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required request header was empty after defaulting.
    #[error("missing {header} header, this is required")]
    MissingHeader {
        /// The header name.
        header: String,
    },

    /// A request or response body uses a media type this layer cannot handle.
    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType {
        /// The offending media type.
        content_type: String,
    },

    /// The HTTP request could not be assembled.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// A description of the failure.
        message: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    ///
    /// This wraps errors from the layered configuration system, including:
    /// - Configuration file parsing errors
    /// - Environment variable parsing errors
    /// - CLI argument parsing errors
    /// - Missing required fields after layer merging
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised by the socket transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to connect to the container engine.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket or pipe was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// TLS material could not be loaded or the client configuration built.
    #[error("failed to set up TLS from '{path}': {message}")]
    TlsSetupFailed {
        /// The certificate directory.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// No response head arrived within the per-call timeout.
    #[error("request timed out after {seconds} seconds")]
    Timeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// A tokio runtime could not be created for a blocking call.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the failure.
        message: String,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },
}

/// Non-success responses raised at the call boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The daemon answered with a 4xx status.
    #[error("client error: {status} {message}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Daemon message or reason phrase.
        message: String,
        /// Raw response body, if any.
        body: Option<String>,
    },

    /// The daemon answered with a 5xx status.
    #[error("server error: {status} {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Daemon message or reason phrase.
        message: String,
        /// Raw response body, if any.
        body: Option<String>,
    },

    /// The daemon answered with a 1xx or 3xx status, which this client does not follow.
    #[error("client does not support {kind} responses (status {status})")]
    Unsupported {
        /// Outcome kind, e.g. `redirection`.
        kind: &'static str,
        /// HTTP status code.
        status: u16,
    },
}

/// Errors raised while encoding or decoding payloads and streams.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A multiplexed frame header carried an unrecognised stream type byte.
    #[error("unknown stream type {byte}")]
    UnknownStreamType {
        /// The offending header byte.
        byte: u8,
    },

    /// The stream ended part-way through a unit.
    #[error("stream ended inside {unit}: expected {expected} bytes, received {received}")]
    Truncated {
        /// What was being read, e.g. `frame header`.
        unit: &'static str,
        /// Bytes required to complete the unit.
        expected: usize,
        /// Bytes actually buffered.
        received: usize,
    },

    /// The stream ended part-way through a JSON value.
    #[error("stream ended inside a JSON value after {received} bytes")]
    IncompleteJson {
        /// Bytes of the unfinished value that were buffered.
        received: usize,
    },

    /// A streamed unit grew past the decoder's size limit.
    #[error("{unit} of {size} bytes exceeds the {limit}-byte limit")]
    UnitTooLarge {
        /// What was being read, e.g. `frame payload`.
        unit: &'static str,
        /// Declared or buffered size of the unit.
        size: usize,
        /// Configured upper bound.
        limit: usize,
    },

    /// A JSON value in a stream was syntactically invalid.
    #[error("malformed JSON value in stream: {message}")]
    MalformedJson {
        /// Parser diagnostic.
        message: String,
    },

    /// A JSON document did not match the expected schema.
    #[error("failed to decode value at '{path}': {message}")]
    Schema {
        /// Field path of the failure (`.` for the root).
        path: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A value could not be serialised.
    #[error("failed to encode value: {message}")]
    Encode {
        /// Serialiser diagnostic.
        message: String,
    },

    /// Reading the response body failed.
    #[error("failed to read response body: {0}")]
    Io(#[from] io::Error),
}

/// Top-level error type for podwire.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the crate. At the application boundary (main.rs),
/// these errors are typically converted to `eyre::Report` for human-readable
/// error reporting.
#[derive(Debug, Error)]
pub enum WireError {
    /// An error occurred during configuration or request preparation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The daemon returned a non-success outcome.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An error occurred while encoding or decoding.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A specialised `Result` type for podwire operations.
pub type Result<T> = std::result::Result<T, WireError>;
