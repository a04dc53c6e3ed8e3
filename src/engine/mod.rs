//! Client side of the container engine control protocol.
//!
//! A call flows through these stages:
//!
//! 1. [`RequestDescriptor`] describes the call.
//! 2. [`RequestBuilder`] turns it into an HTTP request with default headers
//!    and the API version prefix.
//! 3. [`EngineClient`] sends it over the transport chosen by
//!    [`EngineConnector`] and classifies the answer as a [`ResponseOutcome`].
//! 4. [`content_type::enforce`] repairs a missing `Content-Type` on success.
//! 5. The body is decoded as a single value, raw bytes, a [`JsonStream`] or
//!    a [`FrameStream`].
//!
//! The endpoint is resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-host`)
//! 2. Config file (`engine_host` in TOML)
//! 3. `PODWIRE_ENGINE_HOST` environment variable
//! 4. `DOCKER_HOST`, `CONTAINER_HOST`, `PODMAN_HOST` environment variables
//! 5. Platform default (`/var/run/docker.sock` on Unix)

mod connection;
pub mod content_type;
mod dispatch;
mod request;
pub mod stream;
mod transport;

pub use connection::{EndpointResolver, EngineClient};
pub use content_type::ContentTypeFallback;
pub use dispatch::{ResponseKind, ResponseOutcome};
pub use request::{
    Body, Method, RequestBody, RequestBuilder, RequestDescriptor, normalize_api_version,
};
pub use stream::{
    DEFAULT_MAX_UNIT_LEN, DecodedStream, Frame, FrameCodec, FrameMode, FrameStream, JsonSeqCodec,
    JsonStream, LoggingCallback, StreamCallback, StreamOptions, StreamState, StreamType, drive,
};
pub use transport::{EngineConnector, EngineIo, Scheme, TransportConfig};
