//! Client transport and protocol layer for Docker and Podman daemons.
//!
//! `podwire` speaks the container engine's HTTP control protocol over TCP,
//! TLS, Unix domain sockets or Windows named pipes. Callers describe a call
//! with a [`engine::RequestDescriptor`] and receive a
//! [`engine::ResponseOutcome`] holding a decoded value, raw bytes, or a lazy
//! stream of JSON values or output frames. Transport selection, framing and
//! header repair stay behind that boundary.
//!
//! # Modules
//!
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Transports, request building, dispatch and stream decoding
//! - [`error`]: Semantic error types for the library
//! - [`serialization`]: JSON helpers and wire-format adapters for model fields

pub mod config;
pub mod engine;
pub mod error;
pub mod serialization;
