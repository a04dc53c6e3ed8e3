//! Response classification and decoding.
//!
//! Every call returns a [`ResponseOutcome`]: the status code alone decides the
//! variant, and on success the body is decoded in the mode the caller asked
//! for (single value, raw bytes, JSON sequence or frame sequence).

#[cfg(test)]
mod tests;

use std::io;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use hyper::Response;
use hyper::body::Incoming;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::connection::{CallDeadline, EngineClient};
use super::content_type::{
    APPLICATION_JSON, MULTIPLEXED_STREAM, RAW_STREAM, TEXT_PLAIN, is_json, media_type,
};
use super::request::RequestDescriptor;
use super::stream::{
    DecodedStream, FrameCodec, FrameStream, JsonSeqCodec, JsonStream, StreamOptions,
};
use crate::error::{ApiError, ConfigError, DecodeError, WireError};
use crate::serialization;

/// The five outcome kinds, decided by status code alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// 1xx.
    Informational,
    /// 2xx.
    Success,
    /// 3xx.
    Redirection,
    /// 4xx.
    ClientError,
    /// 5xx and anything above.
    ServerError,
}

impl ResponseKind {
    /// Classify a status code.
    #[must_use]
    pub const fn classify(status: u16) -> Self {
        match status {
            100..=199 => Self::Informational,
            200..=299 => Self::Success,
            300..=399 => Self::Redirection,
            400..=499 => Self::ClientError,
            _ => Self::ServerError,
        }
    }

    /// Lower-case name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Success => "success",
            Self::Redirection => "redirection",
            Self::ClientError => "client error",
            Self::ServerError => "server error",
        }
    }
}

/// Result of one call, as returned to the caller.
#[derive(Debug)]
pub enum ResponseOutcome<T> {
    /// 2xx response with its decoded data, if any.
    Success {
        /// Decoded body; `None` when the response carried nothing to decode.
        data: Option<T>,
        /// Response status.
        status: StatusCode,
        /// Response headers.
        headers: HeaderMap,
    },
    /// 4xx response.
    ClientError {
        /// Daemon message or reason phrase.
        message: String,
        /// Raw body text, if any.
        body: Option<String>,
        /// Response status.
        status: StatusCode,
        /// Response headers.
        headers: HeaderMap,
    },
    /// 5xx (or higher) response.
    ServerError {
        /// Daemon message or reason phrase.
        message: String,
        /// Raw body text, if any.
        body: Option<String>,
        /// Response status.
        status: StatusCode,
        /// Response headers.
        headers: HeaderMap,
    },
    /// 3xx response. Redirects are not followed.
    Redirection {
        /// Response status.
        status: StatusCode,
        /// Response headers.
        headers: HeaderMap,
    },
    /// 1xx response surfaced as a final answer.
    Informational {
        /// Reason phrase.
        message: String,
        /// Response status.
        status: StatusCode,
        /// Response headers.
        headers: HeaderMap,
    },
}

impl<T> ResponseOutcome<T> {
    /// Outcome kind.
    #[must_use]
    pub const fn kind(&self) -> ResponseKind {
        match self {
            Self::Success { .. } => ResponseKind::Success,
            Self::ClientError { .. } => ResponseKind::ClientError,
            Self::ServerError { .. } => ResponseKind::ServerError,
            Self::Redirection { .. } => ResponseKind::Redirection,
            Self::Informational { .. } => ResponseKind::Informational,
        }
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Success { status, .. }
            | Self::ClientError { status, .. }
            | Self::ServerError { status, .. }
            | Self::Redirection { status, .. }
            | Self::Informational { status, .. } => *status,
        }
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        match self {
            Self::Success { headers, .. }
            | Self::ClientError { headers, .. }
            | Self::ServerError { headers, .. }
            | Self::Redirection { headers, .. }
            | Self::Informational { headers, .. } => headers,
        }
    }

    /// Whether the call succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Unwrap the success data, turning every other outcome into an error.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Client` for 4xx, `ApiError::Server` for 5xx and
    /// `ApiError::Unsupported` for 1xx and 3xx outcomes.
    pub fn into_data(self) -> Result<Option<T>, ApiError> {
        match self {
            Self::Success { data, .. } => Ok(data),
            Self::ClientError {
                message,
                body,
                status,
                ..
            } => Err(ApiError::Client {
                status: status.as_u16(),
                message,
                body,
            }),
            Self::ServerError {
                message,
                body,
                status,
                ..
            } => Err(ApiError::Server {
                status: status.as_u16(),
                message,
                body,
            }),
            Self::Redirection { status, .. } | Self::Informational { status, .. } => {
                Err(ApiError::Unsupported {
                    kind: ResponseKind::classify(status.as_u16()).as_str(),
                    status: status.as_u16(),
                })
            }
        }
    }
}

/// The `{"message": ...}` body the daemon attaches to errors.
#[derive(Deserialize)]
struct DaemonMessage {
    message: String,
}

impl EngineClient {
    /// Perform a call and decode a single JSON value.
    ///
    /// `application/json` bodies are deserialised (an empty body gives
    /// `None`), `text/plain` bodies are decoded as a JSON string, and a
    /// response without a content type gives `None`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedContentType` for any other media
    /// type, `DecodeError` when the body does not fit `T`,
    /// `TransportError::Timeout` when the body has not arrived in full before
    /// the request timeout, plus request preparation and transport errors.
    pub async fn request<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ResponseOutcome<T>, WireError> {
        let (response, deadline) = self.execute(descriptor, None).await?;
        let (status, parts) = match split_success(response, deadline).await? {
            Ok(parts) => parts,
            Err(outcome) => return Ok(outcome),
        };
        let media = media_type(&parts.headers);
        let body = read_body(parts.body, deadline).await?;
        let data = decode_value(media.as_deref(), &body)?;
        Ok(ResponseOutcome::Success {
            data,
            status,
            headers: parts.headers,
        })
    }

    /// Perform a call and return the whole body as bytes.
    ///
    /// An empty body gives `None`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Timeout` when the body has not arrived in full
    /// before the request timeout, plus request preparation, transport and
    /// body read errors.
    pub async fn request_raw(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ResponseOutcome<Bytes>, WireError> {
        let (response, deadline) = self.execute(descriptor, None).await?;
        let (status, parts) = match split_success(response, deadline).await? {
            Ok(parts) => parts,
            Err(outcome) => return Ok(outcome),
        };
        let body = read_body(parts.body, deadline).await?;
        Ok(ResponseOutcome::Success {
            data: (!body.is_empty()).then_some(body),
            status,
            headers: parts.headers,
        })
    }

    /// Perform a call and decode the body as back-to-back JSON values.
    ///
    /// A response without a content type is treated as JSON. The stream holds
    /// the connection until it is exhausted, fails, is cancelled, or is
    /// dropped. Without an explicit session timeout the client's default
    /// applies.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedContentType` when the response is not
    /// JSON, plus request preparation and transport errors.
    pub async fn request_json_stream<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
        options: StreamOptions,
    ) -> Result<ResponseOutcome<JsonStream<T>>, WireError> {
        let (response, deadline) = self.execute(descriptor, Some(APPLICATION_JSON)).await?;
        let (status, parts) = match split_success(response, deadline).await? {
            Ok(parts) => parts,
            Err(outcome) => return Ok(outcome),
        };
        let data = match media_type(&parts.headers) {
            None => None,
            Some(media) if is_json(&media) => {
                let codec = JsonSeqCodec::new().with_max_unit_len(options.unit_limit());
                Some(DecodedStream::new(
                    body_reader(parts.body),
                    codec,
                    self.stream_options(options),
                ))
            }
            Some(media) => return Err(unsupported(media)),
        };
        Ok(ResponseOutcome::Success {
            data,
            status,
            headers: parts.headers,
        })
    }

    /// Perform a call and decode the body as output frames.
    ///
    /// `multiplexed` selects the 8-byte frame header format; a response
    /// declaring the multiplexed-stream media type is always decoded as
    /// multiplexed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedContentType` when the response is not
    /// a raw or multiplexed stream, plus request preparation and transport
    /// errors.
    pub async fn request_frames(
        &self,
        descriptor: &RequestDescriptor,
        multiplexed: bool,
        options: StreamOptions,
    ) -> Result<ResponseOutcome<FrameStream>, WireError> {
        let (response, deadline) = self.execute(descriptor, Some(RAW_STREAM)).await?;
        let (status, parts) = match split_success(response, deadline).await? {
            Ok(parts) => parts,
            Err(outcome) => return Ok(outcome),
        };
        let codec = match media_type(&parts.headers).as_deref() {
            None => None,
            Some(RAW_STREAM) => Some(FrameCodec::new(multiplexed)),
            Some(MULTIPLEXED_STREAM) => Some(FrameCodec::multiplexed()),
            Some(other) => return Err(unsupported(other.to_owned())),
        };
        let data = codec.map(|codec| {
            DecodedStream::new(
                body_reader(parts.body),
                codec.with_max_unit_len(options.unit_limit()),
                self.stream_options(options),
            )
        });
        Ok(ResponseOutcome::Success {
            data,
            status,
            headers: parts.headers,
        })
    }

    fn stream_options(&self, options: StreamOptions) -> StreamOptions {
        StreamOptions {
            timeout: options.timeout.or(Some(self.stream_timeout())),
            ..options
        }
    }
}

/// Headers and body of a successful response.
struct SuccessParts {
    headers: HeaderMap,
    body: Incoming,
}

/// Split a successful response, or build the failure outcome for any other
/// status.
async fn split_success<T>(
    response: Response<Incoming>,
    deadline: CallDeadline,
) -> Result<Result<(StatusCode, SuccessParts), ResponseOutcome<T>>, WireError> {
    let (parts, body) = response.into_parts();
    let status = parts.status;
    let headers = parts.headers;
    let kind = ResponseKind::classify(status.as_u16());
    debug!(status = status.as_u16(), kind = kind.as_str(), "classified response");

    let outcome = match kind {
        ResponseKind::Success => {
            return Ok(Ok((status, SuccessParts { headers, body })));
        }
        ResponseKind::Redirection => ResponseOutcome::Redirection { status, headers },
        ResponseKind::Informational => ResponseOutcome::Informational {
            message: reason(status),
            status,
            headers,
        },
        ResponseKind::ClientError | ResponseKind::ServerError => {
            let bytes = read_body(body, deadline).await?;
            let text = (!bytes.is_empty()).then(|| String::from_utf8_lossy(&bytes).into_owned());
            let message = error_message(&bytes).unwrap_or_else(|| reason(status));
            if kind == ResponseKind::ClientError {
                ResponseOutcome::ClientError {
                    message,
                    body: text,
                    status,
                    headers,
                }
            } else {
                ResponseOutcome::ServerError {
                    message,
                    body: text,
                    status,
                    headers,
                }
            }
        }
    };
    Ok(Err(outcome))
}

/// Decode a single value from a successful body.
fn decode_value<T: DeserializeOwned>(
    media: Option<&str>,
    body: &[u8],
) -> Result<Option<T>, WireError> {
    match media {
        None => Ok(None),
        Some(media) if is_json(media) => {
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            Ok(Some(serialization::from_slice(body)?))
        }
        Some(TEXT_PLAIN) => {
            let text = String::from_utf8_lossy(body).into_owned();
            Ok(Some(serialization::from_value(Value::String(text))?))
        }
        Some(other) => Err(unsupported(other.to_owned())),
    }
}

/// The daemon's error message, when the body carries one.
fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<DaemonMessage>(body)
        .ok()
        .map(|parsed| parsed.message)
        .filter(|message| !message.is_empty())
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_owned()
}

async fn read_body(body: Incoming, deadline: CallDeadline) -> Result<Bytes, WireError> {
    let collected = deadline
        .run(body.collect())
        .await?
        .map_err(|error| DecodeError::from(io::Error::other(error)))?;
    Ok(collected.to_bytes())
}

fn body_reader(body: Incoming) -> impl tokio::io::AsyncRead + Send + 'static {
    StreamReader::new(body.into_data_stream().map_err(io::Error::other))
}

fn unsupported(content_type: String) -> WireError {
    ConfigError::UnsupportedContentType { content_type }.into()
}
