//! Media types and repair of missing `Content-Type` headers.
//!
//! Some daemon endpoints stream JSON or raw output without declaring a content
//! type. A request can carry a [`ContentTypeFallback`] in its extensions; when
//! the successful response has no `Content-Type`, [`enforce`] sets the
//! fallback so decoding can pick the right codec. The tag never goes on the
//! wire.

use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::{Response, StatusCode};
use tracing::debug;

/// `application/json`.
pub const APPLICATION_JSON: &str = "application/json";

/// `application/octet-stream`.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// `text/plain`.
pub const TEXT_PLAIN: &str = "text/plain";

/// Unframed process output.
pub const RAW_STREAM: &str = "application/vnd.docker.raw-stream";

/// Process output with 8-byte stream headers.
pub const MULTIPLEXED_STREAM: &str = "application/vnd.docker.multiplexed-stream";

/// Content type to assume when a successful response declares none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeFallback {
    media_type: String,
}

impl ContentTypeFallback {
    /// Tag a request with `media_type`. Returns `None` for an empty value.
    #[must_use]
    pub fn new(media_type: &str) -> Option<Self> {
        let trimmed = media_type.trim();
        (!trimmed.is_empty()).then(|| Self {
            media_type: trimmed.to_owned(),
        })
    }

    /// The fallback media type.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

/// Lower-cased media type without parameters, e.g. `application/json` for
/// `Application/JSON; charset=utf-8`.
#[must_use]
pub fn essence(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether `media_type` denotes JSON (`application/json` or a `+json`
/// suffix).
#[must_use]
pub fn is_json(media_type: &str) -> bool {
    let essence = essence(media_type);
    essence == APPLICATION_JSON || essence.ends_with("+json")
}

/// The response's media type, if it declares one.
#[must_use]
pub fn media_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(essence)
        .filter(|essence| !essence.is_empty())
}

/// Set the fallback `Content-Type` on a successful response that lacks one.
///
/// Applies only when a fallback is given, the status is 2xx other than 204,
/// and no `Content-Type` header is present. Returns whether the header was
/// set.
pub fn enforce<B>(response: &mut Response<B>, fallback: Option<&ContentTypeFallback>) -> bool {
    let Some(fallback) = fallback else {
        return false;
    };
    let status = response.status();
    if !status.is_success() || status == StatusCode::NO_CONTENT {
        return false;
    }
    if response.headers().contains_key(CONTENT_TYPE) {
        return false;
    }
    let Ok(value) = HeaderValue::from_str(fallback.media_type()) else {
        return false;
    };
    debug!(
        status = status.as_u16(),
        content_type = fallback.media_type(),
        "response has no content type, applying fallback"
    );
    response.headers_mut().insert(CONTENT_TYPE, value);
    true
}
