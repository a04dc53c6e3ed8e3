//! Request descriptors and their conversion into HTTP requests.
//!
//! Endpoint helpers describe a call with a [`RequestDescriptor`]: method, path
//! with placeholders already filled, ordered query parameters, headers and an
//! optional body. [`RequestBuilder`] turns a descriptor into a
//! `http::Request` addressed at the daemon, adding the API version prefix and
//! the default `Content-Type` and `Accept` headers.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use futures_util::TryStreamExt;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::uri::PathAndQuery;
use http::{Request, Uri};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use serde::Serialize;
use serde_json::Value;
use tokio_util::io::ReaderStream;

use super::content_type::{APPLICATION_JSON, ContentTypeFallback, OCTET_STREAM, is_json};
use crate::error::{ConfigError, DecodeError, WireError};
use crate::serialization;


/// Body type sent to the daemon.
pub type Body = UnsyncBoxBody<Bytes, io::Error>;

/// HTTP method of a daemon call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
            Method::Head => Self::HEAD,
            Method::Options => Self::OPTIONS,
        }
    }
}

/// Payload of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body; no bytes are sent.
    #[default]
    Empty,
    /// Raw bytes sent as-is.
    Bytes(Bytes),
    /// A file streamed as-is, e.g. a build context archive.
    File(Utf8PathBuf),
    /// A structured value, serialised as JSON.
    Json(Value),
}

impl RequestBody {
    const fn is_raw(&self) -> bool {
        matches!(self, Self::Bytes(_) | Self::File(_))
    }
}

/// Everything needed to issue one daemon call.
///
/// Built with the consuming setters below; there is no way to change a
/// descriptor once it has been handed to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, Vec<String>)>,
    headers: Vec<(String, String)>,
    body: RequestBody,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Start a descriptor for `method` on `path`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    /// Shorthand for a `GET` descriptor.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Shorthand for a `POST` descriptor.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Shorthand for a `DELETE` descriptor.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query value. Repeating a key adds another value under it;
    /// keys keep the order of their first appearance.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.query.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, values)) => values.push(value),
            None => self.query.push((key, vec![value])),
        }
        self
    }

    /// Set a header, replacing any existing value under the same name
    /// regardless of case.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Serialise `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Encode` when the value cannot be represented as
    /// JSON.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, DecodeError> {
        Ok(self.body(RequestBody::Json(serialization::to_value(value)?)))
    }

    /// Override the client's request timeout for this call.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request path, without the API version prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in insertion order.
    #[must_use]
    pub fn query_params(&self) -> &[(String, Vec<String>)] {
        &self.query
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Request body.
    #[must_use]
    pub const fn request_body(&self) -> &RequestBody {
        &self.body
    }

    /// Per-call timeout override.
    #[must_use]
    pub const fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Normalise an API version to the `v1.41` form used in paths.
///
/// Surrounding slashes and whitespace are removed and a missing `v` prefix is
/// added. Returns `None` for an empty version.
#[must_use]
pub fn normalize_api_version(version: &str) -> Option<String> {
    let trimmed = version.trim().trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        Some(format!("v{trimmed}"))
    } else {
        Some(trimmed.to_owned())
    }
}

/// Converts descriptors into requests addressed at one daemon.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base: Uri,
    api_version: Option<String>,
}

impl RequestBuilder {
    /// Create a builder for the daemon at `base` (scheme and authority).
    #[must_use]
    pub fn new(base: Uri, api_version: Option<&str>) -> Self {
        Self {
            base,
            api_version: api_version.and_then(normalize_api_version),
        }
    }

    /// API version prefix, e.g. `v1.41`.
    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Full request URI for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRequest` when the path cannot form a URI.
    pub fn uri(&self, descriptor: &RequestDescriptor) -> Result<Uri, ConfigError> {
        let path = join_path(self.api_version.as_deref(), descriptor.path());
        let query = encode_query(descriptor.query_params());
        let path_and_query = if query.is_empty() {
            path
        } else {
            format!("{path}?{query}")
        };

        let mut parts = self.base.clone().into_parts();
        parts.path_and_query = Some(
            PathAndQuery::try_from(path_and_query.as_str())
                .map_err(|error| invalid_request(&path_and_query, &error))?,
        );
        Uri::from_parts(parts).map_err(|error| invalid_request(&path_and_query, &error))
    }

    /// Build the HTTP request for `descriptor`.
    ///
    /// `fallback` is attached as a [`ContentTypeFallback`] extension when it
    /// is non-empty.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingHeader` when `Content-Type` or `Accept` is
    /// empty, `ConfigError::UnsupportedContentType` when a structured body is
    /// paired with a non-JSON content type, and `ConfigError::InvalidRequest`
    /// when the URI, headers or body file are unusable.
    pub async fn build(
        &self,
        descriptor: &RequestDescriptor,
        fallback: Option<&str>,
    ) -> Result<Request<Body>, WireError> {
        let uri = self.uri(descriptor)?;
        let body = descriptor.request_body();
        let default_content_type = if body.is_raw() {
            OCTET_STREAM
        } else {
            APPLICATION_JSON
        };
        let content_type = required_header(
            descriptor,
            CONTENT_TYPE.as_str(),
            "Content-Type",
            default_content_type,
        )?;
        let accept = required_header(descriptor, ACCEPT.as_str(), "Accept", APPLICATION_JSON)?;

        if matches!(body, RequestBody::Json(_)) && !is_json(content_type) {
            return Err(ConfigError::UnsupportedContentType {
                content_type: content_type.to_owned(),
            }
            .into());
        }

        let mut builder = Request::builder()
            .method(http::Method::from(descriptor.method()))
            .uri(uri);
        for (name, value) in &descriptor.headers {
            if name.eq_ignore_ascii_case(CONTENT_TYPE.as_str())
                || name.eq_ignore_ascii_case(ACCEPT.as_str())
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = builder
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, accept);

        let mut request = builder
            .body(encode_body(body).await?)
            .map_err(|error| invalid_request(descriptor.path(), &error))?;
        if let Some(tag) = fallback.and_then(ContentTypeFallback::new) {
            request.extensions_mut().insert(tag);
        }
        Ok(request)
    }
}

fn required_header<'a>(
    descriptor: &'a RequestDescriptor,
    name: &str,
    display_name: &str,
    default: &'a str,
) -> Result<&'a str, ConfigError> {
    let value = descriptor.header_value(name).unwrap_or(default).trim();
    if value.is_empty() {
        return Err(ConfigError::MissingHeader {
            header: display_name.to_owned(),
        });
    }
    Ok(value)
}

fn join_path(api_version: Option<&str>, path: &str) -> String {
    let segments: Vec<&str> = api_version
        .into_iter()
        .chain(path.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

fn encode_query(query: &[(String, Vec<String>)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, values) in query {
        for value in values {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

async fn encode_body(body: &RequestBody) -> Result<Body, WireError> {
    let encoded = match body {
        RequestBody::Empty => Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync(),
        RequestBody::Bytes(bytes) => full(bytes.clone()),
        RequestBody::Json(value) => full(Bytes::from(serialization::to_vec(value)?)),
        RequestBody::File(path) => file_body(path).await?,
    };
    Ok(encoded)
}

fn full(bytes: Bytes) -> Body {
    Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
}

async fn file_body(path: &Utf8Path) -> Result<Body, ConfigError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|error| ConfigError::InvalidRequest {
            message: format!("failed to open request body '{path}': {error}"),
        })?;
    let frames = ReaderStream::new(file).map_ok(hyper::body::Frame::data);
    Ok(StreamBody::new(frames).boxed_unsync())
}

fn invalid_request(target: &str, error: &dyn std::fmt::Display) -> ConfigError {
    ConfigError::InvalidRequest {
        message: format!("{target}: {error}"),
    }
}
