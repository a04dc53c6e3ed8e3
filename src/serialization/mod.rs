//! JSON encoding and decoding for daemon payloads.
//!
//! Request bodies and response values pass through the helpers in this module
//! so every failure carries the JSON field path where it happened. Adapters for
//! value types with a non-default wire form live in [`codecs`] and are applied
//! with `#[serde(with = "...")]` on the model field. [`IdResponse`] accepts both
//! shapes of the daemon's id payload.

pub mod codecs;
mod id_response;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use id_response::IdResponse;

use crate::error::DecodeError;

/// Serialise `value` to JSON bytes.
///
/// # Errors
///
/// Returns `DecodeError::Encode` naming the failing field when the value
/// cannot be represented as JSON.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, DecodeError> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::new(&mut buffer);
    serde_path_to_error::serialize(value, &mut serializer).map_err(|error| {
        DecodeError::Encode {
            message: format!("{} at '{}'", error.inner(), error.path()),
        }
    })?;
    Ok(buffer)
}

/// Serialise `value` to a JSON tree, for use as a structured request body.
///
/// # Errors
///
/// Returns `DecodeError::Encode` when the value cannot be represented as JSON.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, DecodeError> {
    serde_json::to_value(value).map_err(|error| DecodeError::Encode {
        message: error.to_string(),
    })
}

/// Decode one JSON document from `bytes`.
///
/// Trailing whitespace is allowed, trailing data is not.
///
/// # Errors
///
/// Returns `DecodeError::MalformedJson` for syntax errors and
/// `DecodeError::Schema` with the field path when the document does not fit
/// `T`.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut deserializer).map_err(path_error)?;
    deserializer.end().map_err(|error| malformed(&error))?;
    Ok(value)
}

/// Convert an already parsed JSON tree into `T`.
///
/// # Errors
///
/// Returns `DecodeError::Schema` with the field path when the tree does not
/// fit `T`.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    serde_path_to_error::deserialize(value).map_err(path_error)
}

fn path_error(error: serde_path_to_error::Error<serde_json::Error>) -> DecodeError {
    let path = error.path().to_string();
    let inner = error.into_inner();
    if inner.is_syntax() || inner.is_eof() {
        malformed(&inner)
    } else {
        DecodeError::Schema {
            path,
            message: inner.to_string(),
        }
    }
}

pub(crate) fn malformed(error: &serde_json::Error) -> DecodeError {
    DecodeError::MalformedJson {
        message: error.to_string(),
    }
}
