//! Id payload returned by create-style endpoints.
//!
//! Current daemons answer `{"Id": "..."}`; some older endpoints answer
//! `{"ID": "..."}`. Decoding tries the canonical shape first and falls back to
//! the legacy one, encoding is always canonical.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Identifier of a newly created daemon object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdResponse {
    /// The object id.
    pub id: String,
}

#[derive(Deserialize)]
struct LegacyIdResponse {
    #[serde(rename = "ID")]
    id: String,
}

impl IdResponse {
    fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        bollard::models::IdResponse::deserialize(value)
            .map(Self::from)
            .or_else(|_| LegacyIdResponse::deserialize(value).map(|legacy| Self { id: legacy.id }))
    }
}

impl<'de> Deserialize<'de> for IdResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(|_| {
            de::Error::custom("expected an object with an \"Id\" or \"ID\" string field")
        })
    }
}

impl Serialize for IdResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        bollard::models::IdResponse {
            id: self.id.clone(),
        }
        .serialize(serializer)
    }
}

impl From<bollard::models::IdResponse> for IdResponse {
    fn from(value: bollard::models::IdResponse) -> Self {
        Self { id: value.id }
    }
}

impl From<IdResponse> for bollard::models::IdResponse {
    fn from(value: IdResponse) -> Self {
        Self { id: value.id }
    }
}
