//! Field adapters for value types whose wire form differs from serde's default.
//!
//! Each submodule exposes `serialize` and `deserialize` functions and is used
//! as `#[serde(with = "podwire::serialization::codecs::base64_bytes")]`.
//! [`empty_as_none`] is deserialise-only and is used with
//! `#[serde(default, deserialize_with = "...")]`.

use std::fmt;

use serde::de::{self, Visitor};

/// Byte arrays as standard-alphabet base64 strings.
pub mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Encode bytes as a base64 string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Decode a base64 string into bytes.
    ///
    /// # Errors
    ///
    /// Fails when the input is not a string or not valid base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(de::Error::custom)
    }
}

/// Byte arrays as lowercase hex strings.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Encode bytes as a hex string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Decode a hex string into bytes.
    ///
    /// # Errors
    ///
    /// Fails when the input is not a string or not valid hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(de::Error::custom)
    }
}

/// Arbitrary-precision integers as decimal strings.
///
/// Plain JSON integers are accepted when decoding.
pub mod big_int {
    use std::str::FromStr;

    use num_bigint::BigInt;
    use serde::{Deserializer, Serializer, de};

    use super::NumberOrString;

    /// Encode as a decimal string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Decode from a decimal string or JSON integer.
    ///
    /// # Errors
    ///
    /// Fails when the text is not an integer.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let text = deserializer.deserialize_any(NumberOrString { integral: true })?;
        BigInt::from_str(&text).map_err(de::Error::custom)
    }
}

/// Arbitrary-precision decimals as decimal strings.
///
/// Plain JSON numbers are accepted when decoding.
pub mod big_decimal {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use serde::{Deserializer, Serializer, de};

    use super::NumberOrString;

    /// Encode as a decimal string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Decode from a decimal string or JSON number.
    ///
    /// # Errors
    ///
    /// Fails when the text is not a decimal number.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BigDecimal, D::Error> {
        let text = deserializer.deserialize_any(NumberOrString { integral: false })?;
        BigDecimal::from_str(&text).map_err(de::Error::custom)
    }
}

/// Offset date-times as RFC 3339 strings with nanosecond precision.
pub mod offset_date_time {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Encode as RFC 3339, `Z` for a zero offset.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        value: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    /// Decode an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Fails when the text is not RFC 3339.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&text).map_err(de::Error::custom)
    }
}

/// Local date-times without an offset, e.g. `2024-03-01T12:30:00.500`.
pub mod local_date_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    /// Encode as `YYYY-MM-DDTHH:MM:SS[.fraction]`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    /// Decode a local date-time string.
    ///
    /// # Errors
    ///
    /// Fails when the text does not match the format.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, FORMAT).map_err(de::Error::custom)
    }
}

/// Calendar dates as `YYYY-MM-DD`.
pub mod local_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%Y-%m-%d";

    /// Encode as `YYYY-MM-DD`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    /// Decode a `YYYY-MM-DD` string.
    ///
    /// # Errors
    ///
    /// Fails when the text does not match the format.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&text, FORMAT).map_err(de::Error::custom)
    }
}

/// Decode an optional string-valued enum, treating `""` like `null`.
///
/// The daemon sends an empty string for "unset" on several enum fields.
///
/// # Errors
///
/// Fails when a non-empty value is not a variant of `T`.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: de::Deserializer<'de>,
    T: de::DeserializeOwned,
{
    let raw: Option<String> = de::Deserialize::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(text) if text.is_empty() => Ok(None),
        Some(text) => {
            let variant: de::value::StringDeserializer<D::Error> =
                de::IntoDeserializer::into_deserializer(text);
            T::deserialize(variant).map(Some)
        }
    }
}

/// Accepts a JSON string or number and yields its decimal text.
struct NumberOrString {
    integral: bool,
}

impl Visitor<'_> for NumberOrString {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.integral {
            formatter.write_str("an integer or a decimal string")
        } else {
            formatter.write_str("a number or a decimal string")
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(value.to_owned())
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(value.to_string())
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(value.to_string())
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        if self.integral {
            return Err(E::invalid_type(de::Unexpected::Float(value), &self));
        }
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
    use num_bigint::BigInt;
    use rstest::rstest;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use uuid::Uuid;

    use crate::serialization::{from_slice, from_value, to_vec};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        #[serde(with = "super::base64_bytes")]
        data: Vec<u8>,
        #[serde(with = "super::hex_bytes")]
        digest: Vec<u8>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quota {
        #[serde(with = "super::big_int")]
        bytes: BigInt,
        #[serde(with = "super::big_decimal")]
        ratio: BigDecimal,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamps {
        #[serde(with = "super::offset_date_time")]
        created: DateTime<FixedOffset>,
        #[serde(with = "super::local_date_time")]
        started: NaiveDateTime,
        #[serde(with = "super::local_date")]
        day: NaiveDate,
        id: Uuid,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    enum RestartPolicy {
        #[serde(rename = "always")]
        Always,
        #[serde(rename = "on-failure")]
        OnFailure,
    }

    #[derive(Debug, Deserialize)]
    struct HostConfig {
        #[serde(default, deserialize_with = "super::empty_as_none")]
        restart: Option<RestartPolicy>,
    }

    #[rstest]
    fn byte_fields_use_base64_and_hex() {
        let blob = Blob {
            data: b"hello".to_vec(),
            digest: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let Ok(encoded) = to_vec(&blob) else {
            panic!("encoding failed");
        };
        assert_eq!(
            String::from_utf8_lossy(&encoded),
            r#"{"data":"aGVsbG8=","digest":"deadbeef"}"#
        );
        let Ok(decoded) = from_slice::<Blob>(&encoded) else {
            panic!("decoding failed");
        };
        assert_eq!(decoded, blob);
    }

    #[rstest]
    fn big_numbers_encode_as_strings_and_accept_numbers() {
        let Ok(quota) = from_value::<Quota>(json!({ "bytes": 42, "ratio": "0.125" })) else {
            panic!("decoding failed");
        };
        assert_eq!(quota.bytes, BigInt::from(42));

        let Ok(encoded) = to_vec(&quota) else {
            panic!("encoding failed");
        };
        assert_eq!(
            String::from_utf8_lossy(&encoded),
            r#"{"bytes":"42","ratio":"0.125"}"#
        );
    }

    #[rstest]
    fn big_int_rejects_fractional_numbers() {
        let result = from_value::<Quota>(json!({ "bytes": 1.5, "ratio": "1" }));
        assert!(result.is_err());
    }

    #[rstest]
    fn big_int_handles_values_beyond_u64() {
        let Ok(quota) = from_slice::<Quota>(
            br#"{"bytes":"123456789012345678901234567890","ratio":2}"#,
        ) else {
            panic!("decoding failed");
        };
        assert_eq!(quota.bytes.to_string(), "123456789012345678901234567890");
        assert_eq!(quota.ratio, BigDecimal::from(2));
    }

    #[rstest]
    fn date_fields_round_trip_through_their_formats() {
        let input = json!({
            "created": "2024-03-01T12:30:00.123456789+02:00",
            "started": "2024-03-01T12:30:00.500",
            "day": "2024-03-01",
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        });
        let Ok(stamps) = from_value::<Stamps>(input.clone()) else {
            panic!("decoding failed");
        };
        let Ok(encoded) = to_vec(&stamps) else {
            panic!("encoding failed");
        };
        let Ok(reparsed) = from_slice::<serde_json::Value>(&encoded) else {
            panic!("re-parse failed");
        };
        assert_eq!(reparsed, input);
    }

    #[rstest]
    fn utc_offsets_encode_with_zulu_suffix() {
        let Ok(stamps) = from_value::<Stamps>(json!({
            "created": "2024-03-01T00:00:00+00:00",
            "started": "2024-03-01T00:00:00",
            "day": "2024-03-01",
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        })) else {
            panic!("decoding failed");
        };
        let Ok(encoded) = to_vec(&stamps) else {
            panic!("encoding failed");
        };
        let text = String::from_utf8_lossy(&encoded);
        assert!(
            text.contains(r#""created":"2024-03-01T00:00:00.000000000Z""#),
            "unexpected encoding: {text}"
        );
    }

    #[rstest]
    #[case(json!({ "restart": "" }), None)]
    #[case(json!({ "restart": null }), None)]
    #[case(json!({}), None)]
    #[case(json!({ "restart": "on-failure" }), Some(RestartPolicy::OnFailure))]
    #[case(json!({ "restart": "always" }), Some(RestartPolicy::Always))]
    fn empty_strings_decode_as_absent_enums(
        #[case] input: serde_json::Value,
        #[case] expected: Option<RestartPolicy>,
    ) {
        let Ok(config) = from_value::<HostConfig>(input) else {
            panic!("decoding failed");
        };
        assert_eq!(config.restart, expected);
    }

    #[rstest]
    fn unknown_enum_value_reports_field_path() {
        let result = from_value::<HostConfig>(json!({ "restart": "sometimes" }));
        match result {
            Err(crate::error::DecodeError::Schema { path, .. }) => assert_eq!(path, "restart"),
            other => panic!("expected a schema error, got {other:?}"),
        }
    }
}
