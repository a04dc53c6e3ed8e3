//! Unit tests for response classification and single-value decoding.

use http::{HeaderMap, StatusCode};
use rstest::rstest;
use serde::Deserialize;

use super::{ResponseKind, ResponseOutcome, decode_value, error_message};
use crate::error::{ApiError, ConfigError, DecodeError, WireError};

#[derive(Debug, Deserialize, PartialEq, Eq)]
struct Version {
    #[serde(rename = "ApiVersion")]
    api_version: String,
}

#[rstest]
#[case(100, ResponseKind::Informational)]
#[case(199, ResponseKind::Informational)]
#[case(200, ResponseKind::Success)]
#[case(299, ResponseKind::Success)]
#[case(300, ResponseKind::Redirection)]
#[case(399, ResponseKind::Redirection)]
#[case(400, ResponseKind::ClientError)]
#[case(499, ResponseKind::ClientError)]
#[case(500, ResponseKind::ServerError)]
#[case(599, ResponseKind::ServerError)]
#[case(600, ResponseKind::ServerError)]
fn classify_respects_status_boundaries(#[case] status: u16, #[case] expected: ResponseKind) {
    assert_eq!(ResponseKind::classify(status), expected);
}

#[rstest]
fn into_data_returns_success_payload() {
    let outcome = ResponseOutcome::Success {
        data: Some(7_u32),
        status: StatusCode::OK,
        headers: HeaderMap::new(),
    };
    assert_eq!(outcome.kind(), ResponseKind::Success);
    assert!(outcome.is_success());
    assert_eq!(outcome.into_data().ok(), Some(Some(7)));
}

#[rstest]
fn into_data_turns_client_error_into_api_error() {
    let outcome: ResponseOutcome<()> = ResponseOutcome::ClientError {
        message: String::from("no such container: c1"),
        body: Some(String::from(r#"{"message":"no such container: c1"}"#)),
        status: StatusCode::NOT_FOUND,
        headers: HeaderMap::new(),
    };
    assert_eq!(outcome.status(), StatusCode::NOT_FOUND);
    let Err(ApiError::Client { status, message, body }) = outcome.into_data() else {
        panic!("expected a client error");
    };
    assert_eq!(status, 404);
    assert_eq!(message, "no such container: c1");
    assert!(body.is_some());
}

#[rstest]
#[case(StatusCode::MOVED_PERMANENTLY, "redirection")]
#[case(StatusCode::CONTINUE, "informational")]
fn into_data_rejects_unfollowed_outcomes(#[case] status: StatusCode, #[case] kind: &str) {
    let outcome: ResponseOutcome<()> = if status.is_redirection() {
        ResponseOutcome::Redirection {
            status,
            headers: HeaderMap::new(),
        }
    } else {
        ResponseOutcome::Informational {
            message: String::from("Continue"),
            status,
            headers: HeaderMap::new(),
        }
    };
    let Err(ApiError::Unsupported { kind: actual, .. }) = outcome.into_data() else {
        panic!("expected an unsupported outcome error");
    };
    assert_eq!(actual, kind);
}

#[rstest]
fn error_message_prefers_daemon_message() {
    assert_eq!(
        error_message(br#"{"message":"conflict: name in use"}"#).as_deref(),
        Some("conflict: name in use")
    );
    assert_eq!(error_message(b"plain failure"), None);
    assert_eq!(error_message(br#"{"message":""}"#), None);
}

#[rstest]
fn decode_value_parses_json() {
    let decoded: Option<Version> =
        decode_value(Some("application/json"), br#"{"ApiVersion":"1.41"}"#)
            .expect("JSON should decode");
    assert_eq!(
        decoded,
        Some(Version {
            api_version: String::from("1.41")
        })
    );
}

#[rstest]
#[case(None, b"{\"ApiVersion\":\"1.41\"}".as_slice())]
#[case(Some("application/json"), b"".as_slice())]
#[case(Some("application/json"), b" \n".as_slice())]
fn decode_value_yields_none_without_data(#[case] media: Option<&str>, #[case] body: &[u8]) {
    let decoded: Option<Version> = decode_value(media, body).expect("decode should succeed");
    assert!(decoded.is_none());
}

#[rstest]
fn decode_value_reads_text_plain_as_json_string() {
    let decoded: Option<String> =
        decode_value(Some("text/plain"), b"OK").expect("text should decode");
    assert_eq!(decoded.as_deref(), Some("OK"));
}

#[rstest]
fn decode_value_rejects_other_media_types() {
    let result: Result<Option<String>, WireError> = decode_value(Some("text/html"), b"<p>");
    assert!(matches!(
        result,
        Err(WireError::Config(ConfigError::UnsupportedContentType { ref content_type }))
            if content_type == "text/html"
    ));
}

#[rstest]
fn decode_value_reports_schema_path() {
    let result: Result<Option<Version>, WireError> =
        decode_value(Some("application/json"), br#"{"ApiVersion":41}"#);
    assert!(
        matches!(
            result,
            Err(WireError::Decode(DecodeError::Schema { ref path, .. })) if path == "ApiVersion"
        ),
        "unexpected: {result:?}"
    );
}
