//! Error classification helpers for container engine connection failures.
//!
//! This module converts low-level HTTP client errors into semantic
//! `TransportError` variants so callers receive actionable diagnostics.

use std::error::Error;
use std::io;
use std::path::Path;

use crate::engine::transport::TransportConfig;
use crate::error::TransportError;

/// Classify an I/O error kind into a semantic `TransportError`.
///
/// Maps specific `ErrorKind` variants to their corresponding variants when a
/// socket path is available, falling back to `ConnectionFailed` for other
/// error kinds or network endpoints.
fn classify_io_error_kind(
    kind: io::ErrorKind,
    socket_path: Option<&Path>,
    error_msg: &str,
) -> TransportError {
    let connection_failed = || TransportError::ConnectionFailed {
        message: error_msg.to_owned(),
    };
    match kind {
        io::ErrorKind::PermissionDenied => socket_path.map_or_else(connection_failed, |path| {
            TransportError::PermissionDenied {
                path: path.to_path_buf(),
            }
        }),
        io::ErrorKind::NotFound => socket_path.map_or_else(connection_failed, |path| {
            TransportError::SocketNotFound {
                path: path.to_path_buf(),
            }
        }),
        _ => connection_failed(),
    }
}

/// Classify a failed request into a semantic `TransportError`.
///
/// The first `io::Error` in the source chain decides the variant; the message
/// joins every error in the chain.
pub(super) fn classify_request_error(
    error: &(dyn Error + 'static),
    transport: &TransportConfig,
) -> TransportError {
    let socket_path = transport.socket_path().map(Path::new);
    let message = chain_message(error);
    let kind = error
        .downcast_ref::<io::Error>()
        .map(io::Error::kind)
        .or_else(|| io_error_kind_in_chain(error));

    kind.map_or_else(
        || TransportError::ConnectionFailed {
            message: message.clone(),
        },
        |found| classify_io_error_kind(found, socket_path, &message),
    )
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn Error) -> Option<io::ErrorKind> {
    let mut current: Option<&(dyn Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}

fn chain_message(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        message.push_str(": ");
        message.push_str(&err.to_string());
        current = err.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use rstest::rstest;

    use super::*;

    #[derive(Debug)]
    struct ChainRootError {
        source: io::Error,
    }

    impl fmt::Display for ChainRootError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connect error")
        }
    }

    impl Error for ChainRootError {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.source)
        }
    }

    #[derive(Debug)]
    struct TopLevelError {
        source: ChainRootError,
    }

    impl fmt::Display for TopLevelError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "client error")
        }
    }

    impl Error for TopLevelError {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.source)
        }
    }

    fn nested(kind: io::ErrorKind) -> TopLevelError {
        TopLevelError {
            source: ChainRootError {
                source: io::Error::new(kind, "boom"),
            },
        }
    }

    fn transport(endpoint: &str) -> TransportConfig {
        TransportConfig::from_endpoint(endpoint).expect("endpoint should parse")
    }

    #[test]
    fn io_error_kind_in_chain_finds_nested_io_error_kind() {
        assert_eq!(
            io_error_kind_in_chain(&nested(io::ErrorKind::PermissionDenied)),
            Some(io::ErrorKind::PermissionDenied)
        );
    }

    #[rstest]
    fn not_found_on_socket_is_socket_not_found() {
        let error = nested(io::ErrorKind::NotFound);
        let classified =
            classify_request_error(&error, &transport("unix:///run/podman/podman.sock"));
        assert!(
            matches!(
                classified,
                TransportError::SocketNotFound { ref path } if path == Path::new("/run/podman/podman.sock")
            ),
            "unexpected: {classified:?}"
        );
    }

    #[rstest]
    fn permission_denied_on_socket_is_permission_denied() {
        let error = nested(io::ErrorKind::PermissionDenied);
        let classified = classify_request_error(&error, &transport("/var/run/docker.sock"));
        assert!(matches!(
            classified,
            TransportError::PermissionDenied { .. }
        ));
    }

    #[rstest]
    #[case(io::ErrorKind::NotFound)]
    #[case(io::ErrorKind::ConnectionRefused)]
    fn tcp_failures_are_connection_failed_with_chain_message(#[case] kind: io::ErrorKind) {
        let error = nested(kind);
        let classified = classify_request_error(&error, &transport("tcp://127.0.0.1:2375"));
        let TransportError::ConnectionFailed { message } = classified else {
            panic!("expected ConnectionFailed");
        };
        assert_eq!(message, "client error: connect error: boom");
    }
}
