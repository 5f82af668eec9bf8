//! Unit tests for plugin error types.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::handshake::HandshakeError;
use crate::protocol::ExecutionErrorKind;

#[test]
fn discovery_error_message_includes_path() {
    let error = PluginError::Discovery {
        path: PathBuf::from("/opt/lazydb/plugins"),
        source: Arc::new(io::Error::from(io::ErrorKind::PermissionDenied)),
    };
    let message = error.to_string();
    assert!(
        message.contains("/opt/lazydb/plugins"),
        "expected path in message: {message}"
    );
}

#[test]
fn spawn_error_message_includes_details() {
    let error = PluginError::Spawn {
        name: "postgres".into(),
        message: "permission denied".into(),
        source: None,
    };
    let message = error.to_string();
    assert!(message.contains("postgres"), "expected name: {message}");
    assert!(
        message.contains("permission denied"),
        "expected detail: {message}"
    );
}

#[rstest]
#[case::timeout(
    PluginError::HandshakeTimeout {
        name: "slow".into(),
        timeout_ms: 4200,
    },
    "4200"
)]
#[case::frame_limit(
    PluginError::transport(
        "big",
        TransportError::FrameTooLarge { size: 99, limit: 10 },
    ),
    "99"
)]
#[case::rejected(
    PluginError::transport(
        "old",
        TransportError::Rejected { code: -32601, message: "unknown method".into() },
    ),
    "-32601"
)]
fn error_message_includes_numeric_field(#[case] error: PluginError, #[case] expected_value: &str) {
    let message = error.to_string();
    assert!(
        message.contains(expected_value),
        "expected {expected_value} in message: {message}"
    );
}

#[test]
fn handshake_error_wraps_detail() {
    let error = PluginError::Handshake {
        name: "mysql".into(),
        source: HandshakeError::VersionMismatch {
            expected: 1,
            found: 2,
        },
    };
    assert!(error.is_handshake());
    assert!(!error.is_transport());
    let message = error.to_string();
    assert!(message.contains("mysql"), "expected name: {message}");
}

#[test]
fn execution_error_names_its_kind() {
    let error = PluginError::execution(ExecutionErrorKind::NotConnected, "call connect first");
    assert!(error.is_backend());
    assert_eq!(
        error.to_string(),
        "query failed (not_connected): call connect first"
    );
}

#[test]
fn errors_are_send_sync_and_clone() {
    fn assert_traits<T: Send + Sync + Clone>() {}
    assert_traits::<PluginError>();
    assert_traits::<TransportError>();
}

#[test]
fn not_loaded_exposes_cause_as_source() {
    use std::error::Error as _;

    let cause = PluginError::HandshakeTimeout {
        name: "echo".into(),
        timeout_ms: 10,
    };
    let error = PluginError::NotLoaded {
        name: "echo".into(),
        cause: Some(Box::new(cause)),
    };
    let source = error.source().expect("cause should be exposed");
    assert!(source.to_string().contains("handshake"));
}

#[rstest]
#[case::eof(io::ErrorKind::UnexpectedEof)]
#[case::reset(io::ErrorKind::ConnectionReset)]
#[case::pipe(io::ErrorKind::BrokenPipe)]
fn disconnect_io_errors_become_connection_closed(#[case] kind: io::ErrorKind) {
    let error = TransportError::from(io::Error::from(kind));
    assert!(matches!(error, TransportError::ConnectionClosed));
}

#[test]
fn other_io_errors_are_wrapped() {
    let error = TransportError::from(io::Error::other("boom"));
    assert!(matches!(error, TransportError::Io(_)));
    assert!(error.is_fatal());
}

#[test]
fn rejected_calls_are_not_fatal() {
    let error = TransportError::Rejected {
        code: -32602,
        message: "bad params".into(),
    };
    assert!(!error.is_fatal());
}
