//! Tests for error types.

use super::*;

#[test]
fn test_error_transience() {
    assert!(QueueError::ConnectionFailed {
        message: "network error".to_string(),
    }
    .is_transient());

    assert!(!QueueError::QueueNotFound {
        message: "test".to_string(),
    }
    .is_transient());

    assert!(!QueueError::AuthenticationFailed {
        message: "AccessDenied".to_string(),
    }
    .is_transient());

    assert!(!QueueError::MessageTooLarge {
        size: 1000,
        max_size: 500
    }
    .is_transient());
}

#[test]
fn test_provider_error_transience_follows_status() {
    let throttled = QueueError::ProviderError {
        status: Some(429),
        code: "Throttling".to_string(),
        message: "slow down".to_string(),
    };
    assert!(throttled.is_transient());

    let unavailable = QueueError::ProviderError {
        status: Some(503),
        code: "ServiceUnavailable".to_string(),
        message: "try again".to_string(),
    };
    assert!(unavailable.is_transient());

    let bad_request = QueueError::ProviderError {
        status: Some(400),
        code: "InvalidParameterValue".to_string(),
        message: "bad".to_string(),
    };
    assert!(!bad_request.is_transient());
}

#[test]
fn test_writer_error_wraps_queue_error() {
    let err: WriterError = QueueError::ConnectionFailed {
        message: "reset".to_string(),
    }
    .into();

    assert!(matches!(err, WriterError::Send(_)));
    assert!(err.to_string().contains("reset"));
}

#[test]
fn test_closed_writer_message() {
    assert_eq!(WriterError::Closed.to_string(), "MessageWriter is closed");
}
