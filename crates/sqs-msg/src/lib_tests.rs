//! Tests for the sqs-msg library root.

use super::*;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_root_exports_build_a_consumer() {
    let config = ServerConfig::new(
        QueueUrl::new("http://localhost:9324/queue/default").unwrap(),
        2,
        30,
    )
    .with_credential_retry(Duration::from_secs(1), 3);

    let server = Server::connect(&SqsConfig::default(), config).unwrap();

    assert_eq!(server.max_concurrency(), 2);
    assert_eq!(server.state(), ServerState::Running);
}

#[test]
fn test_root_exports_build_a_topic() {
    let client: Arc<dyn QueueClient> = Arc::new(SqsClient::new(&SqsConfig::default()).unwrap());
    let topic = Topic::new(
        client,
        QueueUrl::new("http://localhost:9324/queue/default").unwrap(),
    );

    let writer = topic.new_writer();
    assert!(!writer.is_closed());
    assert!(writer.attributes().is_empty());
}

#[test]
fn test_credential_policy_wraps_backoff() {
    let inner: Arc<dyn RetryPolicy> = Arc::new(BackoffRetryPolicy::with_max_retries(4));
    let policy = CredentialRetryPolicy::new(inner, Duration::from_millis(750));

    assert_eq!(policy.max_retries(), 4);
    assert_eq!(policy.delay(), Duration::from_millis(750));
}

#[test]
fn test_message_builder() {
    let message = Message::new("payload".into())
        .with_attribute("k", "a")
        .with_attribute("k", "b");

    assert_eq!(message.attributes.get_all("k"), ["a".to_string(), "b".to_string()]);
    assert_eq!(message.body, bytes::Bytes::from_static(b"payload"));
}

#[test]
fn test_server_closed_display() {
    assert_eq!(ServerClosed.to_string(), "server closed");
    assert_eq!(
        ServerError::DeadlineExceeded { in_flight: 2 }.to_string(),
        "Shutdown deadline exceeded with 2 handler(s) still running"
    );
}
