//! Tests for message types and identifiers.

use super::*;

#[test]
fn test_queue_url_validation() {
    // Valid URLs
    assert!(QueueUrl::new("https://sqs.us-west-2.amazonaws.com/123456789012/orders").is_ok());
    assert!(QueueUrl::new("http://localhost:9324/queue/default").is_ok());

    // Invalid URLs
    assert!(matches!(
        QueueUrl::new(""),
        Err(ValidationError::Required { .. })
    ));
    assert!(QueueUrl::new("orders").is_err());
    assert!(QueueUrl::new("ftp://example.com/orders").is_err());
}

#[test]
fn test_identifiers_reject_empty_values() {
    assert!("".parse::<MessageId>().is_err());
    assert!("".parse::<ReceiptHandle>().is_err());

    let id: MessageId = "5fea7756-0ea4-451a-a703-a558b933e274".parse().unwrap();
    assert_eq!(id.as_str(), "5fea7756-0ea4-451a-a703-a558b933e274");

    let handle: ReceiptHandle = "AQEBzbVv".parse().unwrap();
    assert_eq!(handle.to_string(), "AQEBzbVv");
}

#[test]
fn test_attributes_set_replaces_and_add_appends() {
    let mut attributes = Attributes::new();
    attributes.add("k", "a");
    attributes.add("k", "b");
    assert_eq!(attributes.get_all("k"), ["a".to_string(), "b".to_string()]);
    assert_eq!(attributes.get("k"), Some("a"));

    attributes.set("k", "c");
    assert_eq!(attributes.get_all("k"), ["c".to_string()]);

    assert_eq!(attributes.remove("k"), Some(vec!["c".to_string()]));
    assert!(attributes.is_empty());
    assert!(attributes.get_all("k").is_empty());
}

#[test]
fn test_message_from_received_message() {
    let mut received = ReceivedMessage::new(
        "handle-1".parse().unwrap(),
        Bytes::from_static(b"hello"),
    );
    received
        .message_attributes
        .insert("content-type".to_string(), "text/plain".to_string());
    received
        .system_attributes
        .insert("ApproximateReceiveCount".to_string(), "3".to_string());

    let message = Message::from(&received);

    assert_eq!(message.body, Bytes::from_static(b"hello"));
    assert_eq!(message.attributes.get("content-type"), Some("text/plain"));
    assert_eq!(message.attributes.len(), 1);
    assert_eq!(received.receive_count(), Some(3));
}

#[test]
fn test_receive_request_clamps_to_queue_limits() {
    let queue_url = QueueUrl::new("http://localhost:9324/queue/default").unwrap();

    let request = ReceiveRequest::all_attributes(queue_url.clone(), 50, 60);
    assert_eq!(request.max_messages, MAX_RECEIVE_MESSAGES);
    assert_eq!(request.wait_time_seconds, MAX_WAIT_TIME_SECONDS);
    assert_eq!(request.attribute_names, vec!["All".to_string()]);

    let request = ReceiveRequest::all_attributes(queue_url, 0, 5);
    assert_eq!(request.max_messages, 1);
    assert_eq!(request.wait_time_seconds, 5);
}

#[test]
fn test_string_attribute_value() {
    let value = MessageAttributeValue::string("a,b");
    assert_eq!(value.data_type, "String");
    assert_eq!(value.string_value, "a,b");
}
