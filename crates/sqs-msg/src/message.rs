//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use url::Url;

/// Largest batch a single receive call may return
pub const MAX_RECEIVE_MESSAGES: u32 = 10;

/// Longest long-poll wait a single receive call may request
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

/// Longest delivery delay a message may carry
pub const MAX_DELAY_SECONDS: u32 = 900;

/// Data type tag used for every attribute the writer publishes
pub const STRING_DATA_TYPE: &str = "String";

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueUrl(String);

impl QueueUrl {
    /// Create new queue URL with validation
    pub fn new(url: impl Into<String>) -> Result<Self, ValidationError> {
        let url = url.into();
        if url.is_empty() {
            return Err(ValidationError::Required {
                field: "queue_url".to_string(),
            });
        }

        let parsed = Url::parse(&url).map_err(|e| ValidationError::InvalidFormat {
            field: "queue_url".to_string(),
            message: e.to_string(),
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ValidationError::InvalidFormat {
                field: "queue_url".to_string(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self(url))
    }

    /// Get queue URL as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueUrl {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for QueueUrl {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueUrl> for String {
    fn from(url: QueueUrl) -> Self {
        url.0
    }
}

/// Identifier assigned to a message by the queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Opaque token for acknowledging or retrying a received message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    /// Get handle string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReceiptHandle {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "receipt_handle".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// Message attributes: attribute name to an ordered list of string values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(HashMap<String, Vec<String>>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value stored for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values stored for `key`, in insertion order
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace all values of `key` with a single value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// Append a value to `key`
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (key, value) in iter {
            attributes.add(key, value);
        }
        attributes
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message handed to a [`Receiver`](crate::server::Receiver)
#[derive(Debug, Clone)]
pub struct Message {
    pub attributes: Attributes,
    pub body: Bytes,
}

impl Message {
    pub fn new(body: Bytes) -> Self {
        Self {
            attributes: Attributes::new(),
            body,
        }
    }

    /// Add message attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.add(key, value);
        self
    }
}

impl From<&ReceivedMessage> for Message {
    fn from(received: &ReceivedMessage) -> Self {
        let attributes = received
            .message_attributes
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            attributes,
            body: received.body.clone(),
        }
    }
}

/// A message as returned by a receive call, with its queue metadata
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: Option<MessageId>,
    pub receipt_handle: ReceiptHandle,
    pub body: Bytes,
    /// String-typed user attributes, one value per name
    pub message_attributes: HashMap<String, String>,
    /// Queue-maintained attributes such as `ApproximateReceiveCount`
    pub system_attributes: HashMap<String, String>,
}

impl ReceivedMessage {
    pub fn new(receipt_handle: ReceiptHandle, body: Bytes) -> Self {
        Self {
            message_id: None,
            receipt_handle,
            body,
            message_attributes: HashMap::new(),
            system_attributes: HashMap::new(),
        }
    }

    /// Number of times the queue has handed this message out
    pub fn receive_count(&self) -> Option<u32> {
        self.system_attributes
            .get("ApproximateReceiveCount")
            .and_then(|count| count.parse().ok())
    }
}

/// Typed attribute value as published to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttributeValue {
    pub data_type: String,
    pub string_value: String,
}

impl MessageAttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: STRING_DATA_TYPE.to_string(),
            string_value: value.into(),
        }
    }
}

/// Parameters of a single publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub queue_url: QueueUrl,
    pub body: String,
    pub delay_seconds: u32,
    pub attributes: BTreeMap<String, MessageAttributeValue>,
}

/// Parameters of a single receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub queue_url: QueueUrl,
    pub max_messages: u32,
    pub wait_time_seconds: u32,
    /// Message attribute names to return; `All` requests every attribute
    pub attribute_names: Vec<String>,
}

impl ReceiveRequest {
    /// Request up to `max_messages` with every attribute, clamped to queue limits
    pub fn all_attributes(queue_url: QueueUrl, max_messages: u32, wait_time_seconds: u32) -> Self {
        Self {
            queue_url,
            max_messages: max_messages.clamp(1, MAX_RECEIVE_MESSAGES),
            wait_time_seconds: wait_time_seconds.min(MAX_WAIT_TIME_SECONDS),
            attribute_names: vec!["All".to_string()],
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
