//! Buffered single-use message publisher.
//!
//! A [`MessageWriter`] collects one message body and its attributes, then
//! publishes it with [`MessageWriter::close`]. A writer publishes at most
//! once: every write, attribute change or close after the first close fails
//! with [`WriterError::Closed`], whether or not the publish succeeded.
//!
//! ```no_run
//! use sqs_msg::{QueueUrl, SqsConfig, Topic};
//! use std::io::Write;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let topic = Topic::connect(
//!     &SqsConfig::from_env()?,
//!     QueueUrl::new("https://sqs.us-west-2.amazonaws.com/123456789012/orders")?,
//! )?;
//!
//! let writer = topic.new_writer();
//! writer.set_attribute("event", "order.created")?;
//! write!(&writer, "{{\"order\": {}}}", 42)?;
//! let message_id = writer.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::client::QueueClient;
use crate::config::SqsConfig;
use crate::error::{QueueError, SerializationError, WriterError};
use crate::message::{
    Attributes, MessageAttributeValue, MessageId, QueueUrl, SendMessageRequest, MAX_DELAY_SECONDS,
};
use crate::providers::SqsClient;
use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;

// ============================================================================
// Topic
// ============================================================================

/// Publishing endpoint for a single queue
#[derive(Clone)]
pub struct Topic {
    client: Arc<dyn QueueClient>,
    queue_url: QueueUrl,
}

impl Topic {
    pub fn new(client: Arc<dyn QueueClient>, queue_url: QueueUrl) -> Self {
        Self { client, queue_url }
    }

    /// Create a topic backed by an [`SqsClient`]
    pub fn connect(sqs: &SqsConfig, queue_url: QueueUrl) -> Result<Self, QueueError> {
        let client = SqsClient::new(sqs)?;
        Ok(Self::new(Arc::new(client), queue_url))
    }

    pub fn queue_url(&self) -> &QueueUrl {
        &self.queue_url
    }

    /// Start a new outbound message
    pub fn new_writer(&self) -> MessageWriter {
        MessageWriter {
            client: Arc::clone(&self.client),
            queue_url: self.queue_url.clone(),
            state: Mutex::new(WriterState::default()),
        }
    }
}

impl std::fmt::Debug for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("queue_url", &self.queue_url)
            .finish()
    }
}

// ============================================================================
// Message Writer
// ============================================================================

#[derive(Debug, Default)]
struct WriterState {
    buffer: Vec<u8>,
    attributes: Attributes,
    delay: Duration,
    closed: bool,
}

/// Accumulates one outbound message and publishes it on close
pub struct MessageWriter {
    client: Arc<dyn QueueClient>,
    queue_url: QueueUrl,
    state: Mutex<WriterState>,
}

impl MessageWriter {
    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state, failing if the writer has been closed
    fn lock_open(&self) -> Result<MutexGuard<'_, WriterState>, WriterError> {
        let state = self.lock();
        if state.closed {
            return Err(WriterError::Closed);
        }
        Ok(state)
    }

    /// Append `buf` to the message body
    pub fn write(&self, buf: &[u8]) -> Result<usize, WriterError> {
        let mut state = self.lock_open()?;
        state.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Replace all values of attribute `key`
    pub fn set_attribute(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), WriterError> {
        self.lock_open()?.attributes.set(key, value);
        Ok(())
    }

    /// Append a value to attribute `key`
    pub fn add_attribute(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), WriterError> {
        self.lock_open()?.attributes.add(key, value);
        Ok(())
    }

    /// Snapshot of the attributes set so far
    pub fn attributes(&self) -> Attributes {
        self.lock().attributes.clone()
    }

    /// Delay delivery of the message; clamped to 0..=900 seconds
    pub fn set_delay(&self, delay: chrono::Duration) -> Result<(), WriterError> {
        let seconds = delay.num_seconds().clamp(0, i64::from(MAX_DELAY_SECONDS));
        self.lock_open()?.delay = Duration::from_secs(seconds as u64);
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        self.lock().delay
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Publish the message
    ///
    /// The writer is marked closed before sending, so a failed send cannot be
    /// retried through the same writer.
    ///
    /// # Errors
    ///
    /// - [`WriterError::Closed`] if `close` was already called
    /// - [`WriterError::Serialization`] if the body is not UTF-8
    /// - [`WriterError::Send`] with the queue client's error
    pub async fn close(&self) -> Result<MessageId, WriterError> {
        let (buffer, attributes, delay) = {
            let mut state = self.lock_open()?;
            state.closed = true;
            (
                std::mem::take(&mut state.buffer),
                state.attributes.clone(),
                state.delay,
            )
        };

        let body = String::from_utf8(buffer).map_err(|_| SerializationError::InvalidUtf8)?;
        let request = SendMessageRequest {
            queue_url: self.queue_url.clone(),
            body,
            delay_seconds: delay.as_secs() as u32,
            attributes: build_sqs_attributes(&attributes),
        };

        let message_id = self.client.send_message(request).await?;
        debug!(
            queue_url = %self.queue_url,
            message_id = %message_id,
            delay_seconds = delay.as_secs(),
            "Message published"
        );

        Ok(message_id)
    }
}

impl std::fmt::Debug for MessageWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MessageWriter")
            .field("queue_url", &self.queue_url)
            .field("buffered_bytes", &state.buffer.len())
            .field("attributes", &state.attributes)
            .field("delay", &state.delay)
            .field("closed", &state.closed)
            .finish()
    }
}

impl io::Write for &MessageWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        MessageWriter::write(*self, buf).map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Encode attributes as string-typed SQS attributes, joining multiple values
/// with commas
pub fn build_sqs_attributes(attributes: &Attributes) -> BTreeMap<String, MessageAttributeValue> {
    attributes
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| (key.clone(), MessageAttributeValue::string(values.join(","))))
        .collect()
}
