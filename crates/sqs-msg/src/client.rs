//! Queue client abstraction shared by the consumer loop and the message writer.

use crate::error::QueueError;
use crate::message::{
    MessageId, QueueUrl, ReceiptHandle, ReceiveRequest, ReceivedMessage, SendMessageRequest,
};
use async_trait::async_trait;

/// Operations the consumer loop and the writer need from a queue.
///
/// Implementations own connection-level concerns: authentication, wire
/// encoding and per-call retry. Callers treat every returned error as final.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Long-poll for up to `request.max_messages` messages
    async fn receive_messages(
        &self,
        request: ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Set how long a received message stays hidden from other receivers
    async fn change_visibility(
        &self,
        queue_url: &QueueUrl,
        receipt: &ReceiptHandle,
        timeout_seconds: u32,
    ) -> Result<(), QueueError>;

    /// Acknowledge a received message
    async fn delete_message(
        &self,
        queue_url: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError>;

    /// Publish a single message
    async fn send_message(&self, request: SendMessageRequest) -> Result<MessageId, QueueError>;
}
