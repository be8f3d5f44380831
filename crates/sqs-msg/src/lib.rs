//! # SQS Msg
//!
//! Consumer loop and message writer for AWS SQS.
//!
//! This library provides:
//! - A consumer [`Server`] that dispatches received messages to a [`Receiver`]
//!   under a fixed concurrency cap, deleting messages on success and shortening
//!   their visibility timeout on failure
//! - Two-phase cooperative shutdown with a deadline
//! - A single-use [`MessageWriter`] for publishing one message
//! - An SQS HTTP client whose retry policy also retries credential failures
//!   (HTTP 403) that occur while new credentials propagate
//!
//! Delivery is at-least-once. Messages are processed in parallel and in no
//! particular order.
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for queue, server and writer operations
//! - [`message`] - Message structures, attributes and queue identifiers
//! - [`client`] - The queue client abstraction
//! - [`providers`] - The SQS HTTP client
//! - [`retry`] - Retry policies
//! - [`config`] - Client and server configuration
//! - [`server`] - The consumer loop
//! - [`writer`] - The message writer

// Module declarations
pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod providers;
pub mod retry;
pub mod server;
pub mod writer;

// Re-export commonly used types at crate root for convenience
pub use client::QueueClient;
pub use config::{CredentialRetryConfig, ServerConfig, SqsConfig, MAX_CONCURRENCY};
pub use error::{
    ConfigurationError, QueueError, SerializationError, ServerError, ValidationError, WriterError,
};
pub use message::{Attributes, Message, MessageId, QueueUrl, ReceiptHandle, ReceivedMessage};
pub use providers::SqsClient;
pub use retry::{BackoffRetryPolicy, CredentialRetryPolicy, RetryPolicy};
pub use server::{Receiver, Server, ServerClosed, ServerState};
pub use writer::{MessageWriter, Topic};

/// Re-exported so handlers can name the receiver lifetime type
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
