//! Queue client implementations.
//!
//! This module contains concrete implementations of the
//! [`QueueClient`](crate::client::QueueClient) trait.

pub mod sqs;

pub use sqs::SqsClient;
