//! Error types for queue, server and writer operations.

use thiserror::Error;

/// Errors returned by [`QueueClient`](crate::client::QueueClient) operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue not found: {message}")]
    QueueNotFound { message: String },

    #[error("Message not found or receipt expired: {receipt}")]
    MessageNotFound { receipt: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Provider error ({status:?}): {code} - {message}")]
    ProviderError {
        status: Option<u16>,
        code: String,
        message: String,
    },

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl QueueError {
    /// Check if error is transient and the operation may succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueNotFound { .. } => false,
            Self::MessageNotFound { .. } => false,
            Self::AuthenticationFailed { .. } => false,
            Self::ConnectionFailed { .. } => true,
            Self::MessageTooLarge { .. } => false,
            Self::ProviderError { status, .. } => match status {
                Some(code) => *code == 429 || *code >= 500,
                None => true,
            },
            Self::SerializationError(_) => false,
            Self::ConfigurationError(_) => false,
            Self::ValidationError(_) => false,
        }
    }
}

/// Errors during message encoding/decoding
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },
}

/// Errors surfaced by [`Server::serve`](crate::server::Server::serve) and
/// [`Server::shutdown`](crate::server::Server::shutdown).
///
/// A clean stop is not an error; it is reported as
/// [`ServerClosed`](crate::server::ServerClosed).
#[derive(Debug, Error)]
pub enum ServerError {
    /// Receiving a batch failed; the loop has stopped.
    #[error("Could not read from queue: {0}")]
    Receive(#[source] QueueError),

    /// The shutdown deadline elapsed before every in-flight handler finished.
    #[error("Shutdown deadline exceeded with {in_flight} handler(s) still running")]
    DeadlineExceeded { in_flight: usize },
}

/// Errors returned by [`MessageWriter`](crate::writer::MessageWriter)
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("MessageWriter is closed")]
    Closed,

    #[error("Failed to publish message: {0}")]
    Send(#[from] QueueError),

    #[error("Failed to encode message: {0}")]
    Serialization(#[from] SerializationError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
