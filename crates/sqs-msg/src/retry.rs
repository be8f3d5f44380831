//! # Retry Policy Module
//!
//! Per-call retry decisions for the SQS client.
//!
//! [`BackoffRetryPolicy`] is the client's generic policy: exponential backoff
//! with jitter for network failures, throttling and server errors.
//! [`CredentialRetryPolicy`] wraps any other policy and additionally retries
//! authorization failures (HTTP 403) with a fixed delay. Freshly issued
//! credentials can take a while to propagate, and a consumer started at the
//! same time as its credentials would otherwise fail its first receive.

use rand::Rng;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// HTTP status returned while credentials are not yet valid
pub const FORBIDDEN_STATUS: u16 = 403;

/// Error codes that mark a throttled request regardless of status
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestThrottled",
    "RequestLimitExceeded",
];

/// Description of a failed call handed to a [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRequest {
    /// Retry attempt this decision is for (0-based)
    pub attempt: u32,

    /// HTTP status, if a response was received at all
    pub status: Option<u16>,

    /// Error code parsed from the response body
    pub code: Option<String>,
}

impl FailedRequest {
    pub fn new(attempt: u32, status: Option<u16>, code: Option<String>) -> Self {
        Self {
            attempt,
            status,
            code,
        }
    }

    fn is_throttled(&self) -> bool {
        self.status == Some(429)
            || self
                .code
                .as_deref()
                .is_some_and(|code| THROTTLING_CODES.contains(&code))
    }
}

/// Decides whether and when a failed call is retried
pub trait RetryPolicy: Send + Sync + Debug {
    /// Maximum number of retries after the initial attempt
    fn max_retries(&self) -> u32;

    /// Whether `request` should be retried (the retry budget is checked separately)
    fn should_retry(&self, request: &FailedRequest) -> bool;

    /// Delay before the next attempt
    fn retry_delay(&self, request: &FailedRequest) -> Duration;
}

// ============================================================================
// Exponential backoff
// ============================================================================

/// Exponential backoff retry policy
///
/// # Examples
///
/// ```rust
/// use sqs_msg::retry::BackoffRetryPolicy;
/// use std::time::Duration;
///
/// // Default policy: 7 retries, 30ms initial, 300s max, 2.0x multiplier
/// let policy = BackoffRetryPolicy::default();
///
/// // Custom policy
/// let policy = BackoffRetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(5), 1.5);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffRetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Initial delay before first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Exponential backoff multiplier (typically 2.0)
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays
    pub use_jitter: bool,

    /// Jitter range as percentage (default 25% = ±25%)
    pub jitter_percent: f64,
}

impl Default for BackoffRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 7,
            initial_delay: Duration::from_millis(30),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            use_jitter: true,
            jitter_percent: 0.25,
        }
    }
}

impl BackoffRetryPolicy {
    /// Create a new backoff policy
    ///
    /// # Arguments
    ///
    /// * `max_retries` - Maximum retries after the initial attempt
    /// * `initial_delay` - Initial delay before first retry
    /// * `max_delay` - Maximum delay cap
    /// * `backoff_multiplier` - Exponential growth factor (typically 1.5-2.0)
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
            use_jitter: true,
            jitter_percent: 0.25,
        }
    }

    /// Default backoff with a different retry budget
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Disable jitter
    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Set custom jitter percentage (0.0 to 1.0)
    pub fn with_jitter_percent(mut self, percent: f64) -> Self {
        self.jitter_percent = percent.clamp(0.0, 1.0);
        self
    }

    /// Calculate delay for a specific retry attempt
    ///
    /// Uses `initial * multiplier^attempt`, capped at `max_delay`, with jitter
    /// applied afterwards if enabled.
    ///
    /// ```rust
    /// use sqs_msg::retry::BackoffRetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = BackoffRetryPolicy::default().without_jitter();
    /// assert_eq!(policy.calculate_delay(0), Duration::from_millis(30));
    /// assert_eq!(policy.calculate_delay(1), Duration::from_millis(60));
    /// ```
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_secs = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.min(i32::MAX as u32) as i32);

        let capped_delay_secs = base_delay_secs.min(self.max_delay.as_secs_f64());

        let final_delay_secs = if self.use_jitter {
            Self::add_jitter(capped_delay_secs, self.jitter_percent)
        } else {
            capped_delay_secs
        };

        Duration::from_secs_f64(final_delay_secs)
    }

    /// Applies random variation in range [delay * (1-jitter), delay * (1+jitter)]
    fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_secs * jitter_percent;
        if jitter_range <= 0.0 {
            return delay_secs;
        }

        let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
        (delay_secs + jitter).max(0.0)
    }
}

impl RetryPolicy for BackoffRetryPolicy {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn should_retry(&self, request: &FailedRequest) -> bool {
        match request.status {
            // No response: connection reset, timeout, DNS
            None => true,
            Some(status) => request.is_throttled() || status >= 500,
        }
    }

    fn retry_delay(&self, request: &FailedRequest) -> Duration {
        self.calculate_delay(request.attempt)
    }
}

// ============================================================================
// Credential-aware decorator
// ============================================================================

/// Retries authorization failures with a fixed delay, delegating every other
/// decision to the wrapped policy
#[derive(Debug, Clone)]
pub struct CredentialRetryPolicy {
    inner: Arc<dyn RetryPolicy>,
    delay: Duration,
}

impl Default for CredentialRetryPolicy {
    fn default() -> Self {
        Self::new(
            Arc::new(BackoffRetryPolicy::default()),
            Duration::from_secs(2),
        )
    }
}

impl CredentialRetryPolicy {
    pub fn new(inner: Arc<dyn RetryPolicy>, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Credential retries over the default backoff with `max_retries` retries
    ///
    /// ```rust
    /// use sqs_msg::retry::{CredentialRetryPolicy, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// let policy = CredentialRetryPolicy::with_retries(Duration::from_secs(5), 20);
    /// assert_eq!(policy.max_retries(), 20);
    /// assert_eq!(policy.delay(), Duration::from_secs(5));
    /// ```
    pub fn with_retries(delay: Duration, max_retries: u32) -> Self {
        Self::new(
            Arc::new(BackoffRetryPolicy::with_max_retries(max_retries)),
            delay,
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn is_credential_failure(request: &FailedRequest) -> bool {
        request.status == Some(FORBIDDEN_STATUS)
    }
}

impl RetryPolicy for CredentialRetryPolicy {
    fn max_retries(&self) -> u32 {
        self.inner.max_retries()
    }

    fn should_retry(&self, request: &FailedRequest) -> bool {
        if Self::is_credential_failure(request) {
            return true;
        }
        self.inner.should_retry(request)
    }

    fn retry_delay(&self, request: &FailedRequest) -> Duration {
        if Self::is_credential_failure(request) {
            return self.delay;
        }
        self.inner.retry_delay(request)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
