//! Client and server configuration.
//!
//! The library takes resolved configuration only. [`SqsConfig::from_env`] is
//! the single place that reads the process environment and is meant to be
//! called once at the process boundary.

use crate::error::ConfigurationError;
use crate::message::{QueueUrl, MAX_RECEIVE_MESSAGES, MAX_WAIT_TIME_SECONDS};
use crate::retry::CredentialRetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest gate a [`Server`](crate::server::Server) can be built with
pub const MAX_CONCURRENCY: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-west-2";

// ============================================================================
// SQS client configuration
// ============================================================================

/// Connection settings for the SQS HTTP client
#[derive(Clone, Serialize, Deserialize)]
pub struct SqsConfig {
    #[serde(default = "default_region")]
    pub region: String,

    /// Overrides the regional endpoint, e.g. a local SQS emulator
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default)]
    pub session_token: Option<String>,

    /// Per-request HTTP timeout; must exceed the receive long-poll wait
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl std::fmt::Debug for SqsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsConfig")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

/// Raw view of the environment variables the client understands
#[derive(Debug, Default, Deserialize)]
struct EnvironmentOverrides {
    aws_region: Option<String>,
    sqs_endpoint: Option<String>,
    aws_access_key_id: Option<String>,
    aws_secret_access_key: Option<String>,
    aws_session_token: Option<String>,
}

impl SqsConfig {
    /// Resolve configuration from `AWS_REGION`, `SQS_ENDPOINT`,
    /// `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`.
    ///
    /// Unset and empty variables leave the defaults in place.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_environment(config::Environment::default())
    }

    pub(crate) fn from_environment(
        environment: config::Environment,
    ) -> Result<Self, ConfigurationError> {
        let overrides: EnvironmentOverrides = config::Config::builder()
            .add_source(environment)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let mut resolved = Self::default();
        if let Some(region) = non_empty(overrides.aws_region) {
            resolved.region = region;
        }
        resolved.endpoint = non_empty(overrides.sqs_endpoint);
        resolved.access_key_id = non_empty(overrides.aws_access_key_id);
        resolved.secret_access_key = non_empty(overrides.aws_secret_access_key);
        resolved.session_token = non_empty(overrides.aws_session_token);

        Ok(resolved)
    }

    /// Endpoint the client talks to
    pub fn resolved_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://sqs.{}.amazonaws.com", self.region),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.region.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "region".to_string(),
            });
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(ConfigurationError::Invalid {
                message: "access_key_id and secret_access_key must be set together".to_string(),
            });
        }

        if self.request_timeout_seconds <= u64::from(MAX_WAIT_TIME_SECONDS) {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "request_timeout_seconds must exceed the {}s long-poll wait",
                    MAX_WAIT_TIME_SECONDS
                ),
            });
        }

        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ============================================================================
// Server configuration
// ============================================================================

/// Credential retry knobs; see [`CredentialRetryPolicy`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRetryConfig {
    #[serde(default = "default_credential_retry_delay_seconds")]
    pub delay_seconds: u64,

    #[serde(default = "default_credential_retry_max_attempts")]
    pub max_attempts: u32,
}

fn default_credential_retry_delay_seconds() -> u64 {
    2
}

fn default_credential_retry_max_attempts() -> u32 {
    7
}

impl Default for CredentialRetryConfig {
    fn default() -> Self {
        Self {
            delay_seconds: default_credential_retry_delay_seconds(),
            max_attempts: default_credential_retry_max_attempts(),
        }
    }
}

impl CredentialRetryConfig {
    pub fn policy(&self) -> CredentialRetryPolicy {
        CredentialRetryPolicy::with_retries(
            Duration::from_secs(self.delay_seconds),
            self.max_attempts,
        )
    }
}

/// Settings for a consumer [`Server`](crate::server::Server)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub queue_url: QueueUrl,

    /// Maximum number of handler invocations running at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Visibility timeout applied to a message whose handler failed
    #[serde(default = "default_retry_timeout_seconds")]
    pub retry_timeout_seconds: u32,

    #[serde(default = "default_max_messages")]
    pub max_messages: u32,

    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: u32,

    /// How often shutdown checks whether every handler has finished
    #[serde(default = "default_shutdown_poll_interval_ms")]
    pub shutdown_poll_interval_ms: u64,

    #[serde(default)]
    pub credential_retry: CredentialRetryConfig,
}

fn default_max_concurrency() -> usize {
    1
}

fn default_retry_timeout_seconds() -> u32 {
    30
}

fn default_max_messages() -> u32 {
    MAX_RECEIVE_MESSAGES
}

fn default_wait_time_seconds() -> u32 {
    MAX_WAIT_TIME_SECONDS
}

fn default_shutdown_poll_interval_ms() -> u64 {
    500
}

impl ServerConfig {
    pub fn new(queue_url: QueueUrl, max_concurrency: usize, retry_timeout_seconds: u32) -> Self {
        Self {
            queue_url,
            max_concurrency,
            retry_timeout_seconds,
            max_messages: default_max_messages(),
            wait_time_seconds: default_wait_time_seconds(),
            shutdown_poll_interval_ms: default_shutdown_poll_interval_ms(),
            credential_retry: CredentialRetryConfig::default(),
        }
    }

    pub fn with_credential_retry(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.credential_retry = CredentialRetryConfig {
            delay_seconds: delay.as_secs(),
            max_attempts,
        };
        self
    }

    pub fn with_shutdown_poll_interval(mut self, interval: Duration) -> Self {
        self.shutdown_poll_interval_ms = interval.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    pub fn with_wait_time_seconds(mut self, wait_time_seconds: u32) -> Self {
        self.wait_time_seconds = wait_time_seconds;
        self
    }

    pub fn shutdown_poll_interval(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_interval_ms.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_concurrency > MAX_CONCURRENCY {
            return Err(ConfigurationError::Invalid {
                message: format!("max_concurrency must not exceed {}", MAX_CONCURRENCY),
            });
        }

        if self.max_messages == 0 || self.max_messages > MAX_RECEIVE_MESSAGES {
            return Err(ConfigurationError::Invalid {
                message: format!("max_messages must be between 1 and {}", MAX_RECEIVE_MESSAGES),
            });
        }

        if self.wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "wait_time_seconds must not exceed {}",
                    MAX_WAIT_TIME_SECONDS
                ),
            });
        }

        // SQS caps visibility timeouts at 12 hours
        if self.retry_timeout_seconds > 43_200 {
            return Err(ConfigurationError::Invalid {
                message: "retry_timeout_seconds must not exceed 43200".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
