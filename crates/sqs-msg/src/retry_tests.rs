//! Tests for retry policy module

use super::*;
use std::time::Duration;

fn failed(attempt: u32, status: Option<u16>) -> FailedRequest {
    FailedRequest::new(attempt, status, None)
}

/// Policy that records nothing and answers with fixed values, to observe delegation
#[derive(Debug)]
struct FixedPolicy {
    retry: bool,
    delay: Duration,
}

impl RetryPolicy for FixedPolicy {
    fn max_retries(&self) -> u32 {
        3
    }

    fn should_retry(&self, _request: &FailedRequest) -> bool {
        self.retry
    }

    fn retry_delay(&self, _request: &FailedRequest) -> Duration {
        self.delay
    }
}

// ============================================================================
// BackoffRetryPolicy Tests
// ============================================================================

#[test]
fn test_backoff_policy_default_values() {
    let policy = BackoffRetryPolicy::default();

    assert_eq!(policy.max_retries, 7);
    assert_eq!(policy.initial_delay, Duration::from_millis(30));
    assert_eq!(policy.max_delay, Duration::from_secs(300));
    assert_eq!(policy.backoff_multiplier, 2.0);
    assert!(policy.use_jitter);
    assert_eq!(policy.jitter_percent, 0.25);
}

#[test]
fn test_backoff_policy_calculate_delay_without_jitter() {
    let policy =
        BackoffRetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(16), 2.0)
            .without_jitter();

    assert_eq!(policy.calculate_delay(0), Duration::from_secs(1));
    assert_eq!(policy.calculate_delay(1), Duration::from_secs(2));
    assert_eq!(policy.calculate_delay(2), Duration::from_secs(4));
    assert_eq!(policy.calculate_delay(3), Duration::from_secs(8));
    assert_eq!(policy.calculate_delay(4), Duration::from_secs(16));

    // Would be 32s but capped at 16s
    assert_eq!(policy.calculate_delay(5), Duration::from_secs(16));
}

#[test]
fn test_backoff_policy_calculate_delay_with_jitter() {
    let policy = BackoffRetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(16), 2.0);

    for _ in 0..20 {
        let secs = policy.calculate_delay(0).as_secs_f64();
        assert!((0.75..=1.25).contains(&secs), "Delay {} out of range", secs);
    }
}

#[test]
fn test_backoff_policy_retries_transient_failures_only() {
    let policy = BackoffRetryPolicy::default();

    assert!(policy.should_retry(&failed(0, None)));
    assert!(policy.should_retry(&failed(0, Some(500))));
    assert!(policy.should_retry(&failed(0, Some(503))));
    assert!(policy.should_retry(&failed(0, Some(429))));
    assert!(policy.should_retry(&FailedRequest::new(
        0,
        Some(400),
        Some("ThrottlingException".to_string())
    )));

    assert!(!policy.should_retry(&failed(0, Some(400))));
    assert!(!policy.should_retry(&failed(0, Some(403))));
    assert!(!policy.should_retry(&failed(0, Some(404))));
}

#[test]
fn test_with_max_retries_keeps_default_backoff() {
    let policy = BackoffRetryPolicy::with_max_retries(12);

    assert_eq!(policy.max_retries(), 12);
    assert_eq!(policy.initial_delay, Duration::from_millis(30));
}

// ============================================================================
// CredentialRetryPolicy Tests
// ============================================================================

#[test]
fn test_credential_policy_forces_retry_on_forbidden() {
    let inner = Arc::new(FixedPolicy {
        retry: false,
        delay: Duration::from_millis(1),
    });
    let policy = CredentialRetryPolicy::new(inner, Duration::from_secs(2));

    let forbidden = failed(4, Some(403));
    assert!(policy.should_retry(&forbidden));
    assert_eq!(policy.retry_delay(&forbidden), Duration::from_secs(2));
}

#[test]
fn test_credential_policy_delegates_other_statuses() {
    let inner = Arc::new(FixedPolicy {
        retry: true,
        delay: Duration::from_millis(7),
    });
    let policy = CredentialRetryPolicy::new(inner, Duration::from_secs(2));

    let server_error = failed(0, Some(500));
    assert!(policy.should_retry(&server_error));
    assert_eq!(policy.retry_delay(&server_error), Duration::from_millis(7));

    let network_error = failed(1, None);
    assert_eq!(policy.retry_delay(&network_error), Duration::from_millis(7));

    assert_eq!(policy.max_retries(), 3);
}

#[test]
fn test_credential_policy_does_not_rescue_other_client_errors() {
    let policy = CredentialRetryPolicy::default();

    assert!(!policy.should_retry(&failed(0, Some(400))));
    assert!(!policy.should_retry(&failed(0, Some(401))));
}

#[test]
fn test_credential_policy_defaults() {
    let policy = CredentialRetryPolicy::default();

    assert_eq!(policy.delay(), Duration::from_secs(2));
    assert_eq!(policy.max_retries(), 7);
}
