//! Retry policy.
//!
//! # Responsibilities
//! - Bound the number of forwarding attempts
//! - Decide whether a failed attempt may be retried
//! - Supply the fixed delay between attempts
//!
//! # Design Decisions
//! - Retry only failures flagged temporary by the transport
//! - Fixed backoff; a single tunneled request has no herd to spread out

use std::time::Duration;

use crate::config::RetryConfig;
use crate::gateway::transport::TransportError;

/// Bounded retry policy for forwarding attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }

    /// Total attempts allowed, first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Whether attempt number `attempt` (1-based), having failed with
    /// `error`, should be followed by another one.
    pub fn should_retry(&self, attempt: u32, error: &TransportError) -> bool {
        attempt < self.max_attempts && error.is_temporary()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_one_retry_after_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.backoff(), Duration::from_secs(1));
    }

    #[test]
    fn retries_temporary_failures_until_exhausted() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let temporary = TransportError::temporary("reset");
        assert!(policy.should_retry(1, &temporary));
        assert!(!policy.should_retry(2, &temporary));
    }

    #[test]
    fn never_retries_permanent_failures() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        assert!(!policy.should_retry(1, &TransportError::permanent("refused")));
    }

    #[test]
    fn zero_attempts_still_allows_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
