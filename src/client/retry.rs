//! Pure retry decisions for pull requests
//!
//! A pull request that fails with a transient error (`Unavailable`,
//! `DeadlineExceeded`) is retried with exponential backoff until its deadline
//! budget is spent. Everything else gives up immediately.

use crate::config::PullSection;
use crate::error::PubSubError;
use std::time::Duration;

/// Backoff and deadline budget for one pull request
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total time one request may spend across all attempts
    pub deadline: Duration,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PullSection::default())
    }
}

impl From<&PullSection> for RetryPolicy {
    fn from(section: &PullSection) -> Self {
        Self {
            deadline: Duration::from_secs(section.retry_deadline_secs),
            initial_backoff: Duration::from_millis(section.initial_backoff_ms),
            max_backoff: Duration::from_millis(section.max_backoff_ms),
            multiplier: section.backoff_multiplier,
        }
    }
}

/// Outcome of a retry decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then make retry number `attempt`
    Retry { attempt: u32, delay: Duration },
    /// Surface the error to the caller
    GiveUp,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), capped at `max_backoff`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_backoff.as_nanos() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_backoff.as_nanos() as f64).max(0.0);
        Duration::from_nanos(capped.round() as u64)
    }

    /// Decide whether to retry after `error`
    ///
    /// `retries_so_far` is the number of retries already made for this
    /// request; `elapsed` is the time spent on it so far. A retry is only
    /// scheduled when its backoff still ends inside the deadline.
    pub fn decide(
        &self,
        error: &PubSubError,
        retries_so_far: u32,
        elapsed: Duration,
    ) -> RetryDecision {
        if !error.is_transient() {
            return RetryDecision::GiveUp;
        }

        let attempt = retries_so_far + 1;
        let delay = self.backoff(attempt);
        if elapsed + delay >= self.deadline {
            return RetryDecision::GiveUp;
        }

        RetryDecision::Retry { attempt, delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            deadline: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        let policy = policy();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(50), Duration::from_millis(1000));
    }

    #[test]
    fn test_transient_errors_retry_within_budget() {
        let policy = policy();
        let decision = policy.decide(&PubSubError::unavailable("down"), 0, Duration::ZERO);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(100)
            }
        );

        let decision = policy.decide(
            &PubSubError::deadline_exceeded("slow"),
            2,
            Duration::from_secs(1),
        );
        assert_eq!(
            decision,
            RetryDecision::Retry {
                attempt: 3,
                delay: Duration::from_millis(400)
            }
        );
    }

    #[test]
    fn test_non_transient_errors_never_retry() {
        let policy = policy();
        for error in [
            PubSubError::not_found("projects/p/subscriptions/s"),
            PubSubError::already_exists("projects/p/topics/t"),
            PubSubError::invalid_argument("bad"),
            PubSubError::unknown("boom"),
        ] {
            assert_eq!(
                policy.decide(&error, 0, Duration::ZERO),
                RetryDecision::GiveUp,
                "{error} must not be retried"
            );
        }
    }

    #[test]
    fn test_gives_up_when_backoff_would_cross_deadline() {
        let policy = policy();
        let decision = policy.decide(
            &PubSubError::unavailable("down"),
            5,
            Duration::from_millis(9_100),
        );
        assert_eq!(decision, RetryDecision::GiveUp);

        let decision = policy.decide(&PubSubError::unavailable("down"), 0, policy.deadline);
        assert_eq!(decision, RetryDecision::GiveUp);
    }

    #[test]
    fn test_policy_from_config_section() {
        let section = PullSection {
            batch_size: 10,
            retry_deadline_secs: 1,
            initial_backoff_ms: 5,
            max_backoff_ms: 50,
            backoff_multiplier: 3.0,
        };
        let policy = RetryPolicy::from(&section);
        assert_eq!(policy.deadline, Duration::from_secs(1));
        assert_eq!(policy.initial_backoff, Duration::from_millis(5));
        assert_eq!(policy.max_backoff, Duration::from_millis(50));
        assert_eq!(policy.backoff(2), Duration::from_millis(15));
    }
}
