//! Retry policy and the pure outcome classification it drives.

use std::time::Duration;

use crate::config::IngestConfig;
use crate::submitter::SubmissionOutcome;

/// What to do with a batch after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The batch is delivered.
    Succeed,
    /// Wait `delay`, then submit the same batch again.
    Retry { delay: Duration },
    /// Stop the run; no further batch is attempted.
    Halt,
}

/// Configuration for retry behavior and pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed per batch after a transient failure
    pub max_retries: u32,
    /// Backoff before the first retry
    pub retry_delay: Duration,
    /// Factor by which the backoff is multiplied with each further retry
    pub backoff_factor: u32,
    /// Maximum backoff for any retry
    pub max_retry_delay: Duration,
    /// Wait between two successfully submitted batches
    pub inter_batch_delay: Duration,
    /// Bound on each submission attempt
    pub submit_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_delay: Duration::from_secs(2),
            backoff_factor: 1,
            max_retry_delay: Duration::from_secs(60),
            inter_batch_delay: Duration::from_millis(500),
            submit_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&IngestConfig> for RetryPolicy {
    fn from(config: &IngestConfig) -> Self {
        RetryPolicy {
            max_retries: config.retry_count,
            retry_delay: config.retry_delay(),
            backoff_factor: config.backoff_factor,
            max_retry_delay: config.max_retry_delay(),
            inter_batch_delay: config.inter_batch_delay(),
            submit_timeout: config.timeout(),
        }
    }
}

impl RetryPolicy {
    /// Classify an outcome, given how many attempts the batch has had
    /// (including the one that produced `outcome`).
    ///
    /// Permanent failures always halt. Transient failures are retried while
    /// fewer than `max_retries` retries have been made.
    pub fn decide(&self, outcome: &SubmissionOutcome, attempts: u32) -> Decision {
        match outcome {
            SubmissionOutcome::Success => Decision::Succeed,
            SubmissionOutcome::PermanentFailure(_) => Decision::Halt,
            SubmissionOutcome::TransientFailure(_) => {
                let retries_made = attempts.saturating_sub(1);
                if retries_made < self.max_retries {
                    Decision::Retry {
                        delay: self.backoff_for(retries_made),
                    }
                } else {
                    Decision::Halt
                }
            }
        }
    }

    /// Backoff before retry number `retry` (0-based):
    /// `retry_delay * backoff_factor ^ retry`, capped at `max_retry_delay`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_factor.max(1).saturating_pow(retry);
        self.retry_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submitter::FailureCode;

    fn transient() -> SubmissionOutcome {
        SubmissionOutcome::transient(FailureCode::HttpStatus(503), "unavailable")
    }

    fn permanent() -> SubmissionOutcome {
        SubmissionOutcome::permanent(FailureCode::HttpStatus(401), "unauthorized")
    }

    #[test]
    fn test_default_allows_exactly_one_retry() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.decide(&transient(), 1),
            Decision::Retry {
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(policy.decide(&transient(), 2), Decision::Halt);
    }

    #[test]
    fn test_success_and_permanent() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(&SubmissionOutcome::Success, 1), Decision::Succeed);
        assert_eq!(policy.decide(&SubmissionOutcome::Success, 2), Decision::Succeed);
        assert_eq!(policy.decide(&permanent(), 1), Decision::Halt);
    }

    #[test]
    fn test_no_retries() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..Default::default()
        };
        assert_eq!(policy.decide(&transient(), 1), Decision::Halt);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            retry_delay: Duration::from_secs(1),
            backoff_factor: 2,
            max_retry_delay: Duration::from_secs(10),
            ..Default::default()
        };

        let delays: Vec<_> = (0..6).map(|retry| policy.backoff_for(retry)).collect();
        assert_eq!(
            delays,
            [1, 2, 4, 8, 10, 10].map(Duration::from_secs).to_vec()
        );
        assert_eq!(policy.backoff_for(u32::MAX), Duration::from_secs(10));

        assert_eq!(
            policy.decide(&transient(), 3),
            Decision::Retry {
                delay: Duration::from_secs(4)
            }
        );
    }

    #[test]
    fn test_from_config() {
        let config = IngestConfig {
            retry_count: 3,
            retry_delay_seconds: 0.25,
            inter_batch_delay_seconds: 0.0,
            ..Default::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay, Duration::from_millis(250));
        assert_eq!(policy.inter_batch_delay, Duration::ZERO);
        assert_eq!(policy.submit_timeout, Duration::from_secs(30));
    }
}
