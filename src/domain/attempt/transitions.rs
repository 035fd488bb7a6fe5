//! State transitions for a batch under submission.
//!
//! ```text
//! BatchAttempt<Pending> ──attempt()──> BatchAttempt<Attempted> ──resolve()──> BatchAttempt<Succeeded>
//!        ▲                                                         ├────────> BatchAttempt<Halted>
//!        │                                                         └────────> BatchAttempt<RetryScheduled>
//!        └──────────────────────────backoff()──────────────────────────────────────────┘
//! ```
//!
//! `attempt` is the only transition that talks to the remote system and
//! `backoff` the only one that waits. `resolve` is pure: it defers to
//! [`RetryPolicy::decide`] and touches neither the submitter nor the clock.

use std::time::Duration;

use metrics::counter;

use super::policy::{Decision, RetryPolicy};
use super::state::{
    Attempted, BatchAttempt, Halted, Pending, Resolution, RetryScheduled, Succeeded,
};
use crate::delay::Delay;
use crate::domain::batch::Batch;
use crate::submitter::{FailureCode, SubmissionFailure, SubmissionOutcome, Submitter};

impl<'a> BatchAttempt<'a, Pending> {
    /// Start tracking a batch that has not been submitted yet.
    pub fn new(batch: Batch<'a>) -> Self {
        BatchAttempt {
            state: Pending { attempts: 0 },
            batch,
        }
    }

    /// Submit the batch once, bounded by `timeout`.
    ///
    /// An attempt that does not finish in time is a transient failure.
    pub async fn attempt<S: Submitter + ?Sized>(
        self,
        submitter: &S,
        timeout: Duration,
    ) -> BatchAttempt<'a, Attempted> {
        let attempts = self.state.attempts + 1;
        let started = tokio::time::Instant::now();

        tracing::debug!(
            batch = self.batch.number(),
            records = self.batch.len(),
            attempt = attempts,
            "Submitting batch"
        );

        let outcome = match tokio::time::timeout(timeout, submitter.submit(&self.batch)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    batch = self.batch.number(),
                    attempt = attempts,
                    timeout_ms = timeout.as_millis() as u64,
                    "Submission timed out"
                );
                SubmissionOutcome::transient(
                    FailureCode::Timeout,
                    format!("no response within {:?}", timeout),
                )
            }
        };

        BatchAttempt {
            state: Attempted {
                attempts,
                outcome,
                elapsed: started.elapsed(),
            },
            batch: self.batch,
        }
    }
}

impl<'a> BatchAttempt<'a, Attempted> {
    /// Decide what happens next according to `policy`.
    pub fn resolve(self, policy: &RetryPolicy) -> Resolution<'a> {
        let attempts = self.state.attempts;
        let decision = policy.decide(&self.state.outcome, attempts);

        match (decision, self.state.outcome) {
            (Decision::Succeed, _) => Resolution::Succeeded(BatchAttempt {
                state: Succeeded { attempts },
                batch: self.batch,
            }),
            (Decision::Retry { delay }, SubmissionOutcome::TransientFailure(failure)) => {
                counter!("dce_ingest_retries_total").increment(1);
                tracing::warn!(
                    batch = self.batch.number(),
                    attempt = attempts,
                    backoff_ms = delay.as_millis() as u64,
                    error = %failure,
                    "Batch failed with transient error, retry scheduled"
                );
                Resolution::RetryScheduled(BatchAttempt {
                    state: RetryScheduled {
                        attempts,
                        backoff: delay,
                        last_failure: failure,
                    },
                    batch: self.batch,
                })
            }
            // The policy only schedules retries for transient failures; any
            // other combination is final.
            (_, outcome) => Resolution::Halted(BatchAttempt {
                state: Halted { attempts, outcome },
                batch: self.batch,
            }),
        }
    }
}

impl<'a> BatchAttempt<'a, RetryScheduled> {
    /// Wait out the backoff and return the batch for another attempt.
    pub async fn backoff<D: Delay + ?Sized>(self, delay: &D) -> BatchAttempt<'a, Pending> {
        delay.sleep(self.state.backoff).await;

        BatchAttempt {
            state: Pending {
                attempts: self.state.attempts,
            },
            batch: self.batch,
        }
    }

    pub fn last_failure(&self) -> &SubmissionFailure {
        &self.state.last_failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::InstantDelay;
    use crate::domain::batch::batch;
    use crate::domain::record::Record;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Returns scripted outcomes in order.
    struct Scripted(Mutex<Vec<SubmissionOutcome>>);

    impl Scripted {
        fn new(mut outcomes: Vec<SubmissionOutcome>) -> Self {
            outcomes.reverse();
            Scripted(Mutex::new(outcomes))
        }
    }

    #[async_trait]
    impl Submitter for Scripted {
        async fn submit(&self, _batch: &Batch<'_>) -> SubmissionOutcome {
            self.0.lock().pop().unwrap_or(SubmissionOutcome::Success)
        }
    }

    struct Hangs;

    #[async_trait]
    impl Submitter for Hangs {
        async fn submit(&self, _batch: &Batch<'_>) -> SubmissionOutcome {
            std::future::pending().await
        }
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n).map(|i| serde_json::json!({ "n": i }).into()).collect()
    }

    fn unavailable() -> SubmissionOutcome {
        SubmissionOutcome::transient(FailureCode::HttpStatus(503), "unavailable")
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let records = records(5);
        let plan = batch(&records, 5).unwrap();
        let submitter = Scripted::new(vec![SubmissionOutcome::Success]);

        let attempted = BatchAttempt::new(plan.iter().next().unwrap())
            .attempt(&submitter, Duration::from_secs(1))
            .await;
        assert_eq!(attempted.state.attempts, 1);

        match attempted.resolve(&RetryPolicy::default()) {
            Resolution::Succeeded(done) => {
                let result = done.into_result();
                assert_eq!(result.attempts, 1);
                assert_eq!(result.records, 5);
                assert!(!result.retried);
            }
            other => panic!("expected Succeeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_then_success_walks_through_retry() {
        let records = records(3);
        let plan = batch(&records, 3).unwrap();
        let submitter = Scripted::new(vec![unavailable(), SubmissionOutcome::Success]);
        let delay = InstantDelay::new();
        let policy = RetryPolicy::default();

        let attempted = BatchAttempt::new(plan.iter().next().unwrap())
            .attempt(&submitter, Duration::from_secs(1))
            .await;
        let scheduled = match attempted.resolve(&policy) {
            Resolution::RetryScheduled(scheduled) => scheduled,
            other => panic!("expected RetryScheduled, got {:?}", other),
        };
        assert_eq!(scheduled.last_failure().code, FailureCode::HttpStatus(503));

        let pending = scheduled.backoff(&delay).await;
        assert_eq!(pending.state.attempts, 1);
        assert_eq!(delay.requested(), vec![Duration::from_secs(2)]);

        let attempted = pending.attempt(&submitter, Duration::from_secs(1)).await;
        match attempted.resolve(&policy) {
            Resolution::Succeeded(done) => {
                let result = done.into_result();
                assert_eq!(result.attempts, 2);
                assert!(result.retried);
            }
            other => panic!("expected Succeeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_transient_failure_halts() {
        let records = records(2);
        let plan = batch(&records, 2).unwrap();
        let submitter = Scripted::new(vec![unavailable(), unavailable()]);
        let policy = RetryPolicy::default();

        let mut pending = BatchAttempt::new(plan.iter().next().unwrap());
        let halted = loop {
            match pending
                .attempt(&submitter, Duration::from_secs(1))
                .await
                .resolve(&policy)
            {
                Resolution::RetryScheduled(r) => pending = r.backoff(&InstantDelay::new()).await,
                Resolution::Halted(h) => break h,
                Resolution::Succeeded(_) => panic!("should not succeed"),
            }
        };

        assert_eq!(halted.state.attempts, 2);
        assert_eq!(halted.state.outcome.failure().unwrap().code, FailureCode::HttpStatus(503));
        let result = halted.into_result();
        assert!(result.retried);
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let records = records(2);
        let plan = batch(&records, 2).unwrap();
        let submitter = Scripted::new(vec![SubmissionOutcome::permanent(
            FailureCode::HttpStatus(400),
            "schema mismatch",
        )]);

        let resolution = BatchAttempt::new(plan.iter().next().unwrap())
            .attempt(&submitter, Duration::from_secs(1))
            .await
            .resolve(&RetryPolicy::default());

        match resolution {
            Resolution::Halted(halted) => assert_eq!(halted.state.attempts, 1),
            other => panic!("expected Halted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        let records = records(1);
        let plan = batch(&records, 1).unwrap();

        let attempted = BatchAttempt::new(plan.iter().next().unwrap())
            .attempt(&Hangs, Duration::from_secs(30))
            .await;

        assert!(attempted.state.outcome.is_retriable());
        assert_eq!(
            attempted.state.outcome.failure().unwrap().code,
            FailureCode::Timeout
        );
        assert!(attempted.state.elapsed >= Duration::from_secs(30));
    }
}
