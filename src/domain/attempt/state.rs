//! Per-batch submission states.
//!
//! Each batch progresses through distinct states, enforced at compile time.
//! A `BatchAttempt<Attempted>` can only be resolved, a
//! `BatchAttempt<RetryScheduled>` can only back off, and only the terminal
//! states produce a [`BatchResult`].

use std::time::Duration;

use crate::domain::batch::Batch;
use crate::domain::summary::BatchResult;
use crate::submitter::{SubmissionFailure, SubmissionOutcome};

/// Marker trait for valid batch attempt states.
pub trait AttemptState: Send + Sync {}

/// A batch moving through its submission lifecycle.
#[derive(Debug, Clone)]
pub struct BatchAttempt<'a, T: AttemptState> {
    /// The current state of the batch.
    pub state: T,
    /// The batch being submitted.
    pub batch: Batch<'a>,
}

/// Ready to be submitted.
#[derive(Debug, Clone)]
pub struct Pending {
    /// Attempts already made (0 before the first submission)
    pub attempts: u32,
}

impl AttemptState for Pending {}

/// A submission has returned; its outcome has not been acted on yet.
#[derive(Debug, Clone)]
pub struct Attempted {
    /// Attempts made, including this one
    pub attempts: u32,
    pub outcome: SubmissionOutcome,
    pub elapsed: Duration,
}

impl AttemptState for Attempted {}

/// A transient failure with retry budget left; waiting out the backoff.
#[derive(Debug, Clone)]
pub struct RetryScheduled {
    pub attempts: u32,
    pub backoff: Duration,
    pub last_failure: SubmissionFailure,
}

impl AttemptState for RetryScheduled {}

/// Delivered.
#[derive(Debug, Clone)]
pub struct Succeeded {
    pub attempts: u32,
}

impl AttemptState for Succeeded {}

/// Failed permanently or ran out of retries. Halts the run.
#[derive(Debug, Clone)]
pub struct Halted {
    pub attempts: u32,
    /// The final outcome, either kind of failure
    pub outcome: SubmissionOutcome,
}

impl AttemptState for Halted {}

impl<'a> BatchAttempt<'a, Succeeded> {
    pub fn into_result(self) -> BatchResult {
        BatchResult::new(&self.batch, self.state.attempts, SubmissionOutcome::Success)
    }
}

impl<'a> BatchAttempt<'a, Halted> {
    pub fn into_result(self) -> BatchResult {
        BatchResult::new(&self.batch, self.state.attempts, self.state.outcome)
    }
}

/// Where an attempted batch goes next.
#[derive(Debug)]
pub enum Resolution<'a> {
    Succeeded(BatchAttempt<'a, Succeeded>),
    RetryScheduled(BatchAttempt<'a, RetryScheduled>),
    Halted(BatchAttempt<'a, Halted>),
}
