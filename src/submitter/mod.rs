//! The submission capability the driver depends on.
//!
//! A [`Submitter`] delivers one batch to the remote system and classifies the
//! result as success, transient failure or permanent failure. The driver never
//! sees credentials or transport details; it only reacts to the
//! [`SubmissionOutcome`].

pub mod http;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::batch::Batch;

pub use self::http::{HttpSubmitter, ShouldRetryFn, StaticToken, TokenSource, default_should_retry};

/// What went wrong with a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FailureCode {
    /// The endpoint answered with a non-success status.
    HttpStatus(u16),
    /// The attempt did not finish within the configured timeout.
    Timeout,
    /// Connection, DNS or other transport-level failure.
    Network,
    /// The batch could not be encoded or the request could not be built.
    InvalidRequest,
    /// No usable credential was available.
    Unauthorized,
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCode::HttpStatus(status) => write!(f, "HTTP {}", status),
            FailureCode::Timeout => write!(f, "timeout"),
            FailureCode::Network => write!(f, "network error"),
            FailureCode::InvalidRequest => write!(f, "invalid request"),
            FailureCode::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

/// Code and message of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionFailure {
    pub code: FailureCode,
    pub message: String,
}

impl SubmissionFailure {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "failure", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Success,
    /// Expected to succeed if retried (rate limiting, unavailability, timeouts).
    TransientFailure(SubmissionFailure),
    /// Will not succeed on retry (bad credentials, invalid payload).
    PermanentFailure(SubmissionFailure),
}

impl SubmissionOutcome {
    pub fn transient(code: FailureCode, message: impl Into<String>) -> Self {
        SubmissionOutcome::TransientFailure(SubmissionFailure::new(code, message))
    }

    pub fn permanent(code: FailureCode, message: impl Into<String>) -> Self {
        SubmissionOutcome::PermanentFailure(SubmissionFailure::new(code, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success)
    }

    /// Returns true if this outcome may be retried.
    pub fn is_retriable(&self) -> bool {
        matches!(self, SubmissionOutcome::TransientFailure(_))
    }

    pub fn failure(&self) -> Option<&SubmissionFailure> {
        match self {
            SubmissionOutcome::Success => None,
            SubmissionOutcome::TransientFailure(failure)
            | SubmissionOutcome::PermanentFailure(failure) => Some(failure),
        }
    }

    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionOutcome::Success => "success",
            SubmissionOutcome::TransientFailure(_) => "transient_failure",
            SubmissionOutcome::PermanentFailure(_) => "permanent_failure",
        }
    }
}

impl std::fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionOutcome::Success => write!(f, "success"),
            SubmissionOutcome::TransientFailure(failure) => {
                write!(f, "transient failure ({})", failure)
            }
            SubmissionOutcome::PermanentFailure(failure) => {
                write!(f, "permanent failure ({})", failure)
            }
        }
    }
}

/// Trait for delivering a batch to the remote system.
///
/// Destination, stream and credentials are fixed when the implementation is
/// constructed. Implementations must classify every failure; they never
/// return an error to the driver.
///
/// # Example
/// ```ignore
/// let submitter = HttpSubmitter::new(client, &config.submitter, StaticToken::new(token));
/// match submitter.submit(&batch).await {
///     SubmissionOutcome::Success => {}
///     other => println!("batch {} not delivered: {}", batch.number(), other),
/// }
/// ```
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, batch: &Batch<'_>) -> SubmissionOutcome;
}

#[async_trait]
impl<S: Submitter + ?Sized> Submitter for std::sync::Arc<S> {
    async fn submit(&self, batch: &Batch<'_>) -> SubmissionOutcome {
        (**self).submit(batch).await
    }
}

/// Submitter that accepts every batch without any network I/O.
///
/// Useful for rehearsing a run against real data and configuration.
#[derive(Debug, Clone, Default)]
pub struct DryRunSubmitter;

#[async_trait]
impl Submitter for DryRunSubmitter {
    async fn submit(&self, batch: &Batch<'_>) -> SubmissionOutcome {
        tracing::info!(
            batch = batch.number(),
            records = batch.len(),
            "Dry run: batch not sent"
        );
        SubmissionOutcome::Success
    }
}
