//! Per-batch and per-run accounting.
//!
//! A batch is counted as sent or failed exactly once, when its outcome is
//! final. The summary is a plain value owned by the run that builds it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::batch::Batch;
use crate::error::{IngestError, Result};
use crate::submitter::{SubmissionFailure, SubmissionOutcome};

/// Unique identifier for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        RunId(uuid)
    }
}

/// Final accounting for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// 1-based batch number
    pub batch: usize,
    /// Index of the batch's first record in the input
    pub offset: usize,
    /// Number of records in the batch
    pub records: usize,
    /// Submission attempts made, including retries
    pub attempts: u32,
    /// Outcome of the last attempt
    pub outcome: SubmissionOutcome,
    /// Whether at least one retry happened
    pub retried: bool,
}

impl BatchResult {
    pub fn new(batch: &Batch<'_>, attempts: u32, outcome: SubmissionOutcome) -> Self {
        Self {
            batch: batch.number(),
            offset: batch.offset(),
            records: batch.len(),
            attempts,
            outcome,
            retried: attempts > 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

impl std::fmt::Display for BatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Batch {}: {} records, {} attempt{}, {}",
            self.batch,
            self.records,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" },
            self.outcome
        )?;
        if self.retried && self.is_success() {
            write!(f, " (after retry)")?;
        }
        Ok(())
    }
}

/// Where a run stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Batches are still being processed.
    Running,
    /// Every batch was processed.
    Completed,
    /// A batch failed permanently or exhausted its retries; later batches
    /// were not attempted.
    Halted {
        batch: usize,
        reason: SubmissionFailure,
    },
    /// Cancellation was requested between batches.
    Cancelled {
        /// First batch that was not attempted
        next_batch: usize,
    },
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Halted { .. } => "halted",
            RunStatus::Cancelled { .. } => "cancelled",
        }
    }
}

/// Aggregate of all batch results of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    /// Records handed to the run
    pub total_records: usize,
    /// Records in batches that were delivered
    pub sent: usize,
    /// Records in the batch that halted the run
    pub failed: usize,
    /// Results in submission order
    pub batch_results: Vec<BatchResult>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Start accounting for a run over `total_records` records.
    pub fn new(total_records: usize) -> Self {
        Self {
            run_id: RunId::new(),
            total_records,
            sent: 0,
            failed: 0,
            batch_results: Vec::new(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Account for a finalized batch.
    pub(crate) fn record(&mut self, result: BatchResult) {
        if result.is_success() {
            self.sent += result.records;
        } else {
            self.failed += result.records;
        }
        self.batch_results.push(result);
    }

    /// Close the summary with its terminal status.
    pub(crate) fn finish(mut self, status: RunStatus) -> Self {
        self.status = status;
        self.finished_at = Some(Utc::now());
        self
    }

    /// No batch failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Records that were never attempted.
    pub fn unsent(&self) -> usize {
        self.total_records
            .saturating_sub(self.sent)
            .saturating_sub(self.failed)
    }

    /// How many leading batches of the full input a follow-up run has to
    /// skip, for a run that stopped early.
    ///
    /// Batch numbers continue across resumed plans, so this also counts
    /// batches delivered by earlier runs.
    pub fn batches_to_skip(&self) -> Option<usize> {
        match self.status {
            RunStatus::Halted { batch, .. } => Some(batch - 1),
            RunStatus::Cancelled { next_batch } => Some(next_batch - 1),
            RunStatus::Running | RunStatus::Completed => None,
        }
    }

    /// Share of records delivered, in percent. An empty run is 100%.
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            return 100.0;
        }
        self.sent as f64 / self.total_records as f64 * 100.0
    }

    /// The batch that halted the run and why.
    pub fn halted_at(&self) -> Option<(usize, &SubmissionFailure)> {
        match &self.status {
            RunStatus::Halted { batch, reason } => Some((*batch, reason)),
            _ => None,
        }
    }

    /// Turn a run that left records unsent into the matching error.
    pub fn ensure_success(&self) -> Result<()> {
        match &self.status {
            RunStatus::Halted { batch, reason } => Err(IngestError::RunHalted {
                batch: *batch,
                reason: reason.clone(),
            }),
            RunStatus::Cancelled { .. } => Err(IngestError::Cancelled),
            RunStatus::Running | RunStatus::Completed => Ok(()),
        }
    }

    /// One-line aggregate: total/sent/failed/success rate.
    pub fn summary_line(&self) -> String {
        format!(
            "total={} sent={} failed={} success_rate={:.1}%",
            self.total_records,
            self.sent,
            self.failed,
            self.success_rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submitter::FailureCode;

    fn result(batch: usize, records: usize, attempts: u32, outcome: SubmissionOutcome) -> BatchResult {
        BatchResult {
            batch,
            offset: (batch - 1) * 25,
            records,
            attempts,
            outcome,
            retried: attempts > 1,
        }
    }

    #[test]
    fn test_each_batch_counted_once() {
        let mut summary = RunSummary::new(75);
        summary.record(result(1, 25, 1, SubmissionOutcome::Success));
        summary.record(result(2, 25, 2, SubmissionOutcome::Success));
        let failure = SubmissionFailure::new(FailureCode::HttpStatus(403), "forbidden");
        summary.record(result(
            3,
            25,
            1,
            SubmissionOutcome::PermanentFailure(failure.clone()),
        ));
        let summary = summary.finish(RunStatus::Halted {
            batch: 3,
            reason: failure.clone(),
        });

        assert_eq!(summary.sent, 50);
        assert_eq!(summary.failed, 25);
        assert_eq!(summary.unsent(), 0);
        assert_eq!(summary.batches_to_skip(), Some(2));
        assert!(!summary.is_success());
        assert_eq!(summary.halted_at(), Some((3, &failure)));
        assert!(summary.finished_at.is_some());
        assert!(matches!(
            summary.ensure_success(),
            Err(IngestError::RunHalted { batch: 3, .. })
        ));
    }

    #[test]
    fn test_resumed_run_skips_from_halting_batch() {
        // Plan resumed after 2 batches; batch 3 delivered, batch 4 halts
        let failure = SubmissionFailure::new(FailureCode::HttpStatus(403), "forbidden");
        let mut summary = RunSummary::new(50);
        summary.record(result(3, 25, 1, SubmissionOutcome::Success));
        summary.record(result(
            4,
            25,
            1,
            SubmissionOutcome::PermanentFailure(failure.clone()),
        ));
        let summary = summary.finish(RunStatus::Halted {
            batch: 4,
            reason: failure,
        });

        assert_eq!(summary.batches_to_skip(), Some(3));
        assert_eq!(
            RunSummary::new(10)
                .finish(RunStatus::Cancelled { next_batch: 2 })
                .batches_to_skip(),
            Some(1)
        );
        assert_eq!(
            RunSummary::new(0).finish(RunStatus::Completed).batches_to_skip(),
            None
        );
    }

    #[test]
    fn test_success_rate_and_line() {
        let mut summary = RunSummary::new(100);
        summary.record(result(1, 25, 1, SubmissionOutcome::Success));
        assert_eq!(summary.success_rate(), 25.0);
        assert_eq!(
            summary.summary_line(),
            "total=100 sent=25 failed=0 success_rate=25.0%"
        );
        assert_eq!(summary.unsent(), 75);

        assert_eq!(RunSummary::new(0).success_rate(), 100.0);
    }

    #[test]
    fn test_cancelled_run_reports_error() {
        let summary = RunSummary::new(10).finish(RunStatus::Cancelled { next_batch: 1 });
        assert!(summary.is_success());
        assert!(matches!(summary.ensure_success(), Err(IngestError::Cancelled)));
    }

    #[test]
    fn test_batch_result_display() {
        let retried = result(2, 25, 2, SubmissionOutcome::Success);
        assert_eq!(
            retried.to_string(),
            "Batch 2: 25 records, 2 attempts, success (after retry)"
        );

        let failed = result(
            3,
            20,
            1,
            SubmissionOutcome::permanent(FailureCode::HttpStatus(400), "bad payload"),
        );
        assert_eq!(
            failed.to_string(),
            "Batch 3: 20 records, 1 attempt, permanent failure (HTTP 400: bad payload)"
        );
    }

    #[test]
    fn test_run_id_display_is_short() {
        assert_eq!(RunId::new().to_string().len(), 8);
    }
}
