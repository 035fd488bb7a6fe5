//! Driver that submits batches in order, retries transient failures and
//! accounts for every batch.
//!
//! Batches are strictly sequential: batch N is never submitted before batch
//! N-1 (including its retries) has a final outcome. The submitter call, the
//! retry backoff and the inter-batch throttle are the only points where a run
//! yields.

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::IngestConfig;
use crate::delay::{Delay, TokioDelay};
use crate::domain::attempt::{BatchAttempt, Resolution, RetryPolicy};
use crate::domain::batch::{Batch, BatchPlan, batch};
use crate::domain::record::Record;
use crate::domain::summary::{BatchResult, RunStatus, RunSummary};
use crate::error::{IngestError, Result};
use crate::submitter::Submitter;

/// Runs batch plans against a submitter.
///
/// A driver holds no per-run state, so one driver can execute several runs
/// one after another, and independent drivers can run in parallel.
pub struct Driver<S, D = TokioDelay> {
    submitter: S,
    policy: RetryPolicy,
    delay: D,
    cancellation: CancellationToken,
    progress: Option<mpsc::UnboundedSender<BatchResult>>,
}

impl<S: Submitter> Driver<S, TokioDelay> {
    /// Create a driver that waits on the tokio timer.
    pub fn new(submitter: S, policy: RetryPolicy) -> Self {
        Self {
            submitter,
            policy,
            delay: TokioDelay,
            cancellation: CancellationToken::new(),
            progress: None,
        }
    }
}

impl<S, D> Driver<S, D>
where
    S: Submitter,
    D: Delay,
{
    /// Replace the delay implementation used for backoff and throttling.
    pub fn with_delay<D2: Delay>(self, delay: D2) -> Driver<S, D2> {
        Driver {
            submitter: self.submitter,
            policy: self.policy,
            delay,
            cancellation: self.cancellation,
            progress: self.progress,
        }
    }

    /// Token checked before every batch; cancelling it ends the run after
    /// the batch in flight.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Receive each batch result as soon as it is final.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<BatchResult>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Submit every batch of `plan` in order.
    ///
    /// Always returns a summary; submission failures are accounted for, not
    /// propagated. The run ends when every batch is processed, when a batch
    /// halts it, or when cancellation is requested between batches.
    #[tracing::instrument(skip_all, fields(batches = plan.len(), records = plan.total_records()))]
    pub async fn run(&self, plan: &BatchPlan<'_>) -> RunSummary {
        let mut summary = RunSummary::new(plan.total_records());
        tracing::info!(
            run_id = %summary.run_id,
            batch_size = plan.batch_size(),
            "Starting ingestion run"
        );

        let mut batches = plan.iter().peekable();
        let status = loop {
            let Some(batch) = batches.next() else {
                break RunStatus::Completed;
            };

            if self.cancellation.is_cancelled() {
                tracing::info!(next_batch = batch.number(), "Cancellation requested, stopping run");
                break RunStatus::Cancelled {
                    next_batch: batch.number(),
                };
            }

            let result = self.process_batch(batch).await;
            counter!("dce_ingest_batches_total", "outcome" => result.outcome.as_str()).increment(1);
            counter!(
                "dce_ingest_records_total",
                "outcome" => if result.is_success() { "sent" } else { "failed" }
            )
            .increment(result.records as u64);

            let halted = match result.outcome.failure() {
                Some(reason) => {
                    tracing::error!(
                        batch = result.batch,
                        attempts = result.attempts,
                        error = %reason,
                        "Batch failed, halting run"
                    );
                    Some(RunStatus::Halted {
                        batch: result.batch,
                        reason: reason.clone(),
                    })
                }
                None => {
                    tracing::info!(
                        batch = result.batch,
                        records = result.records,
                        attempts = result.attempts,
                        "Batch submitted"
                    );
                    None
                }
            };

            if let Some(progress) = &self.progress {
                // A dropped receiver only means nobody is watching
                let _ = progress.send(result.clone());
            }
            summary.record(result);

            if let Some(status) = halted {
                break status;
            }

            if let Some(next) = batches.peek() {
                let next_batch = next.number();
                if !self.throttle().await {
                    tracing::info!(next_batch, "Cancellation requested during throttle, stopping run");
                    break RunStatus::Cancelled { next_batch };
                }
            }
        };

        let summary = summary.finish(status);
        tracing::info!(
            run_id = %summary.run_id,
            status = summary.status.as_str(),
            sent = summary.sent,
            failed = summary.failed,
            "Ingestion run finished"
        );
        summary
    }

    /// Drive one batch through its attempts until it succeeds or halts.
    async fn process_batch(&self, batch: Batch<'_>) -> BatchResult {
        let mut pending = BatchAttempt::new(batch);
        loop {
            let attempted = pending
                .attempt(&self.submitter, self.policy.submit_timeout)
                .await;

            match attempted.resolve(&self.policy) {
                Resolution::Succeeded(succeeded) => return succeeded.into_result(),
                Resolution::Halted(halted) => return halted.into_result(),
                Resolution::RetryScheduled(scheduled) => {
                    pending = scheduled.backoff(&self.delay).await;
                }
            }
        }
    }

    /// Wait the inter-batch delay. Returns false if the run was cancelled
    /// while waiting.
    async fn throttle(&self) -> bool {
        if self.policy.inter_batch_delay.is_zero() {
            return true;
        }

        tokio::select! {
            _ = self.delay.sleep(self.policy.inter_batch_delay) => true,
            _ = self.cancellation.cancelled() => false,
        }
    }
}

impl<S, D> Driver<S, D>
where
    S: Submitter + 'static,
    D: Delay + 'static,
{
    /// Run on a tokio worker, taking ownership of the records.
    ///
    /// For hosts that must not block their own thread: the returned handle
    /// resolves to the final summary, and `with_progress` streams results
    /// while the run is going.
    pub fn spawn(self, records: Vec<Record>, batch_size: usize) -> JoinHandle<Result<RunSummary>> {
        tokio::spawn(async move {
            let plan = batch(&records, batch_size)?;
            Ok::<_, IngestError>(self.run(&plan).await)
        })
    }
}

/// Validate `config`, batch `records` and run them through `submitter`.
///
/// Configuration problems are returned before anything is submitted.
pub async fn run_pipeline<S: Submitter>(
    records: &[Record],
    config: &IngestConfig,
    submitter: S,
    cancellation: CancellationToken,
) -> Result<RunSummary> {
    config.validate()?;
    let plan = batch(records, config.batch_size)?;

    let driver = Driver::new(submitter, RetryPolicy::from(config)).with_cancellation(cancellation);
    Ok(driver.run(&plan).await)
}
