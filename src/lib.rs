//! Batched ingestion of JSON records into a Data Collection Endpoint.
//!
//! Records are split into fixed-size batches and submitted strictly in order.
//! A batch that fails transiently (throttling, 5xx, timeout, network) is
//! retried after a backoff; a batch that fails permanently, or runs out of
//! retries, halts the run. Every batch ends up counted exactly once as sent
//! or failed in the returned [`RunSummary`].
//!
//! ```ignore
//! let config = ConnectorConfig::load("connector.json")?;
//! let records = load_records("records.json")?;
//! let submitter = HttpSubmitter::new(
//!     ReqwestHttpClient::default(),
//!     &config.submitter,
//!     StaticToken::new(token),
//! );
//! let summary = run_pipeline(&records, &config.ingest, submitter, CancellationToken::new()).await?;
//! println!("{}", summary.summary_line());
//! ```

pub mod config;
pub mod delay;
pub mod domain;
pub mod driver;
pub mod error;
pub mod http;
pub mod report;
pub mod submitter;

// Re-export commonly used types
pub use config::{ConnectorConfig, IngestConfig, SubmitterConfig};
pub use delay::{Delay, InstantDelay, TokioDelay};
pub use domain::attempt::{Decision, RetryPolicy};
pub use domain::batch::{Batch, BatchPlan, batch};
pub use domain::record::{Record, load_records, parse_records};
pub use domain::summary::{BatchResult, RunId, RunStatus, RunSummary};
pub use driver::{Driver, run_pipeline};
pub use error::{IngestError, Result};
pub use http::{HttpClient, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use submitter::{
    DryRunSubmitter, FailureCode, HttpSubmitter, StaticToken, SubmissionFailure,
    SubmissionOutcome, Submitter, TokenSource,
};
