//! Connector and pipeline configuration.
//!
//! The connector file is a single JSON object carrying the submitter fields
//! at the top level and, optionally, pipeline tuning under `"ingest"`:
//!
//! ```json
//! {
//!   "tenant_id": "...",
//!   "application_id": "...",
//!   "application_secret": "...",
//!   "dce_endpoint": "https://my-dce.ingest.monitor.azure.com",
//!   "dcr_immutable_id": "dcr-...",
//!   "stream_name": "Custom-cveBusterv2_CL",
//!   "ingest": { "batch_size": 25, "retry_count": 1 }
//! }
//! ```

mod validation;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Pipeline settings: batching, retry and throttling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Records per batch (at least 1)
    pub batch_size: usize,

    /// Retries allowed per batch after a transient failure
    pub retry_count: u32,

    /// Wait before the first retry of a batch
    pub retry_delay_seconds: f64,

    /// Multiplier applied to the retry delay for each further retry
    pub backoff_factor: u32,

    /// Upper bound for any single retry delay
    pub max_retry_delay_seconds: f64,

    /// Throttle between two successfully submitted batches
    pub inter_batch_delay_seconds: f64,

    /// Bound on a single submission attempt
    pub timeout_seconds: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            retry_count: 1,
            retry_delay_seconds: 2.0,
            backoff_factor: 1,
            max_retry_delay_seconds: 60.0,
            inter_batch_delay_seconds: 0.5,
            timeout_seconds: 30.0,
        }
    }
}

impl IngestConfig {
    /// Check every numeric setting.
    pub fn validate(&self) -> Result<()> {
        validation::validate_ingest(self)
    }

    pub fn retry_delay(&self) -> Duration {
        seconds(self.retry_delay_seconds)
    }

    pub fn max_retry_delay(&self) -> Duration {
        seconds(self.max_retry_delay_seconds)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        seconds(self.inter_batch_delay_seconds)
    }

    pub fn timeout(&self) -> Duration {
        seconds(self.timeout_seconds)
    }
}

// Out-of-range values are rejected by `validate`; unvalidated ones clamp.
fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

/// Destination and credential material for the submitter.
///
/// All fields are opaque strings to the pipeline. Missing fields deserialize
/// as empty strings so that validation can report all of them at once.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitterConfig {
    pub tenant_id: String,
    pub application_id: String,
    pub application_secret: String,
    pub dce_endpoint: String,
    pub dcr_immutable_id: String,
    pub stream_name: String,
}

impl SubmitterConfig {
    /// Check that every required field is present.
    pub fn validate(&self) -> Result<()> {
        validation::validate_submitter(self)
    }
}

impl std::fmt::Debug for SubmitterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitterConfig")
            .field("tenant_id", &self.tenant_id)
            .field("application_id", &self.application_id)
            .field("application_secret", &"<redacted>")
            .field("dce_endpoint", &self.dce_endpoint)
            .field("dcr_immutable_id", &self.dcr_immutable_id)
            .field("stream_name", &self.stream_name)
            .finish()
    }
}

/// The complete connector file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(flatten)]
    pub submitter: SubmitterConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

impl ConnectorConfig {
    /// Load and validate a connector file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate a connector configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ConnectorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.submitter.validate()?;
        self.ingest.validate()
    }
}
