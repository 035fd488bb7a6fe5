//! Error types for the ingestion pipeline.

use thiserror::Error;

use crate::submitter::SubmissionFailure;

/// Result type alias using the crate error type.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Process exit code for a fully successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Invalid configuration, data file or flags.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// The run halted or otherwise left records unsent.
pub const EXIT_RUN_FAILED: u8 = 2;
/// The run was cancelled before every batch was attempted.
pub const EXIT_CANCELLED: u8 = 3;
/// File could not be read.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for the ingestion pipeline.
///
/// Per-attempt submission failures are *not* errors: they are classified into
/// [`crate::submitter::SubmissionOutcome`] and accounted for in the
/// [`crate::RunSummary`]. This enum covers what the caller has to react to.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Invalid batch size, invalid pipeline settings or missing submitter
    /// configuration. Always raised before the first submission.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Remaining batches were not attempted because a batch exhausted its
    /// retry budget or failed permanently.
    #[error("Run halted at batch {batch}: {reason}")]
    RunHalted { batch: usize, reason: SubmissionFailure },

    /// The run was cancelled between batches.
    #[error("Run cancelled")]
    Cancelled,

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (config and data files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        IngestError::Configuration(message.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            IngestError::Configuration(_) | IngestError::Serialization(_) => EXIT_CONFIG_ERROR,
            IngestError::RunHalted { .. } => EXIT_RUN_FAILED,
            IngestError::Cancelled => EXIT_CANCELLED,
            IngestError::Io(_) => EXIT_IO_ERROR,
            IngestError::HttpClient(_) | IngestError::Other(_) => EXIT_RUN_FAILED,
        }
    }

    /// Format error with full details including the source chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}
