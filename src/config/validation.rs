//! Configuration validation.

use std::time::Duration;

use super::{IngestConfig, SubmitterConfig};
use crate::error::{IngestError, Result};

/// Validate the pipeline settings.
pub fn validate_ingest(config: &IngestConfig) -> Result<()> {
    if config.batch_size == 0 {
        return Err(IngestError::config("batch_size must be at least 1"));
    }
    if config.backoff_factor == 0 {
        return Err(IngestError::config("backoff_factor must be at least 1"));
    }

    non_negative("retry_delay_seconds", config.retry_delay_seconds)?;
    non_negative("max_retry_delay_seconds", config.max_retry_delay_seconds)?;
    non_negative("inter_batch_delay_seconds", config.inter_batch_delay_seconds)?;
    non_negative("timeout_seconds", config.timeout_seconds)?;

    if config.timeout_seconds == 0.0 {
        return Err(IngestError::config("timeout_seconds must be greater than 0"));
    }
    if config.max_retry_delay_seconds < config.retry_delay_seconds {
        return Err(IngestError::config(format!(
            "max_retry_delay_seconds ({}) must not be less than retry_delay_seconds ({})",
            config.max_retry_delay_seconds, config.retry_delay_seconds
        )));
    }

    Ok(())
}

/// Validate that every submitter field is present.
///
/// Reports all missing fields in one error.
pub fn validate_submitter(config: &SubmitterConfig) -> Result<()> {
    let fields = [
        ("tenant_id", &config.tenant_id),
        ("application_id", &config.application_id),
        ("application_secret", &config.application_secret),
        ("dce_endpoint", &config.dce_endpoint),
        ("dcr_immutable_id", &config.dcr_immutable_id),
        ("stream_name", &config.stream_name),
    ];

    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if !missing.is_empty() {
        return Err(IngestError::config(format!(
            "missing required submitter fields: {}",
            missing.join(", ")
        )));
    }

    if !config.dce_endpoint.starts_with("https://") && !config.dce_endpoint.starts_with("http://")
    {
        return Err(IngestError::config(format!(
            "dce_endpoint must be an http(s) URL, got '{}'",
            config.dce_endpoint
        )));
    }

    Ok(())
}

// Anything Duration cannot hold (negative, NaN, infinite, too large) is rejected.
fn non_negative(name: &str, value: f64) -> Result<()> {
    Duration::try_from_secs_f64(value).map_err(|e| {
        IngestError::config(format!(
            "{} must be a number of seconds >= 0, got {} ({})",
            name, value, e
        ))
    })?;
    Ok(())
}
