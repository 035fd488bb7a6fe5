//! Human-readable rendering of a run: configuration banner, per-batch lines
//! and the closing summary.
//!
//! Everything here returns a `String`; printing is left to the caller.

use std::fmt::Write;

use crate::config::ConnectorConfig;
use crate::domain::summary::{RunStatus, RunSummary};

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Header printed before a run. The application secret is never included.
pub fn banner(config: &ConnectorConfig, records: usize, dry_run: bool) -> String {
    let submitter = &config.submitter;
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "DCE ingestion{}",
        if dry_run { " (dry run)" } else { "" }
    );
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Configuration:");
    let _ = writeln!(out, "  Tenant ID: {}", submitter.tenant_id);
    let _ = writeln!(out, "  Application ID: {}", submitter.application_id);
    let _ = writeln!(out, "  DCE: {}", submitter.dce_endpoint);
    let _ = writeln!(out, "  DCR: {}", submitter.dcr_immutable_id);
    let _ = writeln!(out, "  Stream: {}", submitter.stream_name);
    let _ = writeln!(out, "  Records to send: {}", records);
    let _ = writeln!(out, "  Batch size: {}", config.ingest.batch_size);
    let _ = write!(out, "  Retries per batch: {}", config.ingest.retry_count);
    out
}

/// Totals, success rate and, for an incomplete run, where it stopped.
pub fn summary_block(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Summary (run {}):", summary.run_id);
    let _ = writeln!(out, "  Total Records: {}", summary.total_records);
    let _ = writeln!(out, "  Successfully Sent: {}", summary.sent);
    let _ = writeln!(out, "  Failed: {}", summary.failed);
    if summary.unsent() > 0 {
        let _ = writeln!(out, "  Not Attempted: {}", summary.unsent());
    }
    let _ = writeln!(out, "  Success Rate: {:.1}%", summary.success_rate());

    match &summary.status {
        RunStatus::Halted { batch, reason } => {
            let _ = writeln!(out, "  Halted at batch {}: {}", batch, reason);
        }
        RunStatus::Cancelled { next_batch } => {
            let _ = writeln!(out, "  Cancelled before batch {}", next_batch);
        }
        RunStatus::Running | RunStatus::Completed => {}
    }
    if let Some(skip) = summary.batches_to_skip() {
        let _ = writeln!(
            out,
            "  Resume by skipping {} batch{}",
            skip,
            if skip == 1 { "" } else { "es" }
        );
    }

    let _ = write!(out, "{}", rule());
    out
}

/// Final verdict line.
pub fn verdict(summary: &RunSummary) -> &'static str {
    match summary.status {
        RunStatus::Completed if summary.is_success() => "All data sent successfully",
        RunStatus::Cancelled { .. } => "Run cancelled, some data was not sent",
        _ => "Some data failed to send",
    }
}
