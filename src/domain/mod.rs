//! Core domain types for the ingestion pipeline.
//!
//! This module contains pure domain types with no transport dependencies:
//! - Opaque records and how they are loaded
//! - Batches and the batcher
//! - The per-batch attempt typestate machine and retry policy
//! - Per-batch and per-run accounting

pub mod attempt;
pub mod batch;
pub mod record;
pub mod summary;
