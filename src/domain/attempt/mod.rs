//! Batch attempt aggregate - submission lifecycle of a single batch.
//!
//! This module contains the per-batch state machine:
//! - Attempt states (typestate pattern)
//! - State transition methods
//! - The retry policy that drives resolution

pub mod policy;
pub mod state;
pub mod transitions;

// Re-export commonly used types
pub use policy::{Decision, RetryPolicy};
pub use state::*;
