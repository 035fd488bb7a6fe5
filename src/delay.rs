//! Waiting abstraction used for retry backoff and batch throttling.
//!
//! The driver never sleeps directly; it asks a [`Delay`]. Production code uses
//! [`TokioDelay`], tests use [`InstantDelay`] to observe the requested waits
//! without any time passing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Trait for suspending the current run.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Returns immediately and records every requested duration.
#[derive(Debug, Clone, Default)]
pub struct InstantDelay {
    requested: Arc<Mutex<Vec<Duration>>>,
}

impl InstantDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration passed to `sleep`, in order.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().clone()
    }

    /// Sum of all requested durations.
    pub fn total(&self) -> Duration {
        self.requested.lock().iter().sum()
    }
}

#[async_trait]
impl Delay for InstantDelay {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_instant_delay_records() {
        let delay = InstantDelay::new();
        delay.sleep(Duration::from_millis(500)).await;
        delay.sleep(Duration::from_secs(2)).await;

        assert_eq!(
            delay.requested(),
            vec![Duration::from_millis(500), Duration::from_secs(2)]
        );
        assert_eq!(delay.total(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_delay_waits() {
        let start = tokio::time::Instant::now();
        TokioDelay.sleep(Duration::from_secs(3)).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
