//! Retry policy for units of work.
//!
//! A unit of work is re-executed from scratch on a transient failure: it
//! re-reads everything it needs, so a retry after a version conflict sees
//! the winner's write. Backoff doubles per attempt up to a cap.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use leasebill_core::{BillingError, BillingResult, ErrorKind};
use leasebill_shared::config::RetryConfig;

/// Bounded retry with doubling backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` counts the first attempt and is at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// Builds the policy from configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Single attempt, no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Total attempts including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before attempt `attempt + 1` (0-based `attempt`).
    fn backoff_duration(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `f`, retrying errors for which `BillingError::is_transient` holds.
    pub async fn run<F, Fut, T>(&self, operation: &str, f: F) -> BillingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BillingResult<T>>,
    {
        self.run_when(operation, BillingError::is_transient, f).await
    }

    /// Runs `f`, retrying only storage faults.
    ///
    /// For commands that carry a caller-supplied version: re-reading cannot
    /// fix a stale caller, so conflicts go straight back.
    pub async fn run_on_storage_faults<F, Fut, T>(&self, operation: &str, f: F) -> BillingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BillingResult<T>>,
    {
        self.run_when(
            operation,
            |err: &BillingError| err.is_transient() && err.kind() == ErrorKind::Infrastructure,
            f,
        )
        .await
    }

    /// Runs `f`, retrying errors accepted by `should_retry`.
    pub async fn run_when<F, Fut, T, P>(
        &self,
        operation: &str,
        should_retry: P,
        mut f: F,
    ) -> BillingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BillingResult<T>>,
        P: Fn(&BillingError) -> bool,
    {
        let mut attempt = 0;

        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            operation,
                            attempt = attempt + 1,
                            "unit of work succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !should_retry(&err) {
                        return Err(err);
                    }
                    if attempt + 1 >= self.max_attempts {
                        warn!(
                            operation,
                            attempts = attempt + 1,
                            error_code = err.error_code(),
                            error = %err,
                            "unit of work failed after max attempts"
                        );
                        return Err(err);
                    }

                    let backoff = self.backoff_duration(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error_code = err.error_code(),
                        error = %err,
                        "unit of work failed, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
