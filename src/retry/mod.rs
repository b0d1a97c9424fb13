//! Generic retry executor with exponential backoff.
//!
//! The primitive every other component composes: run a fallible asynchronous
//! operation up to a bounded number of attempts, sleeping a deterministic,
//! capped, exponentially growing delay between attempts. No jitter — the
//! delay sequence is fully determined by the policy, which keeps retry
//! timing inspectable in tests.
//!
//! The executor knows nothing about what it retries. Attempts are strictly
//! sequential with no overlap, implemented as a bounded iterative loop so
//! the attempt count is trivially observable.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::host::HostProfile;

/// Backoff parameters for one retry executor.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts per logical call. Clamped to at least 1.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap applied to every delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Derive the policy from a host profile.
    pub fn from_profile(profile: &HostProfile) -> Self {
        Self {
            max_retries: profile.max_retries,
            base_delay: profile.base_delay,
            max_delay: profile.max_delay,
            backoff_multiplier: profile.backoff_multiplier,
        }
    }

    /// Delay scheduled after failed attempt `attempt` (1-based):
    /// `min(base_delay * multiplier^(attempt - 1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
        }
    }
}

/// A logical call that exhausted its attempt budget.
///
/// Carries the operation label and attempt count alongside the last error
/// observed, so exhaustion surfaces with enough context to log or map into
/// a domain error.
#[derive(Debug, Error)]
#[error("{label} failed after {attempts} attempts: {source}")]
pub struct RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Label of the logical operation.
    pub label: String,
    /// Attempts performed before giving up.
    pub attempts: u32,
    /// The last error observed.
    #[source]
    pub source: E,
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Consume the wrapper, returning the last observed error.
    pub fn into_source(self) -> E {
        self.source
    }
}

/// Runs fallible asynchronous operations with bounded retries.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor with the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy this executor runs with.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` with the policy's attempt budget.
    ///
    /// Returns the first success, or a [`RetryError`] wrapping the last
    /// failure once the budget is exhausted.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.run_with_limit(label, self.policy.max_retries, op).await
    }

    /// Run `op` with an explicit attempt budget, overriding the policy's.
    pub async fn run_with_limit<T, E, F, Fut>(
        &self,
        label: &str,
        max_retries: u32,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let max_attempts = max_retries.max(1);

        for attempt in 1..=max_attempts {
            debug!(label, attempt, max_attempts, "Attempting operation");

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(label, attempt, error = %err, "Attempt failed");

                    if attempt == max_attempts {
                        error!(label, attempts = max_attempts, error = %err, "Retries exhausted");
                        return Err(RetryError {
                            label: label.to_string(),
                            attempts: max_attempts,
                            source: err,
                        });
                    }

                    let delay = self.policy.delay_for(attempt);
                    debug!(label, delay_ms = delay.as_millis() as u64, "Backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        unreachable!("loop returns on the final attempt")
    }
}
