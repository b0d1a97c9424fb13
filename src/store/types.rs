//! Core types shared across the storage boundary.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

/// A set of stored entries keyed by string, as the substrate exposes them.
pub type Entries = HashMap<String, Value>;

/// Boxed future returned by substrate trait methods.
///
/// Substrate bindings are held as trait objects, so their async methods
/// return boxed futures rather than `impl Future`.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Point-in-time usage estimate reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaEstimate {
    /// Bytes currently used.
    pub usage_bytes: u64,
    /// Total bytes the host grants. Zero when the host reports no quota.
    pub quota_bytes: u64,
}

/// Errors surfaced by substrate storage operations.
///
/// `Unavailable`, `Timeout` and `RateLimited` are transient: the retry
/// executor will re-attempt them. `Rejected` covers everything the host
/// refuses outright; the layer does not special-case it and it exhausts
/// retries like any other failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The substrate could not be reached.
    #[error("substrate unavailable: {0}")]
    Unavailable(String),

    /// The host reported a timeout for this call.
    #[error("substrate call timed out: {0}")]
    Timeout(String),

    /// The host is throttling calls.
    #[error("substrate rate limited: {0}")]
    RateLimited(String),

    /// The host rejected the operation.
    #[error("substrate rejected operation: {0}")]
    Rejected(String),

    /// A logical call failed after exhausting its retry budget.
    #[error("{label} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Label of the logical operation, e.g. `"storage set"`.
        label: String,
        /// Number of attempts performed.
        attempts: u32,
        /// The last error observed.
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Unwrap a `RetriesExhausted` wrapper down to the last observed error.
    ///
    /// Returns `self` unchanged for every other variant.
    pub fn into_last(self) -> StoreError {
        match self {
            StoreError::RetriesExhausted { source, .. } => source.into_last(),
            other => other,
        }
    }
}

impl From<crate::retry::RetryError<StoreError>> for StoreError {
    fn from(err: crate::retry::RetryError<StoreError>) -> Self {
        let crate::retry::RetryError {
            label,
            attempts,
            source,
        } = err;
        StoreError::RetriesExhausted {
            label,
            attempts,
            source: Box::new(source),
        }
    }
}
