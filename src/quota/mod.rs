//! Quota monitoring and threshold-triggered eviction.

mod eviction;
mod monitor;

pub use eviction::{CleanupOutcome, EvictionCandidate, EvictionManager};
pub use monitor::{QuotaMonitor, UsageSnapshot};
