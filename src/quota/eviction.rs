//! Storage eviction pass.
//!
//! Scans every stored entry and removes the largest/oldest ones when the
//! quota monitor crosses its critical threshold.
//!
//! # Design
//!
//! Candidates are ranked by serialized size (descending), ties broken by age
//! (descending), so the pass reclaims the most bytes first. A pass removes
//! at most [`MAX_REMOVALS_PER_PASS`] entries; per-candidate removal failures
//! are logged and skipped rather than aborting the pass. No error ever
//! escapes `cleanup` — a failed scan degrades to an empty outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::store::{Entries, KeyValueStore};

/// Serialized size above which an entry becomes a cleanup candidate.
const LARGE_VALUE_THRESHOLD_BYTES: usize = 1024;

/// Age above which an entry becomes a cleanup candidate.
const MAX_ENTRY_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Upper bound on removals in a single pass.
const MAX_REMOVALS_PER_PASS: usize = 5;

/// A stored entry identified as removable during a cleanup pass.
///
/// Derived transiently from the full key set; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    /// Key of the entry.
    pub key: String,
    /// Serialized length of the entry's value.
    pub size_bytes: usize,
    /// Milliseconds since the entry's `timestamp` field; 0 when absent.
    pub age_ms: u64,
}

/// Result of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CleanupOutcome {
    /// Entries that qualified for removal.
    pub candidates: usize,
    /// Entries actually removed.
    pub removed: usize,
    /// Serialized bytes reclaimed by the removals.
    pub bytes_reclaimed: u64,
    /// Removal attempts that failed and were skipped.
    pub failures: usize,
}

/// Removes the largest/oldest stored entries when invoked.
///
/// Fire-and-forget from the quota monitor's perspective, but `cleanup` is an
/// ordinary awaitable method so passes stay observable in tests.
pub struct EvictionManager {
    store: Arc<dyn KeyValueStore>,
}

impl EvictionManager {
    /// Create a manager scanning the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Run one cleanup pass.
    ///
    /// Enumerates every stored entry, ranks the candidates and removes up to
    /// [`MAX_REMOVALS_PER_PASS`] of them. Never returns an error: a failed
    /// enumeration yields a default (all-zero) outcome.
    pub async fn cleanup(&self) -> CleanupOutcome {
        let start = Instant::now();

        let entries = match self.store.get_all().await {
            Ok(entries) => entries,
            Err(err) => {
                error!(error = %err, "Cleanup scan failed, skipping pass");
                return CleanupOutcome::default();
            }
        };

        let now_ms = Utc::now().timestamp_millis();
        let candidates = rank_candidates(collect_candidates(&entries, now_ms));

        debug!(
            scanned = entries.len(),
            candidates = candidates.len(),
            "Cleanup scan complete"
        );

        let mut outcome = CleanupOutcome {
            candidates: candidates.len(),
            ..CleanupOutcome::default()
        };

        for candidate in &candidates {
            if outcome.removed >= MAX_REMOVALS_PER_PASS {
                break;
            }

            match self.store.remove(std::slice::from_ref(&candidate.key)).await {
                Ok(()) => {
                    debug!(
                        key = %candidate.key,
                        size_bytes = candidate.size_bytes,
                        age_ms = candidate.age_ms,
                        "Removed cleanup candidate"
                    );
                    outcome.removed += 1;
                    outcome.bytes_reclaimed += candidate.size_bytes as u64;
                }
                Err(err) => {
                    // Entry may be gone already or the host may be flaky;
                    // skip and keep the pass going.
                    warn!(key = %candidate.key, error = %err, "Failed to remove cleanup candidate");
                    outcome.failures += 1;
                }
            }
        }

        info!(
            candidates = outcome.candidates,
            removed = outcome.removed,
            bytes_reclaimed = outcome.bytes_reclaimed,
            failures = outcome.failures,
            duration_ms = start.elapsed().as_millis() as u64,
            "Cleanup pass complete"
        );

        outcome
    }
}

/// Identify cleanup candidates among the stored entries.
///
/// An entry qualifies when its serialized size exceeds
/// [`LARGE_VALUE_THRESHOLD_BYTES`] or its age exceeds [`MAX_ENTRY_AGE`]. Age
/// comes from the value's epoch-millisecond `timestamp` field; entries
/// without one are treated as age 0.
fn collect_candidates(entries: &Entries, now_ms: i64) -> Vec<EvictionCandidate> {
    entries
        .iter()
        .filter_map(|(key, value)| {
            let size_bytes = serialized_size(value);
            let age_ms = entry_age_ms(value, now_ms);

            let large = size_bytes > LARGE_VALUE_THRESHOLD_BYTES;
            let old = age_ms > MAX_ENTRY_AGE.as_millis() as u64;

            (large || old).then(|| EvictionCandidate {
                key: key.clone(),
                size_bytes,
                age_ms,
            })
        })
        .collect()
}

/// Sort candidates descending by size, ties broken descending by age.
fn rank_candidates(mut candidates: Vec<EvictionCandidate>) -> Vec<EvictionCandidate> {
    candidates.sort_by(|a, b| {
        b.size_bytes
            .cmp(&a.size_bytes)
            .then(b.age_ms.cmp(&a.age_ms))
    });
    candidates
}

fn serialized_size(value: &Value) -> usize {
    serde_json::to_string(value).map_or(0, |s| s.len())
}

fn entry_age_ms(value: &Value, now_ms: i64) -> u64 {
    value
        .get("timestamp")
        .and_then(Value::as_i64)
        .map_or(0, |ts| now_ms.saturating_sub(ts).max(0) as u64)
}
