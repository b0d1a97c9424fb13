//! Quota usage monitoring with snapshot caching.
//!
//! Queries the host's usage-estimate primitive, caches the resulting
//! snapshot for the profile's validity window, and evaluates thresholds on
//! every fresh query: critical usage triggers an eviction pass, high usage
//! logs a warning (plus a predictive warning once past the cleanup
//! threshold). Nothing in this path ever returns an error — a missing or
//! failing estimator degrades to a zeroed snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::eviction::EvictionManager;
use crate::host::HostProfile;
use crate::store::{QuotaEstimate, QuotaEstimator};

/// Point-in-time measurement of storage usage versus capacity.
///
/// Snapshots are replaced wholesale on refresh, never mutated in place.
/// Serializable so embedders can relay them over the message bus.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UsageSnapshot {
    /// Bytes currently used.
    pub used_bytes: u64,
    /// Total bytes the host grants.
    pub quota_bytes: u64,
    /// `used / quota * 100`; 0 when the quota is 0.
    pub usage_percent: f64,
    /// Bytes still available; 0 when the quota is 0.
    pub available_bytes: u64,
    /// Epoch milliseconds at which the snapshot was captured.
    pub captured_at_ms: i64,
}

impl UsageSnapshot {
    fn from_estimate(estimate: QuotaEstimate, captured_at_ms: i64) -> Self {
        let usage_percent = if estimate.quota_bytes == 0 {
            0.0
        } else {
            estimate.usage_bytes as f64 / estimate.quota_bytes as f64 * 100.0
        };
        let available_bytes = if estimate.quota_bytes == 0 {
            0
        } else {
            estimate.quota_bytes.saturating_sub(estimate.usage_bytes)
        };

        Self {
            used_bytes: estimate.usage_bytes,
            quota_bytes: estimate.quota_bytes,
            usage_percent,
            available_bytes,
            captured_at_ms,
        }
    }

    fn zeroed(captured_at_ms: i64) -> Self {
        Self {
            used_bytes: 0,
            quota_bytes: 0,
            usage_percent: 0.0,
            available_bytes: 0,
            captured_at_ms,
        }
    }
}

/// Cached snapshot with its capture instant for validity checks.
struct CachedSnapshot {
    snapshot: UsageSnapshot,
    captured_at: Instant,
}

/// Monitors quota usage with caching and threshold-triggered eviction.
pub struct QuotaMonitor {
    estimator: Option<Arc<dyn QuotaEstimator>>,
    eviction: EvictionManager,
    warning_threshold_pct: f64,
    critical_threshold_pct: f64,
    cleanup_threshold_pct: f64,
    cache_timeout: Duration,
    cache: Mutex<Option<CachedSnapshot>>,
}

impl QuotaMonitor {
    /// Create a monitor over the given (optional) estimator.
    ///
    /// Thresholds and the cache validity window come from the host profile.
    pub fn new(
        estimator: Option<Arc<dyn QuotaEstimator>>,
        eviction: EvictionManager,
        profile: &HostProfile,
    ) -> Self {
        Self {
            estimator,
            eviction,
            warning_threshold_pct: profile.warning_threshold_pct as f64,
            critical_threshold_pct: profile.critical_threshold_pct as f64,
            cleanup_threshold_pct: profile.cleanup_threshold_pct as f64,
            cache_timeout: profile.cache_timeout,
            cache: Mutex::new(None),
        }
    }

    /// Current usage snapshot.
    ///
    /// Returns the cached snapshot unchanged while it is still valid and
    /// `force_refresh` is false. Otherwise queries the estimator, replaces
    /// the cache and evaluates thresholds (which may run an eviction pass).
    /// Never fails: estimator absence or failure yields a zeroed snapshot.
    pub async fn usage(&self, force_refresh: bool) -> UsageSnapshot {
        if !force_refresh {
            if let Some(snapshot) = self.cached() {
                debug!(
                    usage_percent = snapshot.usage_percent,
                    "Serving cached quota snapshot"
                );
                return snapshot;
            }
        }

        let snapshot = self.query_and_cache().await;
        self.evaluate_thresholds(&snapshot).await;
        snapshot
    }

    /// Drop the cached snapshot so the next query hits the estimator.
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    /// The eviction manager this monitor drives.
    pub fn eviction(&self) -> &EvictionManager {
        &self.eviction
    }

    fn cached(&self) -> Option<UsageSnapshot> {
        let cache = self.cache.lock();
        cache
            .as_ref()
            .filter(|cached| cached.captured_at.elapsed() < self.cache_timeout)
            .map(|cached| cached.snapshot)
    }

    /// Query the estimator and replace the cache, without evaluating
    /// thresholds.
    async fn query_and_cache(&self) -> UsageSnapshot {
        let now_ms = Utc::now().timestamp_millis();

        let snapshot = match &self.estimator {
            Some(estimator) => match estimator.estimate().await {
                Ok(estimate) => UsageSnapshot::from_estimate(estimate, now_ms),
                Err(err) => {
                    error!(error = %err, "Quota estimate failed, caching zeroed snapshot");
                    UsageSnapshot::zeroed(now_ms)
                }
            },
            None => {
                debug!("No quota estimator available, caching zeroed snapshot");
                UsageSnapshot::zeroed(now_ms)
            }
        };

        *self.cache.lock() = Some(CachedSnapshot {
            snapshot,
            captured_at: Instant::now(),
        });

        debug!(
            used_bytes = snapshot.used_bytes,
            quota_bytes = snapshot.quota_bytes,
            usage_percent = snapshot.usage_percent,
            "Quota snapshot refreshed"
        );

        snapshot
    }

    /// Evaluate thresholds against a freshly captured snapshot.
    ///
    /// Critical usage runs an eviction pass; when the pass removed anything,
    /// the cache is invalidated and refreshed without re-evaluating, so one
    /// `usage` call performs at most one pass.
    async fn evaluate_thresholds(&self, snapshot: &UsageSnapshot) {
        if snapshot.usage_percent >= self.critical_threshold_pct {
            error!(
                usage_percent = snapshot.usage_percent,
                threshold = self.critical_threshold_pct,
                "Storage usage critical, starting cleanup"
            );

            let outcome = self.eviction.cleanup().await;
            if outcome.removed > 0 {
                self.invalidate();
                let _ = self.query_and_cache().await;
            }
        } else if snapshot.usage_percent >= self.warning_threshold_pct {
            warn!(
                usage_percent = snapshot.usage_percent,
                threshold = self.warning_threshold_pct,
                "Storage usage high"
            );

            if snapshot.usage_percent >= self.cleanup_threshold_pct {
                warn!(
                    usage_percent = snapshot.usage_percent,
                    threshold = self.cleanup_threshold_pct,
                    "Approaching critical threshold, consider cleanup"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostKind;
    use crate::store::{Entries, KeyValueStore, MemoryStore, StoreError, StoreFuture};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Estimator returning a fixed estimate, counting calls.
    struct FixedEstimator {
        estimate: QuotaEstimate,
        calls: AtomicUsize,
    }

    impl FixedEstimator {
        fn new(usage_bytes: u64, quota_bytes: u64) -> Self {
            Self {
                estimate: QuotaEstimate {
                    usage_bytes,
                    quota_bytes,
                },
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl QuotaEstimator for FixedEstimator {
        fn estimate(&self) -> StoreFuture<'_, QuotaEstimate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let estimate = self.estimate;
            Box::pin(async move { Ok(estimate) })
        }
    }

    /// Estimator that always fails.
    struct BrokenEstimator;

    impl QuotaEstimator for BrokenEstimator {
        fn estimate(&self) -> StoreFuture<'_, QuotaEstimate> {
            Box::pin(async { Err(StoreError::Unavailable("no estimate".to_string())) })
        }
    }

    fn monitor_with(
        estimator: Option<Arc<dyn QuotaEstimator>>,
        store: Arc<dyn KeyValueStore>,
    ) -> QuotaMonitor {
        QuotaMonitor::new(
            estimator,
            EvictionManager::new(store),
            &HostProfile::for_host(HostKind::WebKit),
        )
    }

    #[tokio::test]
    async fn second_call_within_window_is_served_from_cache() {
        let estimator = Arc::new(FixedEstimator::new(100, 1000));
        let monitor = monitor_with(
            Some(estimator.clone() as Arc<dyn QuotaEstimator>),
            Arc::new(MemoryStore::new()),
        );

        let first = monitor.usage(false).await;
        let second = monitor.usage(false).await;

        assert_eq!(first, second);
        assert_eq!(estimator.calls(), 1);
    }

    #[tokio::test]
    async fn force_refresh_always_queries_the_estimator() {
        let estimator = Arc::new(FixedEstimator::new(100, 1000));
        let monitor = monitor_with(Some(estimator.clone() as Arc<dyn QuotaEstimator>), Arc::new(MemoryStore::new()));

        monitor.usage(false).await;
        monitor.usage(true).await;

        assert_eq!(estimator.calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_drops_the_cached_snapshot() {
        let estimator = Arc::new(FixedEstimator::new(100, 1000));
        let monitor = monitor_with(Some(estimator.clone() as Arc<dyn QuotaEstimator>), Arc::new(MemoryStore::new()));

        monitor.usage(false).await;
        monitor.invalidate();
        monitor.usage(false).await;

        assert_eq!(estimator.calls(), 2);
    }

    #[tokio::test]
    async fn usage_percent_is_computed_from_the_estimate() {
        let estimator = Arc::new(FixedEstimator::new(250, 1000));
        let monitor = monitor_with(Some(estimator as Arc<dyn QuotaEstimator>), Arc::new(MemoryStore::new()));

        let snapshot = monitor.usage(false).await;
        assert_eq!(snapshot.usage_percent, 25.0);
        assert_eq!(snapshot.available_bytes, 750);
    }

    #[tokio::test]
    async fn absent_estimator_yields_zeroed_snapshot() {
        let monitor = monitor_with(None, Arc::new(MemoryStore::new()));

        let snapshot = monitor.usage(true).await;
        assert_eq!(snapshot.used_bytes, 0);
        assert_eq!(snapshot.quota_bytes, 0);
        assert_eq!(snapshot.usage_percent, 0.0);
        assert_eq!(snapshot.available_bytes, 0);
        assert!(snapshot.captured_at_ms > 0);
    }

    #[tokio::test]
    async fn failing_estimator_degrades_to_zeroed_snapshot() {
        let monitor = monitor_with(Some(Arc::new(BrokenEstimator) as Arc<dyn QuotaEstimator>), Arc::new(MemoryStore::new()));

        let snapshot = monitor.usage(false).await;
        assert_eq!(snapshot.usage_percent, 0.0);

        // The zeroed snapshot is cached like any other.
        let cached = monitor.usage(false).await;
        assert_eq!(snapshot, cached);
    }

    #[tokio::test]
    async fn zero_quota_reports_zero_percent() {
        let estimator = Arc::new(FixedEstimator::new(500, 0));
        let monitor = monitor_with(Some(estimator as Arc<dyn QuotaEstimator>), Arc::new(MemoryStore::new()));

        let snapshot = monitor.usage(false).await;
        assert_eq!(snapshot.usage_percent, 0.0);
        assert_eq!(snapshot.available_bytes, 0);
    }

    #[tokio::test]
    async fn critical_usage_triggers_a_single_cleanup_pass() {
        // 960/1000 = 96% against a 95% critical threshold.
        let estimator = Arc::new(FixedEstimator::new(960, 1000));
        let store = Arc::new(MemoryStore::new());

        let mut entries = Entries::new();
        for i in 0..7 {
            entries.insert(format!("blob-{i}"), json!({ "blob": "x".repeat(2048) }));
        }
        store.set(entries).await.unwrap();

        let monitor = monitor_with(Some(estimator.clone() as Arc<dyn QuotaEstimator>), store.clone());
        monitor.usage(false).await;

        // One pass: removal capped at 5, and the post-cleanup refresh issued
        // exactly one further estimator call without re-running cleanup.
        assert_eq!(store.len(), 2);
        assert_eq!(estimator.calls(), 2);
    }

    #[tokio::test]
    async fn warning_usage_does_not_trigger_cleanup() {
        // 85% is over the WebKit warning threshold (80) but under critical (95).
        let estimator = Arc::new(FixedEstimator::new(850, 1000));
        let store = Arc::new(MemoryStore::new());
        store
            .set(Entries::from([(
                "blob".to_string(),
                json!({ "blob": "x".repeat(2048) }),
            )]))
            .await
            .unwrap();

        let monitor = monitor_with(Some(estimator.clone() as Arc<dyn QuotaEstimator>), store.clone());
        monitor.usage(false).await;

        assert_eq!(store.len(), 1);
        assert_eq!(estimator.calls(), 1);
    }

    #[tokio::test]
    async fn cleanup_with_no_removals_skips_the_refresh() {
        let estimator = Arc::new(FixedEstimator::new(990, 1000));
        let monitor = monitor_with(Some(estimator.clone() as Arc<dyn QuotaEstimator>), Arc::new(MemoryStore::new()));

        monitor.usage(false).await;

        // Critical, but the store held nothing removable: no second query.
        assert_eq!(estimator.calls(), 1);
    }
}
