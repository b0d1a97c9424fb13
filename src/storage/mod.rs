//! Public storage surface.
//!
//! `StorageFacade` is the get/set/remove API application code calls. Every
//! physical operation runs through the retry executor; success triggers a
//! quota refresh, exhaustion routes the original payload through the
//! fallback chain.

use std::sync::Arc;

use tracing::debug;

use crate::fallback::{FailedOperation, FallbackChain};
use crate::quota::{QuotaMonitor, UsageSnapshot};
use crate::retry::RetryExecutor;
use crate::store::{Entries, KeyValueStore, StoreError};

/// Resilient get/set/remove over the substrate store.
pub struct StorageFacade {
    store: Arc<dyn KeyValueStore>,
    retry: RetryExecutor,
    quota: Arc<QuotaMonitor>,
    fallback: FallbackChain,
}

impl StorageFacade {
    /// Compose a facade from its collaborators.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        retry: RetryExecutor,
        quota: Arc<QuotaMonitor>,
        fallback: FallbackChain,
    ) -> Self {
        Self {
            store,
            retry,
            quota,
            fallback,
        }
    }

    /// Fetch the entries for the given keys.
    pub async fn get(&self, keys: &[String]) -> Result<Entries, StoreError> {
        self.get_inner(keys.to_vec(), Entries::new()).await
    }

    /// Fetch entries with caller-supplied defaults.
    ///
    /// The defaults' keys are the request; stored values overlay the
    /// defaults in the result, and the fallback chain's substitutes keep
    /// honoring them when the substrate is unreachable.
    pub async fn get_with_defaults(&self, defaults: Entries) -> Result<Entries, StoreError> {
        let keys: Vec<String> = defaults.keys().cloned().collect();
        self.get_inner(keys, defaults).await
    }

    /// Store the given entries.
    pub async fn set(&self, entries: Entries) -> Result<(), StoreError> {
        let attempt_entries = entries.clone();
        let result = self
            .retry
            .run("storage set", move || {
                self.store.set(attempt_entries.clone())
            })
            .await;

        match result {
            Ok(()) => {
                self.refresh_quota().await;
                Ok(())
            }
            Err(err) => self
                .fallback
                .handle_failure(err.into(), FailedOperation::Set { entries })
                .await
                .map(|_| ()),
        }
    }

    /// Remove the given keys.
    pub async fn remove(&self, keys: &[String]) -> Result<(), StoreError> {
        let result = self
            .retry
            .run("storage remove", || self.store.remove(keys))
            .await;

        match result {
            Ok(()) => {
                self.refresh_quota().await;
                Ok(())
            }
            Err(err) => self
                .fallback
                .handle_failure(
                    err.into(),
                    FailedOperation::Remove {
                        keys: keys.to_vec(),
                    },
                )
                .await
                .map(|_| ()),
        }
    }

    /// Current quota snapshot, optionally bypassing the cache.
    pub async fn quota_usage(&self, force_refresh: bool) -> UsageSnapshot {
        self.quota.usage(force_refresh).await
    }

    /// The fallback chain behind this facade.
    pub fn fallback(&self) -> &FallbackChain {
        &self.fallback
    }

    async fn get_inner(
        &self,
        keys: Vec<String>,
        defaults: Entries,
    ) -> Result<Entries, StoreError> {
        let result = self.retry.run("storage get", || self.store.get(&keys)).await;

        match result {
            Ok(found) => {
                self.refresh_quota().await;
                let mut merged = defaults;
                merged.extend(found);
                Ok(merged)
            }
            Err(err) => {
                self.fallback
                    .handle_failure(err.into(), FailedOperation::Get { keys, defaults })
                    .await
            }
        }
    }

    /// Cache-respecting quota refresh after a successful operation.
    async fn refresh_quota(&self) {
        let snapshot = self.quota.usage(false).await;
        debug!(
            usage_percent = snapshot.usage_percent,
            "Quota checked after storage operation"
        );
    }
}
