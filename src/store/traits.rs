//! Substrate traits for dependency injection.
//!
//! The host's storage and quota primitives are injected behind these traits,
//! normalized to a uniform asynchronous-result interface at the boundary.
//! Everything above this layer (retry, batching, fallback) composes against
//! the traits, never against a concrete host binding.

use super::types::{Entries, QuotaEstimate, StoreFuture};

/// Asynchronous key-value store exposed by the host.
///
/// All methods may reject; callers are expected to wrap calls in the retry
/// executor rather than handling transient failures themselves.
///
/// # Example
///
/// ```ignore
/// use breakwater::store::{KeyValueStore, MemoryStore};
///
/// async fn read_keys(store: &dyn KeyValueStore) {
///     let entries = store.get(&["settings".to_string()]).await?;
///     println!("got {} entries", entries.len());
/// }
/// ```
pub trait KeyValueStore: Send + Sync {
    /// Fetch the entries for the given keys. Missing keys are absent from
    /// the returned map, not an error.
    fn get(&self, keys: &[String]) -> StoreFuture<'_, Entries>;

    /// Enumerate every stored entry. Used by the eviction pass to scan the
    /// full key set.
    fn get_all(&self) -> StoreFuture<'_, Entries>;

    /// Store the given entries, overwriting existing values per key.
    fn set(&self, entries: Entries) -> StoreFuture<'_, ()>;

    /// Remove the given keys. Removing an absent key is not an error.
    fn remove(&self, keys: &[String]) -> StoreFuture<'_, ()>;
}

/// Usage-estimate primitive exposed by the host.
///
/// Optional collaborator: hosts without one are handled by returning zeroed
/// snapshots from the quota monitor.
pub trait QuotaEstimator: Send + Sync {
    /// Query the host for current usage and total quota.
    fn estimate(&self) -> StoreFuture<'_, QuotaEstimate>;
}
