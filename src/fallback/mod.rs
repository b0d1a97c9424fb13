//! Degradation strategies for storage failures.
//!
//! Invoked only after the retry executor exhausts its attempts on a storage
//! call. Strategies are tried in configured order and the chain stops at
//! the first one that completes; a failing strategy is logged and the next
//! is tried. The default order puts the least destructive option first:
//! proxy to an alternate storage bucket, then serve from an in-memory
//! substitute, then surface the original error to the caller.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::store::{Entries, KeyValueStore, MemoryStore, StoreError};

/// One degradation strategy in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    /// Proxy the failed operation to an alternate storage bucket.
    AlternateStore,
    /// Serve from (and mirror into) a process-local in-memory substitute.
    Memory,
    /// Give up and surface the original error.
    Surface,
}

impl fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FallbackStrategy::AlternateStore => "alternate-store",
            FallbackStrategy::Memory => "memory",
            FallbackStrategy::Surface => "surface",
        };
        write!(f, "{}", name)
    }
}

/// The payload of a storage call that exhausted its retries.
#[derive(Debug, Clone)]
pub enum FailedOperation {
    /// A get with its keys and caller-supplied default values.
    Get {
        /// Keys that were requested.
        keys: Vec<String>,
        /// Defaults returned for keys no substitute can serve.
        defaults: Entries,
    },
    /// A set with the entries that were to be written.
    Set {
        /// Entries that were to be written.
        entries: Entries,
    },
    /// A remove with its keys.
    Remove {
        /// Keys that were to be removed.
        keys: Vec<String>,
    },
}

/// Ordered list of degradation strategies.
pub struct FallbackChain {
    strategies: Vec<FallbackStrategy>,
    alternate: Option<Arc<dyn KeyValueStore>>,
    memory: Arc<MemoryStore>,
}

impl FallbackChain {
    /// Default strategy order: alternate bucket, memory substitute, surface.
    pub fn default_strategies() -> Vec<FallbackStrategy> {
        vec![
            FallbackStrategy::AlternateStore,
            FallbackStrategy::Memory,
            FallbackStrategy::Surface,
        ]
    }

    /// Create a chain with the given strategy order.
    ///
    /// `alternate` is the optional secondary bucket the
    /// [`FallbackStrategy::AlternateStore`] strategy proxies to; without
    /// one that strategy always fails over to the next.
    pub fn new(
        strategies: Vec<FallbackStrategy>,
        alternate: Option<Arc<dyn KeyValueStore>>,
    ) -> Self {
        Self {
            strategies,
            alternate,
            memory: Arc::new(MemoryStore::new()),
        }
    }

    /// Handle a storage call whose retries are exhausted.
    ///
    /// Tries each strategy in order and returns the first success. When
    /// every strategy fails (or the chain reaches its surface terminal),
    /// the original `error` is returned to the caller.
    pub async fn handle_failure(
        &self,
        error: StoreError,
        operation: FailedOperation,
    ) -> Result<Entries, StoreError> {
        for strategy in &self.strategies {
            match self.try_strategy(*strategy, &error, &operation).await {
                Ok(result) => {
                    info!(strategy = %strategy, "Fallback strategy succeeded");
                    return Ok(result);
                }
                Err(strategy_error) => {
                    warn!(
                        strategy = %strategy,
                        error = %strategy_error,
                        "Fallback strategy failed"
                    );
                }
            }
        }

        Err(error)
    }

    /// The in-memory substitute backing the memory strategy.
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    async fn try_strategy(
        &self,
        strategy: FallbackStrategy,
        error: &StoreError,
        operation: &FailedOperation,
    ) -> Result<Entries, StoreError> {
        match strategy {
            FallbackStrategy::AlternateStore => {
                let store = self.alternate.as_ref().ok_or_else(|| {
                    StoreError::Unavailable("no alternate store configured".to_string())
                })?;
                run_against(store.as_ref(), operation).await
            }
            FallbackStrategy::Memory => {
                run_against(self.memory.as_ref(), operation).await
            }
            FallbackStrategy::Surface => Err(error.clone()),
        }
    }
}

/// Run the failed operation against a substitute store.
///
/// Gets overlay whatever the substitute holds over the caller-supplied
/// defaults, so missing keys still resolve.
async fn run_against(
    store: &dyn KeyValueStore,
    operation: &FailedOperation,
) -> Result<Entries, StoreError> {
    match operation {
        FailedOperation::Get { keys, defaults } => {
            let found = store.get(keys).await?;
            let mut result = defaults.clone();
            result.extend(found);
            Ok(result)
        }
        FailedOperation::Set { entries } => {
            store.set(entries.clone()).await?;
            Ok(Entries::new())
        }
        FailedOperation::Remove { keys } => {
            store.remove(keys).await?;
            Ok(Entries::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn original_error() -> StoreError {
        StoreError::Unavailable("primary down".to_string())
    }

    fn get_op(keys: &[&str], defaults: Entries) -> FailedOperation {
        FailedOperation::Get {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            defaults,
        }
    }

    #[tokio::test]
    async fn alternate_store_is_tried_first() {
        let alternate = Arc::new(MemoryStore::new());
        alternate
            .set(Entries::from([("a".to_string(), json!("alt"))]))
            .await
            .unwrap();

        let chain = FallbackChain::new(
            FallbackChain::default_strategies(),
            Some(alternate.clone() as Arc<dyn KeyValueStore>),
        );

        let result = chain
            .handle_failure(original_error(), get_op(&["a"], Entries::new()))
            .await
            .unwrap();

        assert_eq!(result["a"], json!("alt"));
        // The memory substitute was never touched.
        assert!(chain.memory().is_empty());
    }

    #[tokio::test]
    async fn missing_alternate_falls_through_to_memory_defaults() {
        let chain = FallbackChain::new(FallbackChain::default_strategies(), None);
        let defaults = Entries::from([("theme".to_string(), json!("light"))]);

        let result = chain
            .handle_failure(original_error(), get_op(&["theme"], defaults.clone()))
            .await
            .unwrap();

        assert_eq!(result, defaults);
    }

    #[tokio::test]
    async fn memory_substitute_retains_failed_sets() {
        let chain = FallbackChain::new(FallbackChain::default_strategies(), None);

        chain
            .handle_failure(
                original_error(),
                FailedOperation::Set {
                    entries: Entries::from([("a".to_string(), json!(1))]),
                },
            )
            .await
            .unwrap();

        let result = chain
            .handle_failure(original_error(), get_op(&["a"], Entries::new()))
            .await
            .unwrap();

        assert_eq!(result["a"], json!(1));
    }

    #[tokio::test]
    async fn surface_terminal_returns_the_original_error() {
        let chain = FallbackChain::new(vec![FallbackStrategy::Surface], None);

        let err = chain
            .handle_failure(original_error(), get_op(&["a"], Entries::new()))
            .await
            .unwrap_err();

        assert_eq!(err, original_error());
    }

    #[tokio::test]
    async fn strategies_run_in_configured_order() {
        // Memory listed before the alternate: the memory substitute answers
        // even though the alternate holds a value.
        let alternate = Arc::new(MemoryStore::new());
        alternate
            .set(Entries::from([("a".to_string(), json!("alt"))]))
            .await
            .unwrap();

        let chain = FallbackChain::new(
            vec![FallbackStrategy::Memory, FallbackStrategy::AlternateStore],
            Some(alternate as Arc<dyn KeyValueStore>),
        );
        chain
            .memory()
            .set(Entries::from([("a".to_string(), json!("mem"))]))
            .await
            .unwrap();

        let result = chain
            .handle_failure(original_error(), get_op(&["a"], Entries::new()))
            .await
            .unwrap();

        assert_eq!(result["a"], json!("mem"));
    }

    #[tokio::test]
    async fn exhausted_chain_returns_the_original_error() {
        // Only the alternate strategy, and no alternate configured.
        let chain = FallbackChain::new(vec![FallbackStrategy::AlternateStore], None);

        let err = chain
            .handle_failure(
                original_error(),
                FailedOperation::Remove {
                    keys: vec!["a".to_string()],
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err, original_error());
    }
}
