//! Service facade wiring all components together.

use std::sync::Arc;

use tracing::info;

use super::config::ServiceConfig;
use crate::batch::OperationBatcher;
use crate::fallback::FallbackChain;
use crate::host::HostProfile;
use crate::messaging::{MessageTransport, MessagingFacade};
use crate::quota::{EvictionManager, QuotaMonitor};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::storage::StorageFacade;
use crate::store::{KeyValueStore, QuotaEstimator};

/// The host bindings a service is built over.
///
/// The embedder implements the substrate traits over its host's primitives
/// and injects them here; the service never talks to the host directly.
pub struct Substrate {
    /// Primary storage bucket.
    pub store: Arc<dyn KeyValueStore>,
    /// Secondary bucket the fallback chain can proxy to.
    pub alternate_store: Option<Arc<dyn KeyValueStore>>,
    /// Usage-estimate primitive; absent on hosts without one.
    pub estimator: Option<Arc<dyn QuotaEstimator>>,
    /// Message-passing primitive.
    pub transport: Arc<dyn MessageTransport>,
}

/// High-level facade composing the whole resilience layer.
///
/// One service is constructed per process and owns all shared state (the
/// quota cache and the batch queue), keeping the singleton explicit,
/// testable and resettable between test cases.
///
/// # Example
///
/// ```ignore
/// use breakwater::service::{BreakwaterService, ServiceConfig, Substrate};
/// use breakwater::host::HostKind;
///
/// let config = ServiceConfig::for_host(HostKind::WebKit);
/// let service = BreakwaterService::new(config, substrate);
///
/// let entries = service.storage().get(&["settings".to_string()]).await?;
/// service.shutdown().await;
/// ```
pub struct BreakwaterService {
    profile: HostProfile,
    quota: Arc<QuotaMonitor>,
    storage: StorageFacade,
    messaging: MessagingFacade,
    batcher: Option<OperationBatcher>,
}

impl BreakwaterService {
    /// Wire a service from configuration and injected host bindings.
    pub fn new(config: ServiceConfig, substrate: Substrate) -> Self {
        let profile = config.profile();
        let retry = RetryExecutor::new(RetryPolicy::from_profile(&profile));

        let quota = Arc::new(QuotaMonitor::new(
            substrate.estimator.clone(),
            EvictionManager::new(Arc::clone(&substrate.store)),
            &profile,
        ));

        let fallback = FallbackChain::new(
            config.fallback_strategies.clone(),
            substrate.alternate_store.clone(),
        );

        let storage = StorageFacade::new(
            Arc::clone(&substrate.store),
            retry.clone(),
            Arc::clone(&quota),
            fallback,
        );

        let messaging = MessagingFacade::new(
            Arc::clone(&substrate.transport),
            retry.clone(),
            config.host,
            &profile,
            config.app_version.clone(),
        );

        let batcher = profile.enable_batching.then(|| {
            OperationBatcher::new(
                Arc::clone(&substrate.store),
                retry,
                Arc::clone(&quota),
                profile.batch_size,
                config.debounce_window,
            )
        });

        info!(
            host = %config.host,
            max_retries = profile.max_retries,
            batching = profile.enable_batching,
            "Resilience service started"
        );

        Self {
            profile,
            quota,
            storage,
            messaging,
            batcher,
        }
    }

    /// The storage surface.
    pub fn storage(&self) -> &StorageFacade {
        &self.storage
    }

    /// The messaging surface.
    pub fn messaging(&self) -> &MessagingFacade {
        &self.messaging
    }

    /// The batching front door, when the profile enables it.
    pub fn batcher(&self) -> Option<&OperationBatcher> {
        self.batcher.as_ref()
    }

    /// The quota monitor.
    pub fn quota(&self) -> &QuotaMonitor {
        &self.quota
    }

    /// The tuning profile this service runs with.
    pub fn profile(&self) -> &HostProfile {
        &self.profile
    }

    /// Flush residual batched work and stop timers.
    pub async fn shutdown(&self) {
        if let Some(batcher) = &self.batcher {
            batcher.shutdown().await;
        }
        info!("Resilience service shut down");
    }
}
