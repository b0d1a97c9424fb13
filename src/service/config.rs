//! Service configuration.

use std::time::Duration;

use crate::batch::DEFAULT_DEBOUNCE_WINDOW;
use crate::fallback::{FallbackChain, FallbackStrategy};
use crate::host::{detect, HostKind, HostProbe, HostProfile};

/// Configuration for a [`BreakwaterService`](super::BreakwaterService).
///
/// Selected once at startup; the derived profile is read-only thereafter.
/// There is no other configuration surface — no files, no CLI.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Detected (or assumed) host flavor.
    pub host: HostKind,
    /// Explicit profile override. When `None`, the host's table is used.
    pub profile: Option<HostProfile>,
    /// Version tag stamped onto outgoing messages.
    pub app_version: String,
    /// Delay between the first batched enqueue and the scheduled flush.
    pub debounce_window: Duration,
    /// Fallback strategy order for exhausted storage calls.
    pub fallback_strategies: Vec<FallbackStrategy>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: HostKind::Unknown,
            profile: None,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            fallback_strategies: FallbackChain::default_strategies(),
        }
    }
}

impl ServiceConfig {
    /// Configuration for a known host flavor.
    pub fn for_host(host: HostKind) -> Self {
        Self {
            host,
            ..Self::default()
        }
    }

    /// Detect the host via the given probe and configure for it.
    pub fn detect(probe: &dyn HostProbe) -> Self {
        Self::for_host(detect(probe))
    }

    /// The effective tuning profile.
    pub fn profile(&self) -> HostProfile {
        self.profile
            .clone()
            .unwrap_or_else(|| HostProfile::for_host(self.host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_assumes_an_unknown_host() {
        let config = ServiceConfig::default();
        assert_eq!(config.host, HostKind::Unknown);
        assert_eq!(config.profile(), HostProfile::gecko());
    }

    #[test]
    fn explicit_profile_overrides_the_host_table() {
        let config = ServiceConfig {
            profile: Some(HostProfile::chromium()),
            ..ServiceConfig::for_host(HostKind::WebKit)
        };
        assert_eq!(config.profile(), HostProfile::chromium());
    }
}
