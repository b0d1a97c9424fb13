//! Per-host tuning tables.
//!
//! Each host flavor gets a static profile covering retry budgets, backoff
//! bounds, quota thresholds, cache validity and batching. Selected once at
//! startup and read-only thereafter.

use std::time::Duration;

use super::detect::HostKind;

/// Immutable tuning table for one host flavor.
#[derive(Debug, Clone, PartialEq)]
pub struct HostProfile {
    /// Maximum attempts per logical substrate call.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap applied to every backoff delay.
    pub max_delay: Duration,
    /// Factor applied to the delay on each successive attempt.
    pub backoff_multiplier: f64,
    /// Usage percentage at which a warning is logged.
    pub warning_threshold_pct: u8,
    /// Usage percentage at which a cleanup pass is triggered.
    pub critical_threshold_pct: u8,
    /// Usage percentage at which a predictive warning is logged.
    pub cleanup_threshold_pct: u8,
    /// How long a cached quota snapshot stays valid.
    pub cache_timeout: Duration,
    /// Queue length that forces an immediate batch flush.
    pub batch_size: usize,
    /// Whether the operation batcher is constructed at all.
    pub enable_batching: bool,
    /// Whether values should be compressed before storage.
    pub enable_compression: bool,
    /// Whether outgoing messages carry a host platform tag.
    pub tag_outgoing_messages: bool,
}

impl HostProfile {
    /// Profile for the detected host.
    ///
    /// Unknown hosts receive the most cautious known profile: the Gecko
    /// table, with the largest retry budget, the longest delays and the
    /// smallest batches.
    pub fn for_host(kind: HostKind) -> Self {
        match kind {
            HostKind::WebKit => Self::webkit(),
            HostKind::Chromium => Self::chromium(),
            HostKind::Gecko | HostKind::Unknown => Self::gecko(),
        }
    }

    /// WebKit host tuning.
    pub fn webkit() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(150),
            max_delay: Duration::from_millis(1500),
            backoff_multiplier: 2.0,
            warning_threshold_pct: 80,
            critical_threshold_pct: 95,
            cleanup_threshold_pct: 90,
            cache_timeout: Duration::from_secs(30),
            batch_size: 10,
            enable_batching: true,
            enable_compression: true,
            tag_outgoing_messages: true,
        }
    }

    /// Chromium host tuning.
    pub fn chromium() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            warning_threshold_pct: 90,
            critical_threshold_pct: 98,
            cleanup_threshold_pct: 95,
            cache_timeout: Duration::from_secs(30),
            batch_size: 15,
            enable_batching: true,
            enable_compression: false,
            tag_outgoing_messages: false,
        }
    }

    /// Gecko host tuning.
    pub fn gecko() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
            backoff_multiplier: 2.0,
            warning_threshold_pct: 85,
            critical_threshold_pct: 95,
            cleanup_threshold_pct: 90,
            cache_timeout: Duration::from_secs(45),
            batch_size: 8,
            enable_batching: true,
            enable_compression: true,
            tag_outgoing_messages: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_host_gets_most_cautious_profile() {
        assert_eq!(
            HostProfile::for_host(HostKind::Unknown),
            HostProfile::gecko()
        );
    }

    #[test]
    fn chromium_has_smallest_retry_budget() {
        let chromium = HostProfile::chromium();
        assert_eq!(chromium.max_retries, 2);
        assert!(chromium.max_retries < HostProfile::webkit().max_retries);
        assert!(chromium.max_retries < HostProfile::gecko().max_retries);
    }

    #[test]
    fn only_webkit_tags_outgoing_messages() {
        assert!(HostProfile::webkit().tag_outgoing_messages);
        assert!(!HostProfile::chromium().tag_outgoing_messages);
        assert!(!HostProfile::gecko().tag_outgoing_messages);
    }

    #[test]
    fn thresholds_are_ordered_warning_cleanup_critical() {
        for profile in [
            HostProfile::webkit(),
            HostProfile::chromium(),
            HostProfile::gecko(),
        ] {
            assert!(profile.warning_threshold_pct <= profile.cleanup_threshold_pct);
            assert!(profile.cleanup_threshold_pct <= profile.critical_threshold_pct);
        }
    }
}
