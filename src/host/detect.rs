//! Host platform detection.
//!
//! The host flavor is inferred from ambient capability markers exposed by
//! the embedding process. Probing is isolated behind [`HostProbe`] so the
//! detection logic stays pure and mockable; unknown hosts degrade to
//! [`HostKind::Unknown`] rather than erroring.

use std::fmt;

use tracing::debug;

/// The host flavors this layer tunes itself for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    /// Chromium-family host.
    Chromium,
    /// Gecko-family host.
    Gecko,
    /// WebKit-family host.
    WebKit,
    /// Unrecognized host; treated with the most cautious known profile.
    Unknown,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostKind::Chromium => "chromium",
            HostKind::Gecko => "gecko",
            HostKind::WebKit => "webkit",
            HostKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Ambient capability markers of the embedding host.
///
/// Implemented by the embedder over whatever globals or bridge objects its
/// runtime exposes. Detection never calls into the substrate itself.
pub trait HostProbe: Send + Sync {
    /// Whether the WebKit extension bridge is present.
    fn has_webkit_bridge(&self) -> bool;

    /// Whether the Chromium extension namespace is present.
    fn has_chromium_bridge(&self) -> bool;

    /// Whether the Gecko runtime API is present.
    fn has_gecko_bridge(&self) -> bool;
}

/// Detect the host flavor from the given probe.
///
/// Precedence mirrors how the markers overlap in practice: the WebKit bridge
/// is checked first (WebKit hosts also expose a Chromium-compatible
/// namespace), then Chromium, then Gecko. Pure detection with no side
/// effects; failure to recognize anything yields [`HostKind::Unknown`].
pub fn detect(probe: &dyn HostProbe) -> HostKind {
    let kind = if probe.has_webkit_bridge() {
        HostKind::WebKit
    } else if probe.has_chromium_bridge() {
        HostKind::Chromium
    } else if probe.has_gecko_bridge() {
        HostKind::Gecko
    } else {
        HostKind::Unknown
    };

    debug!(host = %kind, "Detected host platform");
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe {
        webkit: bool,
        chromium: bool,
        gecko: bool,
    }

    impl HostProbe for FixedProbe {
        fn has_webkit_bridge(&self) -> bool {
            self.webkit
        }

        fn has_chromium_bridge(&self) -> bool {
            self.chromium
        }

        fn has_gecko_bridge(&self) -> bool {
            self.gecko
        }
    }

    #[test]
    fn webkit_takes_precedence_over_chromium() {
        let probe = FixedProbe {
            webkit: true,
            chromium: true,
            gecko: false,
        };
        assert_eq!(detect(&probe), HostKind::WebKit);
    }

    #[test]
    fn chromium_detected_without_webkit() {
        let probe = FixedProbe {
            webkit: false,
            chromium: true,
            gecko: false,
        };
        assert_eq!(detect(&probe), HostKind::Chromium);
    }

    #[test]
    fn gecko_detected_last() {
        let probe = FixedProbe {
            webkit: false,
            chromium: false,
            gecko: true,
        };
        assert_eq!(detect(&probe), HostKind::Gecko);
    }

    #[test]
    fn no_markers_degrades_to_unknown() {
        let probe = FixedProbe {
            webkit: false,
            chromium: false,
            gecko: false,
        };
        assert_eq!(detect(&probe), HostKind::Unknown);
    }
}
