//! Logging initialization.
//!
//! Breakwater logs through `tracing` throughout; embedders that do not
//! install their own subscriber can call [`init_logging`] to get a console
//! subscriber filtered via the `RUST_LOG` environment variable (defaulting
//! to `info`).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Initialize a console logging subscriber.
///
/// # Errors
///
/// Returns an error when a global subscriber is already installed (for
/// example by the embedding application or a test harness).
pub fn init_logging() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()
}
