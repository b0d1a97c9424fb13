//! Breakwater - resilience layer for host storage and messaging substrates
//!
//! Browser-extension hosts expose a quota-limited, asynchronous key-value
//! store and a cross-context message bus, and both are flaky: calls reject
//! transiently, quotas run out, chatty callers burn the host's rate limits.
//! Breakwater sits between application code and those primitives and makes
//! them behave predictably: transient failures are retried with capped
//! exponential backoff, quota usage is monitored and shed proactively,
//! bursts of operations are coalesced, and exhausted calls degrade through
//! an ordered fallback chain instead of failing outright.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use breakwater::service::{BreakwaterService, ServiceConfig, Substrate};
//!
//! let config = ServiceConfig::detect(&probe);
//! let service = BreakwaterService::new(config, substrate);
//!
//! // Resilient storage access
//! let entries = service.storage().get(&["settings".to_string()]).await?;
//!
//! // Resilient messaging with envelope metadata
//! let response = service.messaging().send(message).await?;
//!
//! service.shutdown().await;
//! ```
//!
//! The substrate itself — the host's store, quota estimator and message
//! transport — is injected by the embedder as trait objects; breakwater
//! wraps an already-provided primitive, it does not define one.

pub mod batch;
pub mod fallback;
pub mod host;
pub mod logging;
pub mod messaging;
pub mod quota;
pub mod retry;
pub mod service;
pub mod storage;
pub mod store;

/// Version of the breakwater library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
