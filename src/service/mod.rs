//! High-level service facade.
//!
//! Wires the whole resilience layer — profile, retry, quota monitoring,
//! fallback chain, storage and messaging facades, and the optional batcher —
//! into one explicitly constructed object with an init/teardown lifecycle.
//!
//! # Example
//!
//! ```ignore
//! use breakwater::service::{BreakwaterService, ServiceConfig, Substrate};
//!
//! let config = ServiceConfig::detect(&probe);
//! let service = BreakwaterService::new(config, substrate);
//!
//! service.storage().set(entries).await?;
//! let usage = service.storage().quota_usage(false).await;
//! service.shutdown().await;
//! ```

mod config;
mod facade;

pub use config::ServiceConfig;
pub use facade::{BreakwaterService, Substrate};
