//! Observability plumbing for Warden.
//!
//! - **Logging**: structured `tracing` output, JSON in production and pretty
//!   in development, filtered through an `EnvFilter`
//! - **Metrics**: names and descriptions of the counters the authorization
//!   drivers record through the `metrics` facade
//!
//! # Standard Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `warden_rbac_permission_cache_hits_total` | Counter | Cached permission lookups |
//! | `warden_rbac_permission_cache_misses_total` | Counter | Permission fetches |
//! | `warden_rbac_cache_flushes_total` | Counter | Cache flushes on upstream change |
//! | `warden_rbac_sync_failures_total` | Counter | Failed full resource syncs |

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};
pub use metrics::describe_metrics;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
