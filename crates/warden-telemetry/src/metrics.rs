//! Metric names emitted by the authorization drivers.
//!
//! The drivers record through the `metrics` facade; whichever recorder the
//! embedding daemon installs receives them. [`describe_metrics`] attaches
//! help text once a recorder is in place.

use metrics::describe_counter;

/// Permission lookups answered from the RBAC cache.
pub const RBAC_CACHE_HITS: &str = "warden_rbac_permission_cache_hits_total";

/// Permission lookups that required a fetch from the policy server.
pub const RBAC_CACHE_MISSES: &str = "warden_rbac_permission_cache_misses_total";

/// Whole-cache flushes triggered by change notifications.
pub const RBAC_CACHE_FLUSHES: &str = "warden_rbac_cache_flushes_total";

/// Failed full resource synchronizations.
pub const RBAC_SYNC_FAILURES: &str = "warden_rbac_sync_failures_total";

/// Every metric name, in registration order.
pub const ALL: [&str; 4] = [
    RBAC_CACHE_HITS,
    RBAC_CACHE_MISSES,
    RBAC_CACHE_FLUSHES,
    RBAC_SYNC_FAILURES,
];

/// Registers descriptions for the driver metrics with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        RBAC_CACHE_HITS,
        "Permission lookups served from the RBAC permission cache"
    );
    describe_counter!(
        RBAC_CACHE_MISSES,
        "Permission lookups that fetched from the RBAC policy server"
    );
    describe_counter!(
        RBAC_CACHE_FLUSHES,
        "RBAC permission cache flushes caused by upstream changes"
    );
    describe_counter!(
        RBAC_SYNC_FAILURES,
        "Failed full project resource synchronizations"
    );
}
