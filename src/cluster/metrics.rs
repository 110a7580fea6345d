//! Prometheus metrics for the reconciliation engine.
//!
//! Metrics cover:
//! - Administrative commands (count per operation and outcome)
//! - Retry behavior (attempts, exhaustion, success per policy)
//! - ACL mutations (grants and revocations)
//! - Quorum observations (voters, observers)
//! - Listener migration (stage per track, probe results)
//!
//! # Registration
//!
//! Every metric lives in [`REGISTRY`], whose names carry the `kraftctl_` prefix.
//! A metric that fails to register keeps working detached from the registry, so
//! recording never panics.

use once_cell::sync::Lazy;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounterVec, IntGauge, IntGaugeVec, Registry, TextEncoder, opts};
use tracing::warn;

use super::migration::{MigrationState, Stage};

/// Custom Prometheus registry for kraftctl metrics.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("kraftctl".to_string()), None).unwrap_or_else(|_| Registry::new())
});

// =============================================================================
// Metric Declaration Macros
// =============================================================================

/// `define_gauge!(STATIC, "name", "help")`
macro_rules! define_gauge {
    ($name:ident, $metric_name:expr, $help:expr) => {
        #[doc = $help]
        pub static $name: Lazy<IntGauge> = Lazy::new(|| {
            register_or_warn(
                $metric_name,
                IntGauge::new($metric_name, $help).expect("metric name/help should be valid"),
            )
        });
    };
}

/// `define_gauge_vec!(STATIC, "name", "help", ["label", ...])`
macro_rules! define_gauge_vec {
    ($name:ident, $metric_name:expr, $help:expr, [$($label:expr),+ $(,)?]) => {
        #[doc = $help]
        pub static $name: Lazy<IntGaugeVec> = Lazy::new(|| {
            register_or_warn(
                $metric_name,
                IntGaugeVec::new(opts!($metric_name, $help), &[$($label),+])
                    .expect("metric opts should be valid"),
            )
        });
    };
}

/// `define_counter_vec!(STATIC, "name", "help", ["label", ...])`
macro_rules! define_counter_vec {
    ($name:ident, $metric_name:expr, $help:expr, [$($label:expr),+ $(,)?]) => {
        #[doc = $help]
        pub static $name: Lazy<IntCounterVec> = Lazy::new(|| {
            register_or_warn(
                $metric_name,
                IntCounterVec::new(opts!($metric_name, $help), &[$($label),+])
                    .expect("metric opts should be valid"),
            )
        });
    };
}

// =============================================================================
// Admin command metrics
// =============================================================================

define_counter_vec!(
    ADMIN_COMMANDS,
    "admin_commands_total",
    "Administrative commands by operation and outcome",
    ["operation", "outcome"]
);
define_counter_vec!(
    RETRY_ATTEMPTS,
    "retry_attempts_total",
    "Retry attempts by policy and outcome",
    ["policy", "outcome"]
);

// =============================================================================
// ACL metrics
// =============================================================================

define_counter_vec!(
    ACL_MUTATIONS,
    "acl_mutations_total",
    "ACL grants and revocations applied",
    ["action"]
);

// =============================================================================
// Quorum metrics
// =============================================================================

define_gauge_vec!(
    QUORUM_MEMBERS,
    "quorum_members",
    "Quorum members seen in the last describe, by role",
    ["role"]
);
define_gauge!(
    QUORUM_LEADER_ID,
    "quorum_leader_id",
    "Node id of the quorum leader in the last describe (-1 when unknown)"
);

// =============================================================================
// Listener migration metrics
// =============================================================================

define_gauge_vec!(
    MIGRATION_STAGE,
    "migration_stage",
    "Listener migration stage per track (0 = idle, 1 = done)",
    ["track"]
);
define_counter_vec!(
    LISTENER_PROBES,
    "listener_probes_total",
    "Listener liveness probes by scope and result",
    ["scope", "result"]
);

// =============================================================================
// Registration
// =============================================================================

/// Add `metric` to [`REGISTRY`]; on failure keep using it unregistered.
fn register_or_warn<C>(name: &str, metric: C) -> C
where
    C: Collector + Clone + 'static,
{
    if let Err(e) = REGISTRY.register(Box::new(metric.clone())) {
        warn!(name, error = %e, "Metric not registered, recording into a detached instance");
    }
    metric
}

/// Initialize the metrics registry by registering all metrics.
///
/// Idempotent; metrics are otherwise registered lazily on first access.
pub fn init_metrics() {
    let _ = &*ADMIN_COMMANDS;
    let _ = &*RETRY_ATTEMPTS;
    let _ = &*ACL_MUTATIONS;
    let _ = &*QUORUM_MEMBERS;
    let _ = &*QUORUM_LEADER_ID;
    let _ = &*MIGRATION_STAGE;
    let _ = &*LISTENER_PROBES;
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Gather all metric families from the registry.
pub fn gather_metrics() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

// =============================================================================
// Recording helpers
// =============================================================================

/// Record the outcome of one administrative command invocation.
///
/// `outcome` is one of `ok`, `benign`, `transient`, `fatal`.
pub fn record_admin_command(operation: &str, outcome: &str) {
    ADMIN_COMMANDS
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Record an applied ACL mutation (`grant` or `revoke`).
pub fn record_acl_mutation(action: &str) {
    ACL_MUTATIONS.with_label_values(&[action]).inc();
}

/// Record a listener probe result.
pub fn record_listener_probe(scope: &str, live: bool) {
    let result = if live { "live" } else { "unreachable" };
    LISTENER_PROBES.with_label_values(&[scope, result]).inc();
}

/// Record the shape of the quorum from the last describe.
pub fn record_quorum_observation(voters: usize, observers: usize, leader: Option<i32>) {
    QUORUM_MEMBERS
        .with_label_values(&["voter"])
        .set(voters as i64);
    QUORUM_MEMBERS
        .with_label_values(&["observer"])
        .set(observers as i64);
    QUORUM_LEADER_ID.set(leader.map(i64::from).unwrap_or(-1));
}

/// Publish the current migration stages.
pub fn record_migration_state(state: &MigrationState) {
    let value = |stage: Stage| if stage == Stage::Done { 1 } else { 0 };
    MIGRATION_STAGE
        .with_label_values(&["controller"])
        .set(value(state.controller_stage));
    MIGRATION_STAGE
        .with_label_values(&["broker"])
        .set(value(state.broker_stage));
}
