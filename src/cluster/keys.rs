//! Keys the engine publishes to the cluster state store.
//!
//! | Key | Value |
//! |-----|-------|
//! | `bootstrap-controller` | `host:port` of the controller listener in the target auth mode |
//! | `controller-stage` | `idle` or `done` |
//! | `broker-stage` | `idle` or `done` |
//! | `acls-added` | JSON array of rules granted in the last cycle |
//! | `acls-removed` | JSON array of rules revoked in the last cycle |
//!
//! Consumers of these keys are other nodes' engines and the deployment tooling;
//! values are overwritten each time they are published.

pub const BOOTSTRAP_CONTROLLER_KEY: &str = "bootstrap-controller";

pub const CONTROLLER_STAGE_KEY: &str = "controller-stage";

pub const BROKER_STAGE_KEY: &str = "broker-stage";

pub const ACLS_ADDED_KEY: &str = "acls-added";

pub const ACLS_REMOVED_KEY: &str = "acls-removed";

/// Every published key.
pub const PUBLISHED_KEYS: &[&str] = &[
    BOOTSTRAP_CONTROLLER_KEY,
    CONTROLLER_STAGE_KEY,
    BROKER_STAGE_KEY,
    ACLS_ADDED_KEY,
    ACLS_REMOVED_KEY,
];

/// `host:port` value for [`BOOTSTRAP_CONTROLLER_KEY`].
pub fn bootstrap_address(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}
