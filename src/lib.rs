//! # kraftctl
//! Cluster membership and authorization reconciliation for Kafka in KRaft mode.
//!
//! Each node runs a small engine that observes the cluster through the Kafka
//! admin tools and nudges it toward the desired state:
//!
//! - **Quorum membership**: join or leave the dynamic controller voter set, read
//!   quorum health from `kafka-metadata-quorum.sh describe --replication`
//! - **ACLs**: diff desired rules against enforced ones and apply the minimal
//!   grants and revocations
//! - **Listener migration**: move controllers, then brokers, to a new
//!   authentication mode without a window where they cannot reach each other
//!
//! Everything is idempotent. A cycle that fails or is interrupted is simply run
//! again; progress is persisted through a [`StateStore`](cluster::StateStore).
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kraftctl::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReconcilerConfig::from_env()?;
//!     let admin = Arc::new(ProcessAdminCommand::new(&config.kafka_bin_dir));
//!     let store = Arc::new(MemoryStateStore::new());
//!
//!     let desired = desired_rules(&[ClientIntent::producer("sam", "shire")]);
//!     let report = Reconciler::new(config, admin, store)
//!         .with_desired_rules(desired)
//!         .run_cycle()
//!         .await?;
//!     println!("{:?}", report.migration.action);
//!     Ok(())
//! }
//! ```
//!
//! See `demos/reconcile.rs` for a complete runner.

#![forbid(unsafe_code)]

pub mod cluster;
pub mod constants;
pub mod telemetry;

pub mod prelude {
    //! Common types for driving a reconciliation cycle.
    pub use crate::cluster::{
        AdminCommand, AuthMode, ClientIntent, CycleReport, JsonFileStateStore, MemoryStateStore,
        MigrationState, ProcessAdminCommand, ProcessRoles, ReconcileError, ReconcileResult,
        Reconciler, ReconcilerConfig, Rule, StateStore, desired_rules,
    };
    pub use crate::telemetry::{LogFormat, init_logging};
}
