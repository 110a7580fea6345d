//! Cluster membership and authorization reconciliation for KRaft Kafka.
//!
//! Each node runs its own engine; convergence comes from repeating cycles, not
//! from nodes talking to each other through this code.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │    Reconciler    │  one cycle per tick
//!                 └────────┬─────────┘
//!          ┌───────────────┼────────────────┐
//!          ▼               ▼                ▼
//!   ┌────────────┐  ┌─────────────┐  ┌──────────────┐
//!   │   Quorum   │  │  Listener   │  │     ACL      │
//!   │ membership │◄─│  migration  │  │  reconciler  │
//!   └─────┬──────┘  └──────┬──────┘  └──────┬───────┘
//!         │                │                │
//!         ▼                ▼                ▼
//!   ┌────────────┐   ┌────────────┐   ┌────────────┐
//!   │AdminCommand│   │ StateStore │   │AdminCommand│
//!   └────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kraftctl::cluster::{
//!     JsonFileStateStore, ProcessAdminCommand, Reconciler, ReconcilerConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReconcilerConfig::from_env()?;
//!     let admin = Arc::new(ProcessAdminCommand::new(&config.kafka_bin_dir));
//!     let store = Arc::new(JsonFileStateStore::new(&config.state_file));
//!     let report = Reconciler::new(config, admin, store).run_cycle().await?;
//!     println!("converged: {}", report.converged());
//!     Ok(())
//! }
//! ```

pub mod acl;
mod admin;
mod config;
mod error;
pub mod keys;
pub mod listener;
pub mod metrics;
pub mod migration;
pub mod quorum;
mod reconciler;
pub mod retry;
mod state_store;
mod status;

#[cfg(any(test, feature = "test-utilities"))]
pub mod mock_admin;

pub use acl::{
    AclOperation, AclOutcome, AclPlan, AclReconciler, ClientIntent, ResourceType, Rule,
    desired_rules, generate_consumer_rules, generate_producer_rules, parse_acl_listing, reconcile,
};
pub use admin::{AdminCommand, CommandError, CommandOutcome, ProcessAdminCommand};
pub use config::ReconcilerConfig;
pub use error::{AdminOperation, ErrorClass, ReconcileError, ReconcileResult, classify_error};
pub use listener::{
    AuthMechanism, AuthMode, ListenerProbe, ListenerScope, SecurityProtocol, TcpProbe,
};
pub use migration::{
    CycleInput, ListenerMigration, MigrationAction, MigrationReport, MigrationState,
    ProcessRoles, Stage, WaitReason, plan,
};
#[cfg(any(test, feature = "test-utilities"))]
pub use mock_admin::{MockAdmin, MockProbe, RecordedCall};
pub use quorum::{QuorumMembershipController, is_active_voter, leader_of, parse_directory_id};
pub use reconciler::{CycleReport, Reconciler};
pub use retry::RetryBudget;
pub use state_store::{JsonFileStateStore, MemoryStateStore, StateStore, StoredState};
pub use status::{QuorumNodeStatus, QuorumRole, parse_quorum_status};
