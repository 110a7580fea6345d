//! One reconciliation cycle for the local node.
//!
//! A cycle runs in a fixed order and awaits every command before the next step:
//!
//! 1. describe the quorum once (membership check, leader election result)
//! 2. load the persisted [`MigrationState`]
//! 3. plan and run the migration action (health checks, stage transition)
//! 4. persist the state if it moved
//! 5. reconcile ACLs on broker-role nodes and publish what changed
//!
//! Cycles are safe to repeat. A failed cycle leaves partial progress in place
//! and the next cycle recomputes from observed state.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::acl::{AclOutcome, AclReconciler, AclTarget, Rule};
use super::admin::AdminCommand;
use super::config::ReconcilerConfig;
use super::error::{ReconcileError, ReconcileResult};
use super::keys::{ACLS_ADDED_KEY, ACLS_REMOVED_KEY};
use super::listener::ListenerProbe;
use super::metrics::record_migration_state;
use super::migration::{ListenerMigration, MigrationReport, MigrationState, Stage};
use super::quorum::{QuorumMembershipController, leader_of};
use super::state_store::StateStore;

/// What one cycle observed and did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub node_id: i32,
    /// Leader reported by the quorum describe, if any.
    pub leader_id: Option<i32>,
    pub is_leader: bool,
    /// Members seen in the describe (voters and observers).
    pub quorum_size: usize,
    pub migration: MigrationReport,
    /// `None` when this node skipped the ACL step.
    pub acl: Option<AclOutcome>,
}

impl CycleReport {
    /// Nothing left to do for this node until intent changes.
    pub fn converged(&self) -> bool {
        self.migration.converged
    }
}

pub struct Reconciler {
    config: ReconcilerConfig,
    admin: Arc<dyn AdminCommand>,
    store: Arc<dyn StateStore>,
    quorum: QuorumMembershipController,
    desired_rules: Option<HashSet<Rule>>,
}

impl Reconciler {
    pub fn new(
        config: ReconcilerConfig,
        admin: Arc<dyn AdminCommand>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let quorum = QuorumMembershipController::new(
            Arc::clone(&admin),
            config.node_id,
            config.node_host.clone(),
        )
        .with_peer_hosts(config.peer_hosts.clone())
        .with_meta_properties_path(config.meta_properties_path.clone())
        .with_command_config(config.admin_command_config.clone())
        .with_opts(config.admin_opts.clone())
        .with_budgets(config.add_node_budget, config.remove_node_budget)
        .with_probe_timeout(config.listener_probe_timeout);

        Self {
            config,
            admin,
            store,
            quorum,
            desired_rules: None,
        }
    }

    /// Rules the cluster should enforce. Without them the ACL step is skipped.
    pub fn with_desired_rules(mut self, rules: HashSet<Rule>) -> Self {
        self.desired_rules = Some(rules);
        self
    }

    /// Replace the TCP liveness probe used by the migration health checks.
    pub fn with_listener_probe(mut self, probe: Arc<dyn ListenerProbe>) -> Self {
        self.quorum = self.quorum.with_probe(probe);
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn quorum(&self) -> &QuorumMembershipController {
        &self.quorum
    }

    /// Run one full cycle.
    #[instrument(skip(self), fields(node_id = self.config.node_id))]
    pub async fn run_cycle(&self) -> ReconcileResult<CycleReport> {
        let bootstrap = self.config.bootstrap_controller.as_str();

        let members = self.quorum.query_quorum(bootstrap).await;
        let leader_id = leader_of(&members);
        let is_leader = leader_id == Some(self.config.node_id);

        let state = self.store.load_migration_state().await?;
        let migration = ListenerMigration::new(
            &self.quorum,
            self.config.roles,
            self.config.target_auth,
            bootstrap,
        )
        .run_cycle(state, &members, self.store.as_ref())
        .await?;

        if migration.changed() {
            self.store.save_migration_state(migration.state).await?;
        }
        record_migration_state(&migration.state);

        let acl = self.reconcile_acls(migration.state).await?;

        let report = CycleReport {
            node_id: self.config.node_id,
            leader_id,
            is_leader,
            quorum_size: members.len(),
            migration,
            acl,
        };
        info!(
            leader_id = ?report.leader_id,
            action = ?report.migration.action,
            state = %report.migration.state,
            converged = report.converged(),
            "Reconciliation cycle finished"
        );
        Ok(report)
    }

    async fn reconcile_acls(&self, state: MigrationState) -> ReconcileResult<Option<AclOutcome>> {
        let Some(desired) = &self.desired_rules else {
            return Ok(None);
        };
        if !self.config.roles.broker {
            return Ok(None);
        }

        let server = self
            .config
            .acl_bootstrap_server(state.broker_stage == Stage::Done)?;
        let reconciler = AclReconciler::new(
            Arc::clone(&self.admin),
            AclTarget::new(server, self.config.admin_command_config.clone()),
        )
        .with_opts(self.config.admin_opts.clone())
        .with_budget(self.config.acl_budget);

        let outcome = reconciler.reconcile(desired).await?;
        self.store
            .publish(ACLS_ADDED_KEY, &serde_json::to_string(&outcome.added)?)
            .await?;
        self.store
            .publish(ACLS_REMOVED_KEY, &serde_json::to_string(&outcome.removed)?)
            .await?;
        Ok(Some(outcome))
    }

    /// Start a new migration: both tracks back to idle.
    pub async fn request_migration(&self) -> ReconcileResult<()> {
        let state = MigrationState::reset();
        self.store.save_migration_state(state).await?;
        record_migration_state(&state);
        info!("Listener migration requested");
        Ok(())
    }

    /// Remove this node from the voter set before it is retired.
    pub async fn decommission(&self) -> ReconcileResult<()> {
        let directory_id = self.quorum.read_directory_id().await.ok_or_else(|| {
            ReconcileError::Identity(format!(
                "no directory id in {}",
                self.quorum.meta_properties_path().display()
            ))
        })?;

        if let Err(e) = self
            .quorum
            .remove_node(
                self.config.node_id,
                &directory_id,
                &self.config.bootstrap_controller,
            )
            .await
        {
            warn!(error = %e, "Failed to leave controller quorum");
            return Err(e);
        }
        Ok(())
    }
}
