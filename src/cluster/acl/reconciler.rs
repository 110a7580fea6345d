//! Applies an [`AclPlan`] through the admin tool.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::command::{AclAction, AclTarget};
use super::diff::{AclPlan, reconcile};
use super::listing::parse_acl_listing;
use super::rule::Rule;
use crate::cluster::admin::{AdminCommand, CommandOutcome, execute};
use crate::cluster::error::{AdminOperation, ReconcileResult};
use crate::cluster::metrics::record_acl_mutation;
use crate::cluster::retry::RetryBudget;
use crate::constants::ACLS_KEYWORD;

/// Rules actually granted and revoked by one [`AclReconciler::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclOutcome {
    pub added: Vec<Rule>,
    pub removed: Vec<Rule>,
}

impl AclOutcome {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Grants and revokes rules, one command per rule.
pub struct AclReconciler {
    admin: Arc<dyn AdminCommand>,
    target: AclTarget,
    opts: Vec<String>,
    budget: RetryBudget,
}

impl AclReconciler {
    pub fn new(admin: Arc<dyn AdminCommand>, target: AclTarget) -> Self {
        Self {
            admin,
            target,
            opts: Vec::new(),
            budget: RetryBudget::acl(),
        }
    }

    /// JVM options passed to every invocation.
    pub fn with_opts(mut self, opts: Vec<String>) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_budget(mut self, budget: RetryBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Read the enforced rule set from the cluster.
    ///
    /// Single attempt: a failed listing defers the ACL step to the next cycle.
    pub async fn list_enforced(&self) -> ReconcileResult<HashSet<Rule>> {
        let outcome = execute(
            self.admin.as_ref(),
            AdminOperation::ListAcls,
            ACLS_KEYWORD,
            &self.target.list_args(),
            &self.opts,
            RetryBudget::immediate(1),
        )
        .await?;

        match outcome {
            CommandOutcome::Completed(stdout) => Ok(parse_acl_listing(&stdout)),
            CommandOutcome::AlreadyConverged(_) => Ok(HashSet::new()),
        }
    }

    /// List, diff against `desired`, and apply.
    pub async fn reconcile(&self, desired: &HashSet<Rule>) -> ReconcileResult<AclOutcome> {
        let enforced = self.list_enforced().await?;
        let plan = reconcile(desired, &enforced);
        self.apply(&plan).await
    }

    /// Apply a plan: every addition first, then every removal.
    ///
    /// Stops at the first rule whose budget is exhausted. Rules applied before
    /// the failure stay applied; the next cycle recomputes the plan.
    #[instrument(skip(self, plan), fields(to_add = plan.to_add.len(), to_remove = plan.to_remove.len()))]
    pub async fn apply(&self, plan: &AclPlan) -> ReconcileResult<AclOutcome> {
        let mut outcome = AclOutcome::default();

        for rule in plan.sorted_additions() {
            self.mutate(AclAction::Add, rule).await?;
            outcome.added.push(rule.clone());
        }

        for rule in plan.sorted_removals() {
            self.mutate(AclAction::Remove, rule).await?;
            outcome.removed.push(rule.clone());
        }

        if !outcome.is_empty() {
            info!(
                added = outcome.added.len(),
                removed = outcome.removed.len(),
                "ACLs reconciled"
            );
        }
        Ok(outcome)
    }

    async fn mutate(&self, action: AclAction, rule: &Rule) -> ReconcileResult<()> {
        let operation = match action {
            AclAction::Add => AdminOperation::GrantAcl,
            AclAction::Remove => AdminOperation::RevokeAcl,
        };
        let args = self.target.mutation_args(action, rule);

        match execute(
            self.admin.as_ref(),
            operation,
            ACLS_KEYWORD,
            &args,
            &self.opts,
            self.budget,
        )
        .await
        {
            Ok(_) => {
                record_acl_mutation(action.as_label());
                info!(action = action.as_label(), %rule, "ACL applied");
                Ok(())
            }
            Err(e) => {
                warn!(action = action.as_label(), %rule, error = %e, "ACL mutation failed");
                Err(e)
            }
        }
    }
}
