//! Authorization rule reconciliation.
//!
//! - [`rule`]: the [`Rule`] value type
//! - [`diff`]: rule generation from client intents and the desired/enforced diff
//! - [`command`]: `kafka-acls.sh` argument emission (LITERAL vs PREFIXED)
//! - [`listing`]: parser for the `--list` report
//! - [`reconciler`]: applies a plan through the admin tool
//!
//! The diff is pure set algebra. Pattern types exist only at the command
//! boundary, so a rule named `shire*` diffs like any other string.

pub mod command;
pub mod diff;
pub mod listing;
pub mod reconciler;
pub mod rule;

pub use command::{AclAction, AclTarget, resource_args};
pub use diff::{
    AclPlan, ClientIntent, ClientRole, default_consumer_group, desired_rules,
    generate_consumer_rules, generate_producer_rules, reconcile,
};
pub use listing::parse_acl_listing;
pub use reconciler::{AclOutcome, AclReconciler};
pub use rule::{AclOperation, ResourceType, Rule};
