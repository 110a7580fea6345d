//! Desired-vs-enforced set algebra.
//!
//! Pure functions only: rule generation from client intents and the diff
//! between two rule sets. Nothing here knows about command syntax or pattern
//! types; see [`super::command`] for that.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::rule::{AclOperation, Rule};
use crate::constants::CONSUMER_GROUP_SUFFIX;

/// The minimal set of changes that moves `enforced` to `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclPlan {
    /// `desired − enforced`
    pub to_add: HashSet<Rule>,
    /// `enforced − desired`
    pub to_remove: HashSet<Rule>,
}

impl AclPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Total number of mutations in the plan.
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }

    /// Additions in a stable order, for deterministic command emission.
    pub fn sorted_additions(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.to_add.iter().collect();
        rules.sort();
        rules
    }

    /// Removals in a stable order.
    pub fn sorted_removals(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.to_remove.iter().collect();
        rules.sort();
        rules
    }
}

/// Compute the plan that turns `enforced` into `desired`.
///
/// # Example
/// ```
/// use std::collections::HashSet;
/// use kraftctl::cluster::acl::{generate_producer_rules, reconcile};
///
/// let desired = generate_producer_rules("shire", "sam");
/// let plan = reconcile(&desired, &HashSet::new());
/// assert_eq!(plan.to_add.len(), 3);
/// assert!(plan.to_remove.is_empty());
/// ```
pub fn reconcile(desired: &HashSet<Rule>, enforced: &HashSet<Rule>) -> AclPlan {
    AclPlan {
        to_add: desired.difference(enforced).cloned().collect(),
        to_remove: enforced.difference(desired).cloned().collect(),
    }
}

/// Rules letting `principal` produce to `topic`: Create, Write, Describe.
pub fn generate_producer_rules(topic: &str, principal: &str) -> HashSet<Rule> {
    [
        AclOperation::Create,
        AclOperation::Write,
        AclOperation::Describe,
    ]
    .into_iter()
    .map(|op| Rule::topic(topic, op, principal))
    .collect()
}

/// Rules letting `principal` consume `topic` through `group`.
///
/// Read and Describe on the topic plus Read on the group. Without an explicit
/// group the principal's own prefix `"{principal}-"` is used.
pub fn generate_consumer_rules(topic: &str, principal: &str, group: Option<&str>) -> HashSet<Rule> {
    let group = match group {
        Some(g) => g.to_string(),
        None => default_consumer_group(principal),
    };

    let mut rules: HashSet<Rule> = [AclOperation::Read, AclOperation::Describe]
        .into_iter()
        .map(|op| Rule::topic(topic, op, principal))
        .collect();
    rules.insert(Rule::group(group, AclOperation::Read, principal));
    rules
}

/// Default consumer group prefix for a principal.
pub fn default_consumer_group(principal: &str) -> String {
    format!("{}{}", principal, CONSUMER_GROUP_SUFFIX)
}

/// What a client is allowed to do with a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    Producer,
    Consumer,
}

/// One client's access request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIntent {
    pub principal: String,
    pub topic: String,
    pub role: ClientRole,
    /// Consumer group; ignored for producers.
    #[serde(default)]
    pub group: Option<String>,
}

impl ClientIntent {
    pub fn producer(principal: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            topic: topic.into(),
            role: ClientRole::Producer,
            group: None,
        }
    }

    pub fn consumer(
        principal: impl Into<String>,
        topic: impl Into<String>,
        group: Option<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            topic: topic.into(),
            role: ClientRole::Consumer,
            group,
        }
    }

    /// The rules this intent requires.
    pub fn rules(&self) -> HashSet<Rule> {
        match self.role {
            ClientRole::Producer => generate_producer_rules(&self.topic, &self.principal),
            ClientRole::Consumer => {
                generate_consumer_rules(&self.topic, &self.principal, self.group.as_deref())
            }
        }
    }
}

/// Fold client intents into one desired rule set.
pub fn desired_rules<'a>(intents: impl IntoIterator<Item = &'a ClientIntent>) -> HashSet<Rule> {
    intents.into_iter().flat_map(ClientIntent::rules).collect()
}
