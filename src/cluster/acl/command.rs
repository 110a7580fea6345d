//! Command emission for `kafka-acls.sh`.
//!
//! This is the only place that interprets the trailing `*` on a resource name:
//!
//! | Rule | Emitted flags |
//! |------|---------------|
//! | Topic `shire` | `--topic=shire` |
//! | Topic `shire*` | `--topic=shire --resource-pattern-type=PREFIXED` |
//! | Group `frodo-` | `--group=frodo- --resource-pattern-type=PREFIXED` |

use std::path::PathBuf;

use super::rule::{ResourceType, Rule};
use crate::cluster::admin::command_config_args;
use crate::constants::PREFIX_WILDCARD;

/// Whether a command grants or revokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclAction {
    Add,
    Remove,
}

impl AclAction {
    /// Metric/log label.
    pub fn as_label(&self) -> &'static str {
        match self {
            AclAction::Add => "grant",
            AclAction::Remove => "revoke",
        }
    }
}

/// Connection flags shared by every `kafka-acls.sh` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclTarget {
    pub bootstrap_server: String,
    pub command_config: Option<PathBuf>,
}

impl AclTarget {
    pub fn new(bootstrap_server: impl Into<String>, command_config: Option<PathBuf>) -> Self {
        Self {
            bootstrap_server: bootstrap_server.into(),
            command_config,
        }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["--bootstrap-server".to_string(), self.bootstrap_server.clone()];
        args.extend(command_config_args(self.command_config.as_ref()));
        args
    }

    /// Arguments granting or revoking one rule.
    pub fn mutation_args(&self, action: AclAction, rule: &Rule) -> Vec<String> {
        let mut args = self.base_args();
        match action {
            AclAction::Add => args.push("--add".to_string()),
            AclAction::Remove => {
                args.push("--remove".to_string());
                args.push("--force".to_string());
            }
        }
        args.push(format!("--allow-principal=User:{}", rule.principal));
        args.push(format!("--operation={}", rule.operation.as_flag()));
        args.extend(resource_args(rule));
        args
    }

    /// Arguments listing every enforced rule.
    pub fn list_args(&self) -> Vec<String> {
        let mut args = self.base_args();
        args.push("--list".to_string());
        args
    }
}

/// Resource selector flags for a rule, choosing LITERAL or PREFIXED.
pub fn resource_args(rule: &Rule) -> Vec<String> {
    match rule.resource_type {
        ResourceType::Topic => match rule.resource_name.strip_suffix(PREFIX_WILDCARD) {
            Some(prefix) => vec![
                format!("--topic={}", prefix),
                "--resource-pattern-type=PREFIXED".to_string(),
            ],
            None => vec![format!("--topic={}", rule.resource_name)],
        },
        ResourceType::Group => {
            let name = rule
                .resource_name
                .strip_suffix(PREFIX_WILDCARD)
                .unwrap_or(&rule.resource_name);
            vec![
                format!("--group={}", name),
                "--resource-pattern-type=PREFIXED".to_string(),
            ]
        }
    }
}
