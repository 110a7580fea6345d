//! The ACL rule value type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::PREFIX_WILDCARD;

/// Kind of resource a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    Topic,
    Group,
}

impl ResourceType {
    /// Name used in the admin tool's listing report (`resourceType=TOPIC`).
    pub fn as_listing_name(&self) -> &'static str {
        match self {
            ResourceType::Topic => "TOPIC",
            ResourceType::Group => "GROUP",
        }
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TOPIC" => Ok(ResourceType::Topic),
            "GROUP" => Ok(ResourceType::Group),
            other => Err(format!("unsupported resource type '{}'", other)),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Topic => write!(f, "Topic"),
            ResourceType::Group => write!(f, "Group"),
        }
    }
}

/// Operations accepted by `kafka-acls.sh --operation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AclOperation {
    Read,
    Write,
    Create,
    Delete,
    Alter,
    Describe,
    ClusterAction,
    DescribeConfigs,
    AlterConfigs,
    IdempotentWrite,
    All,
}

impl AclOperation {
    /// Flag value for `--operation=`.
    pub fn as_flag(&self) -> &'static str {
        match self {
            AclOperation::Read => "Read",
            AclOperation::Write => "Write",
            AclOperation::Create => "Create",
            AclOperation::Delete => "Delete",
            AclOperation::Alter => "Alter",
            AclOperation::Describe => "Describe",
            AclOperation::ClusterAction => "ClusterAction",
            AclOperation::DescribeConfigs => "DescribeConfigs",
            AclOperation::AlterConfigs => "AlterConfigs",
            AclOperation::IdempotentWrite => "IdempotentWrite",
            AclOperation::All => "All",
        }
    }
}

impl FromStr for AclOperation {
    type Err = String;

    /// Accepts both the flag spelling (`DescribeConfigs`) and the listing
    /// spelling (`DESCRIBE_CONFIGS`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "READ" => Ok(AclOperation::Read),
            "WRITE" => Ok(AclOperation::Write),
            "CREATE" => Ok(AclOperation::Create),
            "DELETE" => Ok(AclOperation::Delete),
            "ALTER" => Ok(AclOperation::Alter),
            "DESCRIBE" => Ok(AclOperation::Describe),
            "CLUSTERACTION" => Ok(AclOperation::ClusterAction),
            "DESCRIBECONFIGS" => Ok(AclOperation::DescribeConfigs),
            "ALTERCONFIGS" => Ok(AclOperation::AlterConfigs),
            "IDEMPOTENTWRITE" => Ok(AclOperation::IdempotentWrite),
            "ALL" => Ok(AclOperation::All),
            _ => Err(format!("unsupported ACL operation '{}'", s)),
        }
    }
}

impl fmt::Display for AclOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}

/// One authorization rule.
///
/// Names are stored uniformly: a trailing `*` marks a prefix pattern. Only the
/// command emission boundary turns that into `--resource-pattern-type=PREFIXED`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rule {
    pub resource_type: ResourceType,
    pub resource_name: String,
    pub operation: AclOperation,
    /// Principal name without the `User:` prefix.
    pub principal: String,
}

impl Rule {
    pub fn new(
        resource_type: ResourceType,
        resource_name: impl Into<String>,
        operation: AclOperation,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            resource_name: resource_name.into(),
            operation,
            principal: principal.into(),
        }
    }

    pub fn topic(name: impl Into<String>, operation: AclOperation, principal: impl Into<String>) -> Self {
        Self::new(ResourceType::Topic, name, operation, principal)
    }

    pub fn group(name: impl Into<String>, operation: AclOperation, principal: impl Into<String>) -> Self {
        Self::new(ResourceType::Group, name, operation, principal)
    }

    /// Whether the resource name ends with the prefix wildcard.
    pub fn is_prefix_pattern(&self) -> bool {
        self.resource_name.ends_with(PREFIX_WILDCARD)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "User:{} {} {}:{}",
            self.principal, self.operation, self.resource_type, self.resource_name
        )
    }
}
