//! Parser for the `kafka-acls.sh --list` report.
//!
//! ```text
//! Current ACLs for resource `ResourcePattern(resourceType=TOPIC, name=shire, patternType=LITERAL)`:
//!     (principal=User:sam, host=*, operation=WRITE, permissionType=ALLOW)
//!     (principal=User:sam, host=*, operation=CREATE, permissionType=ALLOW)
//! ```
//!
//! The result is the "enforced" set fed to [`reconcile`](super::reconcile).
//! Resources the engine does not manage (cluster, transactional ids, LITERAL
//! groups) and DENY entries are skipped. Parsing never fails.

use std::collections::HashSet;

use super::rule::{AclOperation, ResourceType, Rule};
use crate::constants::PREFIX_WILDCARD;

/// A resource header that opens a block of entries.
#[derive(Debug)]
struct Block {
    resource_type: ResourceType,
    resource_name: String,
}

/// Reconstruct the enforced rule set from a listing report.
pub fn parse_acl_listing(raw: &str) -> HashSet<Rule> {
    let mut rules = HashSet::new();
    let mut block: Option<Block> = None;

    for line in raw.lines() {
        if line.contains("resourceType=") {
            block = parse_header(line);
            continue;
        }

        let Some(current) = &block else {
            continue;
        };
        if let Some(rule) = parse_entry(line, current) {
            rules.insert(rule);
        }
    }

    rules
}

fn parse_header(line: &str) -> Option<Block> {
    let resource_type = field(line, "resourceType=")?.parse::<ResourceType>().ok()?;
    let name = field(line, "name=")?;
    let prefixed = field(line, "patternType=")
        .map(|p| p.eq_ignore_ascii_case("PREFIXED"))
        .unwrap_or(false);

    // Group rules are only ever granted PREFIXED.
    if resource_type == ResourceType::Group && !prefixed {
        return None;
    }

    let resource_name = if prefixed && resource_type == ResourceType::Topic {
        format!("{}{}", name, PREFIX_WILDCARD)
    } else {
        name.to_string()
    };

    Some(Block {
        resource_type,
        resource_name,
    })
}

fn parse_entry(line: &str, block: &Block) -> Option<Rule> {
    let principal = field(line, "principal=User:")?;
    let operation = field(line, "operation=")?.parse::<AclOperation>().ok()?;
    if let Some(permission) = field(line, "permissionType=") {
        if !permission.eq_ignore_ascii_case("ALLOW") {
            return None;
        }
    }

    Some(Rule::new(
        block.resource_type,
        block.resource_name.clone(),
        operation,
        principal,
    ))
}

/// Value following `key` up to the next `,` or `)`, trimmed.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let end = rest.find([',', ')']).unwrap_or(rest.len());
    let value = rest[..end].trim();
    if value.is_empty() { None } else { Some(value) }
}
