//! Error types for the reconciliation engine.
//!
//! # Error Handling Patterns
//!
//! The engine uses two patterns depending on what the caller does with the result:
//!
//! ## Propagated
//!
//! Used for mutations whose failure must defer the whole reconciliation cycle:
//! - Joining the quorum (`add_node`)
//! - Leaving the quorum (`remove_node`) for anything but the benign markers
//! - ACL grants and revocations
//!
//! ## Logged and swallowed
//!
//! Used for observation paths that feed a broader convergence loop:
//! - Quorum describe (`query_quorum` returns an empty map)
//! - Listener probes (an unreachable port is `false`, never an error)
//! - Directory id reads after a failed join
//!
//! # Error Classification
//!
//! The Kafka admin tools report failures only as free text on stderr, so every
//! failure is classified by pattern matching in [`classify_error`]. The result is
//! an [`ErrorClass`]:
//!
//! 1. **Benign**: the cluster is already in the requested state (treated as success)
//! 2. **Fatal**: credentials, authorization or usage problems
//! 3. **Transient**: everything else, including unknown text

use std::fmt;

use thiserror::Error;

use super::admin::CommandError;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// The administrative mutation or query a command failure belongs to.
///
/// Classification is operation-aware: `timeout` is benign for a voter removal
/// (the cluster is converging on the removal) but transient for a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminOperation {
    AddNode,
    RemoveNode,
    DescribeQuorum,
    GrantAcl,
    RevokeAcl,
    ListAcls,
}

impl AdminOperation {
    /// Returns a string label for metrics and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            AdminOperation::AddNode => "add_node",
            AdminOperation::RemoveNode => "remove_node",
            AdminOperation::DescribeQuorum => "describe_quorum",
            AdminOperation::GrantAcl => "grant_acl",
            AdminOperation::RevokeAcl => "revoke_acl",
            AdminOperation::ListAcls => "list_acls",
        }
    }
}

impl fmt::Display for AdminOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// How a command failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network or timing issue; retried within the operation's budget.
    Transient,
    /// The requested state already holds; reported as success and never retried.
    Benign,
    /// Credentials, authorization or invocation problem.
    Fatal,
}

impl ErrorClass {
    /// Returns a string label for metrics.
    pub fn as_metric_label(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Benign => "benign",
            ErrorClass::Fatal => "fatal",
        }
    }
}

/// Markers meaning the voter is already gone (or the removal is still propagating).
const REMOVE_NODE_BENIGN_PATTERNS: &[&str] = &["voternotfoundexception", "timeout"];

/// Markers meaning a concurrent identical grant already landed.
const GRANT_ACL_BENIGN_PATTERNS: &[&str] = &["already exists"];

/// Markers meaning the rule was already revoked.
const REVOKE_ACL_BENIGN_PATTERNS: &[&str] = &["no acls found", "does not exist"];

const FATAL_PATTERNS: &[&str] = &[
    "saslauthenticationexception",
    "authenticationexception",
    "authorizationexception",
    "not authorized",
    "unrecognizedoptionexception",
    "usage:",
];

/// Classify a command failure for the given operation from its stderr text.
///
/// Matching is case-insensitive. Benign markers take precedence over fatal ones,
/// so "ensure absent" operations stay idempotent even when the tool wraps the
/// not-found exception in a longer trace.
///
/// # Example
/// ```
/// use kraftctl::cluster::{AdminOperation, ErrorClass, classify_error};
///
/// let class = classify_error(
///     AdminOperation::RemoveNode,
///     "org.apache.kafka.common.errors.VoterNotFoundException: voter 3 not found",
/// );
/// assert_eq!(class, ErrorClass::Benign);
///
/// let class = classify_error(AdminOperation::AddNode, "Timed out waiting for a node");
/// assert_eq!(class, ErrorClass::Transient);
/// ```
pub fn classify_error(operation: AdminOperation, stderr: &str) -> ErrorClass {
    let msg = stderr.to_lowercase();

    let benign: &[&str] = match operation {
        AdminOperation::RemoveNode => REMOVE_NODE_BENIGN_PATTERNS,
        AdminOperation::GrantAcl => GRANT_ACL_BENIGN_PATTERNS,
        AdminOperation::RevokeAcl => REVOKE_ACL_BENIGN_PATTERNS,
        AdminOperation::AddNode | AdminOperation::DescribeQuorum | AdminOperation::ListAcls => &[],
    };

    if benign.iter().any(|p| msg.contains(p)) {
        ErrorClass::Benign
    } else if FATAL_PATTERNS.iter().any(|p| msg.contains(p)) {
        ErrorClass::Fatal
    } else {
        ErrorClass::Transient
    }
}

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// An administrative command failed after exhausting its retry budget.
    #[error("{operation} failed after {attempts} attempt(s) ({}): {source}", .class.as_metric_label())]
    Command {
        operation: AdminOperation,
        class: ErrorClass,
        attempts: u32,
        #[source]
        source: CommandError,
    },

    /// The node's on-disk identity could not be read.
    #[error("Identity error: {0}")]
    Identity(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No listener port is defined for the scope/auth combination.
    #[error("No {scope} listener for {auth}")]
    UnsupportedListener { scope: String, auth: String },

    /// The peer state store rejected a read or write.
    #[error("State store error: {0}")]
    StateStore(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconcileError {
    /// Check if re-running the cycle later may succeed without operator action.
    pub fn is_retriable(&self) -> bool {
        match self {
            ReconcileError::Command { class, .. } => *class != ErrorClass::Fatal,
            ReconcileError::Identity(_) => true,
            ReconcileError::StateStore(_) => true,
            ReconcileError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::InvalidInput
            ),
            ReconcileError::Config(_) => false,
            ReconcileError::UnsupportedListener { .. } => false,
            ReconcileError::Serde(_) => false,
        }
    }

    /// The stderr of the failed command, if this is a command failure.
    pub fn command_stderr(&self) -> Option<&str> {
        match self {
            ReconcileError::Command { source, .. } => Some(&source.stderr),
            _ => None,
        }
    }
}
