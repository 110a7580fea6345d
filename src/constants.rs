//! Centralized command, report-format and retry constants.
//!
//! # Categories
//!
//! - **Admin Tool Constants**: keywords and report formats of the Kafka CLI tools
//! - **Retry Budgets**: attempts and fixed delays per administrative mutation
//! - **Defaults**: paths and timeouts used when the environment is silent

// =============================================================================
// Admin Tool Constants
// =============================================================================

/// Keyword for `kafka-metadata-quorum.sh` (add/remove controller, describe).
pub const METADATA_QUORUM_KEYWORD: &str = "metadata-quorum";

/// Keyword for `kafka-acls.sh`.
pub const ACLS_KEYWORD: &str = "acls";

/// Key in `meta.properties` holding the node's directory id.
pub const DIRECTORY_ID_KEY: &str = "directory.id";

/// Number of columns in a `describe --replication` row.
///
/// NodeId, DirectoryId, LogEndOffset, Lag, LastFetchTimestamp,
/// LastCaughtUpTimestamp, Status. Shorter rows are noise.
pub const QUORUM_STATUS_MIN_FIELDS: usize = 7;

/// Suffix appended to a principal to form its default consumer group prefix.
pub const CONSUMER_GROUP_SUFFIX: &str = "-";

/// Trailing marker on a resource name denoting a PREFIXED pattern.
pub const PREFIX_WILDCARD: char = '*';

// =============================================================================
// Retry Budgets
// =============================================================================

/// Attempts for joining the quorum (initial attempt included).
pub const ADD_NODE_MAX_ATTEMPTS: u32 = 4;

/// Fixed delay between join attempts.
pub const ADD_NODE_RETRY_DELAY_SECS: u64 = 15;

/// Attempts for leaving the quorum.
pub const REMOVE_NODE_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between leave attempts.
pub const REMOVE_NODE_RETRY_DELAY_SECS: u64 = 10;

/// Attempts for a single ACL grant or revoke.
pub const ACL_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between ACL mutation attempts.
pub const ACL_RETRY_DELAY_SECS: u64 = 5;

// =============================================================================
// Defaults
// =============================================================================

/// Upper bound on a single admin tool invocation.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

/// TCP connect timeout for listener liveness probes.
pub const DEFAULT_LISTENER_PROBE_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_KAFKA_BIN_DIR: &str = "/opt/kafka/bin";

pub const DEFAULT_META_PROPERTIES_PATH: &str = "/var/lib/kafka/data/meta.properties";

pub const DEFAULT_STATE_FILE: &str = "/var/lib/kraftctl/state.json";
