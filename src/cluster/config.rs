//! Configuration for the reconciliation engine.
//!
//! Built from the environment with [`ReconcilerConfig::from_env`] and checked with
//! [`ReconcilerConfig::validate`] before the first cycle:
//!
//! ```rust,no_run
//! use kraftctl::cluster::ReconcilerConfig;
//!
//! let config = ReconcilerConfig::from_env().expect("invalid environment");
//! if let Err(errors) = config.validate() {
//!     for error in errors {
//!         eprintln!("{}", error);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use super::acl::ClientIntent;
use super::error::{ReconcileError, ReconcileResult};
use super::listener::{AuthMechanism, AuthMode, ListenerScope, SecurityProtocol};
use super::migration::ProcessRoles;
use super::retry::RetryBudget;
use crate::constants::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_KAFKA_BIN_DIR, DEFAULT_LISTENER_PROBE_TIMEOUT_MS,
    DEFAULT_META_PROPERTIES_PATH, DEFAULT_STATE_FILE,
};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// `node.id` of the local node.
    pub node_id: i32,

    /// Host other nodes use to reach this one.
    pub node_host: String,

    /// Hosts of every other cluster member (probed with `all_nodes`).
    pub peer_hosts: Vec<String>,

    /// `host:port` of a controller, for `--bootstrap-controller`.
    pub bootstrap_controller: String,

    /// `host:port` of a broker, for `kafka-acls.sh --bootstrap-server`.
    ///
    /// When unset, the local internal listener in the active auth mode is used.
    pub acl_bootstrap_server: Option<String>,

    pub roles: ProcessRoles,

    /// Auth mode the cluster speaks before the migration.
    pub current_auth: AuthMode,

    /// Auth mode the cluster is migrating to.
    pub target_auth: AuthMode,

    pub meta_properties_path: PathBuf,

    /// Directory holding `kafka-*.sh`.
    pub kafka_bin_dir: PathBuf,

    /// Client properties passed as `--command-config`.
    pub admin_command_config: Option<PathBuf>,

    /// JVM options for the admin tools (`KAFKA_OPTS`).
    pub admin_opts: Vec<String>,

    pub state_file: PathBuf,

    /// JSON array of client intents; no ACL reconciliation when unset.
    pub acl_intents_file: Option<PathBuf>,

    pub listener_probe_timeout: Duration,

    /// Upper bound on one admin tool invocation.
    pub command_timeout: Duration,

    pub add_node_budget: RetryBudget,
    pub remove_node_budget: RetryBudget,
    pub acl_budget: RetryBudget,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        let scram = AuthMode::new(SecurityProtocol::SaslPlaintext, AuthMechanism::ScramSha512);
        Self {
            node_id: 0,
            node_host: "localhost".to_string(),
            peer_hosts: Vec::new(),
            bootstrap_controller: "localhost:9097".to_string(),
            acl_bootstrap_server: None,
            roles: ProcessRoles::COMBINED,
            current_auth: scram,
            target_auth: scram,
            meta_properties_path: PathBuf::from(DEFAULT_META_PROPERTIES_PATH),
            kafka_bin_dir: PathBuf::from(DEFAULT_KAFKA_BIN_DIR),
            admin_command_config: None,
            admin_opts: Vec::new(),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            acl_intents_file: None,
            listener_probe_timeout: Duration::from_millis(DEFAULT_LISTENER_PROBE_TIMEOUT_MS),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            add_node_budget: RetryBudget::add_node(),
            remove_node_budget: RetryBudget::remove_node(),
            acl_budget: RetryBudget::acl(),
        }
    }
}

impl ReconcilerConfig {
    /// Validate the configuration and return any errors found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.node_id < 0 {
            errors.push(format!("node_id must be non-negative, got {}", self.node_id));
        }

        if self.node_host.trim().is_empty() {
            errors.push("node_host cannot be empty".to_string());
        }

        if !is_host_port(&self.bootstrap_controller) {
            errors.push(format!(
                "bootstrap_controller must be host:port, got '{}'",
                self.bootstrap_controller
            ));
        }

        if let Some(server) = &self.acl_bootstrap_server {
            if !is_host_port(server) {
                errors.push(format!(
                    "acl_bootstrap_server must be host:port, got '{}'",
                    server
                ));
            }
        }

        if !self.roles.controller && !self.roles.broker {
            errors.push("roles must include broker, controller or both".to_string());
        }

        // The controller track ends by probing the target controller listener.
        if self.roles.controller {
            if let Err(e) = self.target_auth.port(ListenerScope::Controller) {
                errors.push(e.to_string());
            }
        }

        if self.listener_probe_timeout.is_zero() {
            errors.push("listener_probe_timeout must be greater than 0".to_string());
        }

        if self.command_timeout.is_zero() {
            errors.push("command_timeout must be greater than 0".to_string());
        }

        for (name, budget) in [
            ("add_node", self.add_node_budget),
            ("remove_node", self.remove_node_budget),
            ("acl", self.acl_budget),
        ] {
            if budget.max_attempts == 0 {
                errors.push(format!("{} max attempts must be at least 1", name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Broker address for ACL commands.
    ///
    /// Falls back to the local internal listener: the target mode once the
    /// migration has moved brokers over, the current mode before that.
    pub fn acl_bootstrap_server(&self, brokers_migrated: bool) -> ReconcileResult<String> {
        if let Some(server) = &self.acl_bootstrap_server {
            return Ok(server.clone());
        }
        let auth = if brokers_migrated {
            self.target_auth
        } else {
            self.current_auth
        };
        let port = auth.port(ListenerScope::Internal)?;
        Ok(format!("{}:{}", self.node_host, port))
    }

    /// Load the client intents, or none when no file is configured.
    pub async fn load_intents(&self) -> ReconcileResult<Option<Vec<ClientIntent>>> {
        let Some(path) = &self.acl_intents_file else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(path).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `NODE_ID`: node id (default: 0)
    /// - `NODE_HOST`: advertised host of this node (default: localhost)
    /// - `PEER_HOSTS`: comma-separated hosts of the other members
    /// - `BOOTSTRAP_CONTROLLER`: controller `host:port` (default: localhost:9097)
    /// - `ACL_BOOTSTRAP_SERVER`: broker `host:port` for ACL commands
    /// - `PROCESS_ROLES`: `broker`, `controller` or `broker,controller` (default)
    /// - `CURRENT_AUTH` / `TARGET_AUTH`: `PROTOCOL/MECHANISM` (default: SASL_PLAINTEXT/SCRAM-SHA-512)
    /// - `META_PROPERTIES_PATH`: identity file (default: /var/lib/kafka/data/meta.properties)
    /// - `KAFKA_BIN_DIR`: admin tool directory (default: /opt/kafka/bin)
    /// - `ADMIN_COMMAND_CONFIG`: `--command-config` properties file
    /// - `ADMIN_OPTS`: whitespace-separated JVM options for the admin tools
    /// - `STATE_FILE`: state document (default: /var/lib/kraftctl/state.json)
    /// - `ACL_INTENTS_FILE`: JSON array of client intents
    /// - `LISTENER_PROBE_TIMEOUT_MS`: listener probe timeout (default: 5000)
    /// - `COMMAND_TIMEOUT_SECS`: admin tool timeout (default: 120)
    ///
    /// Retry budgets:
    /// - `ADD_NODE_MAX_ATTEMPTS` / `ADD_NODE_RETRY_DELAY_SECS` (default: 4 / 15)
    /// - `REMOVE_NODE_MAX_ATTEMPTS` / `REMOVE_NODE_RETRY_DELAY_SECS` (default: 3 / 10)
    /// - `ACL_MAX_ATTEMPTS` / `ACL_RETRY_DELAY_SECS` (default: 3 / 5)
    pub fn from_env() -> ReconcileResult<Self> {
        let defaults = Self::default();

        let node_id: i32 = std::env::var("NODE_ID")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|e| ReconcileError::Config(format!("Invalid NODE_ID: {}", e)))?;

        if node_id < 0 {
            return Err(ReconcileError::Config(
                "NODE_ID must be non-negative".to_string(),
            ));
        }

        let node_host = std::env::var("NODE_HOST").unwrap_or(defaults.node_host);

        let peer_hosts = std::env::var("PEER_HOSTS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let bootstrap_controller =
            std::env::var("BOOTSTRAP_CONTROLLER").unwrap_or(defaults.bootstrap_controller);

        let acl_bootstrap_server = std::env::var("ACL_BOOTSTRAP_SERVER").ok();

        let roles = match std::env::var("PROCESS_ROLES") {
            Ok(value) => ProcessRoles::parse(&value).ok_or_else(|| {
                ReconcileError::Config(format!("Invalid PROCESS_ROLES: '{}'", value))
            })?,
            Err(_) => defaults.roles,
        };

        let current_auth = match std::env::var("CURRENT_AUTH") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.current_auth,
        };

        // Without an explicit target there is nothing to migrate to.
        let target_auth = match std::env::var("TARGET_AUTH") {
            Ok(value) => value.parse()?,
            Err(_) => current_auth,
        };

        let meta_properties_path = std::env::var("META_PROPERTIES_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.meta_properties_path);

        let kafka_bin_dir = std::env::var("KAFKA_BIN_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.kafka_bin_dir);

        let admin_command_config = std::env::var("ADMIN_COMMAND_CONFIG").ok().map(PathBuf::from);

        let admin_opts = std::env::var("ADMIN_OPTS")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let state_file = std::env::var("STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_file);

        let acl_intents_file = std::env::var("ACL_INTENTS_FILE").ok().map(PathBuf::from);

        let listener_probe_timeout = std::env::var("LISTENER_PROBE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.listener_probe_timeout);

        let command_timeout = std::env::var("COMMAND_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.command_timeout);

        Ok(Self {
            node_id,
            node_host,
            peer_hosts,
            bootstrap_controller,
            acl_bootstrap_server,
            roles,
            current_auth,
            target_auth,
            meta_properties_path,
            kafka_bin_dir,
            admin_command_config,
            admin_opts,
            state_file,
            acl_intents_file,
            listener_probe_timeout,
            command_timeout,
            add_node_budget: budget_from_env("ADD_NODE", defaults.add_node_budget),
            remove_node_budget: budget_from_env("REMOVE_NODE", defaults.remove_node_budget),
            acl_budget: budget_from_env("ACL", defaults.acl_budget),
        })
    }
}

/// Read `{prefix}_MAX_ATTEMPTS` and `{prefix}_RETRY_DELAY_SECS`, keeping defaults on absence or junk.
fn budget_from_env(prefix: &str, defaults: RetryBudget) -> RetryBudget {
    let max_attempts = std::env::var(format!("{}_MAX_ATTEMPTS", prefix))
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.max_attempts);

    let delay = std::env::var(format!("{}_RETRY_DELAY_SECS", prefix))
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(defaults.delay);

    RetryBudget::new(max_attempts, delay)
}

fn is_host_port(value: &str) -> bool {
    match value.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p > 0),
        None => false,
    }
}
