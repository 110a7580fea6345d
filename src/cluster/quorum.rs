//! Quorum membership controller.
//!
//! Adds and removes this node from the dynamic KRaft voter set, reads the quorum
//! report, and probes listener liveness. All mutations go through the admin
//! tool with a fixed-delay [`RetryBudget`].
//!
//! # Commands
//!
//! | Operation | Arguments (after `--bootstrap-controller <b>`) | Budget |
//! |-----------|-----------------------------------------------|--------|
//! | [`add_node`](QuorumMembershipController::add_node) | `add-controller` | 4 x 15s |
//! | [`remove_node`](QuorumMembershipController::remove_node) | `remove-controller --controller-id <id> --controller-directory-id <dir>` | 3 x 10s |
//! | [`query_quorum`](QuorumMembershipController::query_quorum) | `describe --replication` | single attempt |
//!
//! The output of `add-controller` is not trusted for identity; the directory id
//! is always re-read from `meta.properties`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::admin::{AdminCommand, CommandOutcome, command_config_args, execute};
use super::error::{AdminOperation, ReconcileError, ReconcileResult};
use super::listener::{AuthMode, ListenerProbe, ListenerScope, TcpProbe};
use super::metrics::{record_listener_probe, record_quorum_observation};
use super::retry::RetryBudget;
use super::status::{QuorumNodeStatus, QuorumRole, parse_quorum_status};
use crate::constants::{
    DEFAULT_LISTENER_PROBE_TIMEOUT_MS, DEFAULT_META_PROPERTIES_PATH, DIRECTORY_ID_KEY,
    METADATA_QUORUM_KEYWORD,
};

/// Extract the directory id from the contents of `meta.properties`.
///
/// The first line starting with `directory.id` yields the text after `=`.
pub fn parse_directory_id(contents: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with(DIRECTORY_ID_KEY))
        .and_then(|line| line.split_once('='))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub struct QuorumMembershipController {
    admin: Arc<dyn AdminCommand>,
    node_id: i32,
    node_host: String,
    peer_hosts: Vec<String>,
    meta_properties_path: PathBuf,
    command_config: Option<PathBuf>,
    opts: Vec<String>,
    add_budget: RetryBudget,
    remove_budget: RetryBudget,
    probe: Arc<dyn ListenerProbe>,
    probe_timeout: Duration,
}

impl QuorumMembershipController {
    pub fn new(admin: Arc<dyn AdminCommand>, node_id: i32, node_host: impl Into<String>) -> Self {
        Self {
            admin,
            node_id,
            node_host: node_host.into(),
            peer_hosts: Vec::new(),
            meta_properties_path: PathBuf::from(DEFAULT_META_PROPERTIES_PATH),
            command_config: None,
            opts: Vec::new(),
            add_budget: RetryBudget::add_node(),
            remove_budget: RetryBudget::remove_node(),
            probe: Arc::new(TcpProbe),
            probe_timeout: Duration::from_millis(DEFAULT_LISTENER_PROBE_TIMEOUT_MS),
        }
    }

    /// Hosts of the other cluster members, probed when `all_nodes` is set.
    pub fn with_peer_hosts(mut self, peer_hosts: Vec<String>) -> Self {
        self.peer_hosts = peer_hosts;
        self
    }

    pub fn with_meta_properties_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.meta_properties_path = path.into();
        self
    }

    /// Properties file passed as `--command-config`.
    pub fn with_command_config(mut self, path: Option<PathBuf>) -> Self {
        self.command_config = path;
        self
    }

    pub fn with_opts(mut self, opts: Vec<String>) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_budgets(mut self, add: RetryBudget, remove: RetryBudget) -> Self {
        self.add_budget = add;
        self.remove_budget = remove;
        self
    }

    /// Replace the TCP liveness probe.
    pub fn with_probe(mut self, probe: Arc<dyn ListenerProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    pub fn node_host(&self) -> &str {
        &self.node_host
    }

    pub fn meta_properties_path(&self) -> &Path {
        &self.meta_properties_path
    }

    fn quorum_args(&self, bootstrap: &str, subcommand: &[&str]) -> Vec<String> {
        let mut args = vec!["--bootstrap-controller".to_string(), bootstrap.to_string()];
        args.extend(command_config_args(self.command_config.as_ref()));
        args.extend(subcommand.iter().map(|s| s.to_string()));
        args
    }

    /// Join the voter set through `bootstrap`; returns this node's directory id.
    ///
    /// When every attempt fails the directory id is still read and logged, then
    /// the last command error is returned.
    #[instrument(skip(self), fields(node_id = self.node_id))]
    pub async fn add_node(&self, bootstrap: &str) -> ReconcileResult<String> {
        let args = self.quorum_args(bootstrap, &["add-controller"]);
        let result = execute(
            self.admin.as_ref(),
            AdminOperation::AddNode,
            METADATA_QUORUM_KEYWORD,
            &args,
            &self.opts,
            self.add_budget,
        )
        .await;

        match result {
            Ok(_) => {
                let directory_id = self.read_directory_id().await.ok_or_else(|| {
                    ReconcileError::Identity(format!(
                        "{} has no {}",
                        self.meta_properties_path.display(),
                        DIRECTORY_ID_KEY
                    ))
                })?;
                info!(directory_id = %directory_id, "Joined controller quorum");
                Ok(directory_id)
            }
            Err(e) => {
                let directory_id = self.read_directory_id().await;
                warn!(
                    directory_id = ?directory_id,
                    error = %e,
                    "Failed to join controller quorum"
                );
                Err(e)
            }
        }
    }

    /// Leave the voter set. A voter that is already gone counts as success.
    #[instrument(skip(self))]
    pub async fn remove_node(
        &self,
        node_id: i32,
        directory_id: &str,
        bootstrap: &str,
    ) -> ReconcileResult<()> {
        let node = node_id.to_string();
        let args = self.quorum_args(
            bootstrap,
            &[
                "remove-controller",
                "--controller-id",
                node.as_str(),
                "--controller-directory-id",
                directory_id,
            ],
        );

        match execute(
            self.admin.as_ref(),
            AdminOperation::RemoveNode,
            METADATA_QUORUM_KEYWORD,
            &args,
            &self.opts,
            self.remove_budget,
        )
        .await?
        {
            CommandOutcome::Completed(_) => info!("Removed controller from quorum"),
            CommandOutcome::AlreadyConverged(_) => info!("Controller already absent from quorum"),
        }
        Ok(())
    }

    /// Current quorum members keyed by node id; empty when the describe fails.
    pub async fn query_quorum(&self, bootstrap: &str) -> HashMap<i32, QuorumNodeStatus> {
        let args = self.quorum_args(bootstrap, &["describe", "--replication"]);
        let stdout = match execute(
            self.admin.as_ref(),
            AdminOperation::DescribeQuorum,
            METADATA_QUORUM_KEYWORD,
            &args,
            &self.opts,
            RetryBudget::immediate(1),
        )
        .await
        {
            Ok(CommandOutcome::Completed(stdout)) => stdout,
            Ok(CommandOutcome::AlreadyConverged(_)) => return HashMap::new(),
            Err(e) => {
                warn!(bootstrap, error = %e, "Failed to describe quorum");
                return HashMap::new();
            }
        };

        let members: HashMap<i32, QuorumNodeStatus> = parse_quorum_status(&stdout)
            .into_iter()
            .map(|status| (status.node_id, status))
            .collect();

        let voters = members.values().filter(|m| m.role.is_voter()).count();
        record_quorum_observation(
            voters,
            members.len() - voters,
            leader_of(&members),
        );
        debug!(members = members.len(), voters, "Described quorum");
        members
    }

    /// Node id of the current leader, if the describe succeeded and shows one.
    pub async fn quorum_leader(&self, bootstrap: &str) -> Option<i32> {
        leader_of(&self.query_quorum(bootstrap).await)
    }

    /// Whether `node_id` is an active voter (leader or follower).
    pub async fn is_voter_or_follower(&self, node_id: i32, bootstrap: &str) -> bool {
        is_active_voter(&self.query_quorum(bootstrap).await, node_id)
    }

    /// Probe the `(scope, auth)` listener on this node, or on every known member.
    ///
    /// With `all_nodes` the probe stops at the first unreachable member.
    pub async fn check_listener_live(
        &self,
        scope: ListenerScope,
        auth: AuthMode,
        all_nodes: bool,
    ) -> bool {
        let port = match auth.port(scope) {
            Ok(port) => port,
            Err(e) => {
                warn!(error = %e, "No listener to probe");
                record_listener_probe(scope.as_label(), false);
                return false;
            }
        };

        let local = std::iter::once(self.node_host.as_str());
        let peers = self
            .peer_hosts
            .iter()
            .map(String::as_str)
            .filter(|h| *h != self.node_host);
        let hosts: Vec<&str> = if all_nodes {
            local.chain(peers).collect()
        } else {
            local.collect()
        };

        for host in hosts {
            let live = self.probe.is_reachable(host, port, self.probe_timeout).await;
            record_listener_probe(scope.as_label(), live);
            if !live {
                info!(host, port, listener = %auth.listener_name(scope), "Listener not reachable");
                return false;
            }
        }
        true
    }

    /// Read this node's directory id from `meta.properties`.
    pub async fn read_directory_id(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.meta_properties_path).await {
            Ok(contents) => parse_directory_id(&contents),
            Err(e) => {
                debug!(
                    path = %self.meta_properties_path.display(),
                    error = %e,
                    "meta.properties not readable"
                );
                None
            }
        }
    }
}

/// Leader among described members.
pub fn leader_of(members: &HashMap<i32, QuorumNodeStatus>) -> Option<i32> {
    members
        .values()
        .find(|m| m.role == QuorumRole::Leader)
        .map(|m| m.node_id)
}

pub fn is_active_voter(members: &HashMap<i32, QuorumNodeStatus>, node_id: i32) -> bool {
    members
        .get(&node_id)
        .is_some_and(|status| status.role.is_voter())
}
