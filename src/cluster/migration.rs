//! Listener migration state machine.
//!
//! Rolls a cluster from one controller-listener auth mode to another without a
//! window where controllers and brokers cannot reach each other. Two tracks,
//! each `Idle -> Done`, persisted between cycles by the caller:
//!
//! ```text
//!   controller track:  Idle ──(new controller listener live on leader)──> Done
//!   broker track:      Idle ──(controller Done, new internal listener live)──> Done
//! ```
//!
//! # Transitions
//!
//! | Roles | Leader | Controller | Broker | Action |
//! |-------|--------|------------|--------|--------|
//! | controller | yes | Idle | * | probe new controller listener; co-located broker moves too |
//! | broker | - | Done | Idle | probe new internal listener |
//! | controller | yes | Done | Done | publish the new bootstrap controller |
//! | controller | no | * | * | join the quorum if not a voter, otherwise wait |
//! | controller | ? | * | * | wait while the quorum cannot be described |
//! | otherwise | | | | wait (not yet converged) |
//!
//! Planning ([`plan`]) and state advancement ([`MigrationState::advance`]) are
//! pure. [`ListenerMigration`] performs the probes and publications.
//!
//! # Invariants
//!
//! - A track never goes back from `Done` except through [`MigrationState::reset`].
//! - `broker_stage == Done` implies `controller_stage == Done`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::error::ReconcileResult;
use super::keys::{BOOTSTRAP_CONTROLLER_KEY, bootstrap_address};
use super::listener::{AuthMode, ListenerScope};
use super::quorum::{QuorumMembershipController, is_active_voter, leader_of};
use super::state_store::StateStore;
use super::status::QuorumNodeStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Idle,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted progress of one migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MigrationState {
    pub controller_stage: Stage,
    pub broker_stage: Stage,
}

impl MigrationState {
    pub fn is_complete(&self) -> bool {
        self.controller_stage == Stage::Done && self.broker_stage == Stage::Done
    }

    /// Both tracks back to idle; only for a newly requested migration.
    pub fn reset() -> Self {
        Self::default()
    }

    /// State after `action` ran and its probe reported `healthy`.
    ///
    /// Unhealthy probes and actions without a probe leave the state unchanged.
    /// Stages only move forward.
    pub fn advance(self, action: &MigrationAction, healthy: bool) -> Self {
        if !healthy {
            return self;
        }
        match action {
            MigrationAction::ProbeController { co_located_broker } => Self {
                controller_stage: Stage::Done,
                broker_stage: if *co_located_broker {
                    Stage::Done
                } else {
                    self.broker_stage
                },
            },
            MigrationAction::ProbeBroker if self.controller_stage == Stage::Done => Self {
                broker_stage: Stage::Done,
                ..self
            },
            _ => self,
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "controller={} broker={}",
            self.controller_stage, self.broker_stage
        )
    }
}

/// `process.roles` of the local node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRoles {
    pub controller: bool,
    pub broker: bool,
}

impl ProcessRoles {
    pub const CONTROLLER: Self = Self {
        controller: true,
        broker: false,
    };
    pub const BROKER: Self = Self {
        controller: false,
        broker: true,
    };
    pub const COMBINED: Self = Self {
        controller: true,
        broker: true,
    };

    /// Parse a `process.roles` value such as `broker,controller`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut roles = Self::default();
        for role in value.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            match role.to_ascii_lowercase().as_str() {
                "controller" => roles.controller = true,
                "broker" => roles.broker = true,
                _ => return None,
            }
        }
        Some(roles)
    }
}

impl fmt::Display for ProcessRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.broker, self.controller) {
            (true, true) => write!(f, "broker,controller"),
            (true, false) => write!(f, "broker"),
            (false, true) => write!(f, "controller"),
            (false, false) => write!(f, ""),
        }
    }
}

/// Everything the planner looks at besides the persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleInput {
    pub roles: ProcessRoles,
    pub is_leader: bool,
    /// The quorum describe returned at least one member.
    pub quorum_visible: bool,
}

/// Why a cycle made no transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitReason {
    /// Broker waits for the controller track.
    AwaitingController,
    /// Leader has finished its track; dedicated brokers still have to move.
    AwaitingBrokers,
    /// Nothing left for this node.
    Complete,
    /// The node has neither role.
    NoRole,
    /// The quorum describe failed or was empty; leadership is unknown.
    QuorumUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationAction {
    /// Probe the new controller listener locally.
    ProbeController { co_located_broker: bool },
    /// Probe the new internal listener locally.
    ProbeBroker,
    /// Publish the new bootstrap controller address.
    PublishBootstrap,
    /// Non-leader controller: join the quorum if not already a voter.
    EnsureMembership,
    Wait(WaitReason),
}

/// Decide this cycle's action.
///
/// ```
/// use kraftctl::cluster::{CycleInput, MigrationAction, MigrationState, ProcessRoles, plan};
///
/// let input = CycleInput {
///     roles: ProcessRoles::CONTROLLER,
///     is_leader: true,
///     quorum_visible: true,
/// };
/// assert_eq!(
///     plan(&input, MigrationState::default()),
///     MigrationAction::ProbeController { co_located_broker: false }
/// );
/// ```
pub fn plan(input: &CycleInput, state: MigrationState) -> MigrationAction {
    let CycleInput {
        roles,
        is_leader,
        quorum_visible,
    } = *input;

    if roles.controller {
        if !quorum_visible {
            return MigrationAction::Wait(WaitReason::QuorumUnavailable);
        }
        if !is_leader {
            return MigrationAction::EnsureMembership;
        }
        return match (state.controller_stage, state.broker_stage) {
            (Stage::Idle, _) => MigrationAction::ProbeController {
                co_located_broker: roles.broker,
            },
            (Stage::Done, Stage::Done) => MigrationAction::PublishBootstrap,
            (Stage::Done, Stage::Idle) if roles.broker => MigrationAction::ProbeBroker,
            (Stage::Done, Stage::Idle) => MigrationAction::Wait(WaitReason::AwaitingBrokers),
        };
    }

    if roles.broker {
        return match (state.controller_stage, state.broker_stage) {
            (Stage::Done, Stage::Idle) => MigrationAction::ProbeBroker,
            (Stage::Idle, _) => MigrationAction::Wait(WaitReason::AwaitingController),
            (Stage::Done, Stage::Done) => MigrationAction::Wait(WaitReason::Complete),
        };
    }

    MigrationAction::Wait(WaitReason::NoRole)
}

/// Outcome of one migration cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub action: MigrationAction,
    pub previous: MigrationState,
    pub state: MigrationState,
    /// Bootstrap address published this cycle, if any.
    pub published_bootstrap: Option<String>,
    /// Directory id returned by a quorum join this cycle, if any.
    pub joined_directory_id: Option<String>,
    /// Both tracks done.
    pub converged: bool,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        self.previous != self.state
    }
}

/// Executes planned migration actions for the local node.
pub struct ListenerMigration<'a> {
    quorum: &'a QuorumMembershipController,
    roles: ProcessRoles,
    target_auth: AuthMode,
    bootstrap: &'a str,
}

impl<'a> ListenerMigration<'a> {
    pub fn new(
        quorum: &'a QuorumMembershipController,
        roles: ProcessRoles,
        target_auth: AuthMode,
        bootstrap: &'a str,
    ) -> Self {
        Self {
            quorum,
            roles,
            target_auth,
            bootstrap,
        }
    }

    /// Run one cycle from `state` against the quorum members described this
    /// cycle. The caller persists `report.state`.
    #[instrument(skip_all, fields(node_id = self.quorum.node_id(), %state))]
    pub async fn run_cycle(
        &self,
        state: MigrationState,
        members: &HashMap<i32, QuorumNodeStatus>,
        store: &dyn StateStore,
    ) -> ReconcileResult<MigrationReport> {
        let node_id = self.quorum.node_id();
        let input = CycleInput {
            roles: self.roles,
            is_leader: leader_of(members) == Some(node_id),
            quorum_visible: !members.is_empty(),
        };
        let action = plan(&input, state);
        debug!(?action, "Planned migration action");

        let mut next = state;
        let mut published_bootstrap = None;
        let mut joined_directory_id = None;

        match action {
            MigrationAction::ProbeController { co_located_broker } => {
                let healthy = self
                    .quorum
                    .check_listener_live(ListenerScope::Controller, self.target_auth, false)
                    .await;
                next = state.advance(&action, healthy);
                if healthy && co_located_broker {
                    published_bootstrap = Some(self.publish_bootstrap(store).await?);
                }
            }
            MigrationAction::ProbeBroker => {
                let healthy = self
                    .quorum
                    .check_listener_live(ListenerScope::Internal, self.target_auth, false)
                    .await;
                next = state.advance(&action, healthy);
            }
            MigrationAction::PublishBootstrap => {
                published_bootstrap = Some(self.publish_bootstrap(store).await?);
            }
            MigrationAction::EnsureMembership => {
                if !is_active_voter(members, node_id) {
                    joined_directory_id = Some(self.quorum.add_node(self.bootstrap).await?);
                }
            }
            MigrationAction::Wait(reason) => {
                debug!(?reason, "Migration not yet converged");
            }
        }

        if next != state {
            info!(from = %state, to = %next, "Migration stage advanced");
        }

        Ok(MigrationReport {
            action,
            previous: state,
            state: next,
            published_bootstrap,
            joined_directory_id,
            converged: next.is_complete(),
        })
    }

    async fn publish_bootstrap(&self, store: &dyn StateStore) -> ReconcileResult<String> {
        let port = self.target_auth.port(ListenerScope::Controller)?;
        let address = bootstrap_address(self.quorum.node_host(), port);
        store.publish(BOOTSTRAP_CONTROLLER_KEY, &address).await?;
        info!(bootstrap = %address, "Published bootstrap controller");
        Ok(address)
    }
}
