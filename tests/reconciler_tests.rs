//! End-to-end reconciliation cycles against a scripted cluster.

use std::sync::Arc;

use kraftctl::cluster::keys::{
    ACLS_ADDED_KEY, ACLS_REMOVED_KEY, BOOTSTRAP_CONTROLLER_KEY, BROKER_STAGE_KEY,
    CONTROLLER_STAGE_KEY,
};
use kraftctl::cluster::{
    ClientIntent, MemoryStateStore, MigrationAction, MigrationState, MockAdmin, MockProbe,
    ProcessRoles, Reconciler, ReconcilerConfig, RetryBudget, Rule, Stage, StateStore,
    WaitReason, desired_rules,
};

const QUORUM: &str = "metadata-quorum";

fn report_with(rows: &[(i32, &str)]) -> String {
    let mut out = String::from(
        "NodeId\tDirectoryId\tLogEndOffset\tLag\tLastFetchTimestamp\tLastCaughtUpTimestamp\tStatus\n",
    );
    for (node_id, status) in rows {
        out.push_str(&format!(
            "{}\tdir-{}\t42\t0\t1726150425467\t1726150425467\t{}\n",
            node_id, node_id, status
        ));
    }
    out
}

fn config(node_id: i32, host: &str, roles: ProcessRoles) -> ReconcilerConfig {
    ReconcilerConfig {
        node_id,
        node_host: host.to_string(),
        bootstrap_controller: "kafka-0:9097".to_string(),
        roles,
        current_auth: "SASL_PLAINTEXT/SCRAM-SHA-512".parse().unwrap(),
        target_auth: "SASL_SSL/SCRAM-SHA-512".parse().unwrap(),
        add_node_budget: RetryBudget::immediate(4),
        remove_node_budget: RetryBudget::immediate(3),
        acl_budget: RetryBudget::immediate(3),
        ..Default::default()
    }
}

struct Harness {
    admin: Arc<MockAdmin>,
    probe: Arc<MockProbe>,
    store: Arc<MemoryStateStore>,
}

impl Harness {
    fn new(state: MigrationState) -> Self {
        Self {
            admin: Arc::new(MockAdmin::new()),
            probe: Arc::new(MockProbe::new()),
            store: Arc::new(MemoryStateStore::with_state(state)),
        }
    }

    fn reconciler(&self, config: ReconcilerConfig) -> Reconciler {
        Reconciler::new(config, self.admin.clone(), self.store.clone())
            .with_listener_probe(self.probe.clone())
    }
}

// ============================================================================
// Leader controller
// ============================================================================

#[tokio::test]
async fn test_combined_leader_completes_both_tracks_and_publishes() {
    let h = Harness::new(MigrationState::default());
    h.admin
        .always_succeed_for(QUORUM, "describe", &report_with(&[(0, "Leader"), (1, "Follower")]));
    h.probe.set_live("kafka-0", 9098);

    let report = h
        .reconciler(config(0, "kafka-0", ProcessRoles::COMBINED))
        .run_cycle()
        .await
        .unwrap();

    assert!(report.is_leader);
    assert_eq!(report.leader_id, Some(0));
    assert_eq!(report.quorum_size, 2);
    assert_eq!(
        report.migration.action,
        MigrationAction::ProbeController {
            co_located_broker: true
        }
    );
    assert!(report.converged());
    assert_eq!(
        report.migration.published_bootstrap.as_deref(),
        Some("kafka-0:9098")
    );

    assert!(h.store.load_migration_state().await.unwrap().is_complete());
    assert_eq!(
        h.store.published(BOOTSTRAP_CONTROLLER_KEY).await.as_deref(),
        Some("kafka-0:9098")
    );
    assert_eq!(h.store.published(CONTROLLER_STAGE_KEY).await.as_deref(), Some("done"));
    assert_eq!(h.store.published(BROKER_STAGE_KEY).await.as_deref(), Some("done"));
}

#[tokio::test]
async fn test_leader_with_unhealthy_listener_does_not_advance() {
    let h = Harness::new(MigrationState::default());
    h.admin
        .always_succeed_for(QUORUM, "describe", &report_with(&[(0, "Leader")]));

    let report = h
        .reconciler(config(0, "kafka-0", ProcessRoles::CONTROLLER))
        .run_cycle()
        .await
        .unwrap();

    assert!(!report.migration.changed());
    assert!(!report.converged());
    assert_eq!(
        h.store.load_migration_state().await.unwrap(),
        MigrationState::default()
    );
    assert_eq!(h.store.published(BOOTSTRAP_CONTROLLER_KEY).await, None);
}

#[tokio::test]
async fn test_dedicated_leader_waits_then_publishes() {
    let h = Harness::new(MigrationState::default());
    h.admin
        .always_succeed_for(QUORUM, "describe", &report_with(&[(0, "Leader")]));
    h.probe.set_live("kafka-0", 9098);
    let reconciler = h.reconciler(config(0, "kafka-0", ProcessRoles::CONTROLLER));

    let first = reconciler.run_cycle().await.unwrap();
    assert_eq!(first.migration.state.controller_stage, Stage::Done);
    assert_eq!(first.migration.state.broker_stage, Stage::Idle);
    assert_eq!(first.migration.published_bootstrap, None);

    let second = reconciler.run_cycle().await.unwrap();
    assert_eq!(
        second.migration.action,
        MigrationAction::Wait(WaitReason::AwaitingBrokers)
    );

    // A broker finished its track.
    h.store
        .save_migration_state(MigrationState {
            controller_stage: Stage::Done,
            broker_stage: Stage::Done,
        })
        .await
        .unwrap();
    let third = reconciler.run_cycle().await.unwrap();
    assert_eq!(third.migration.action, MigrationAction::PublishBootstrap);
    assert_eq!(
        h.store.published(BOOTSTRAP_CONTROLLER_KEY).await.as_deref(),
        Some("kafka-0:9098")
    );

    // Publishing is repeatable.
    let fourth = reconciler.run_cycle().await.unwrap();
    assert_eq!(fourth.migration.action, MigrationAction::PublishBootstrap);
}

// ============================================================================
// Non-leader controllers and brokers
// ============================================================================

#[tokio::test]
async fn test_observer_controller_joins_quorum() {
    let dir = tempfile::tempdir().unwrap();
    let meta = dir.path().join("meta.properties");
    std::fs::write(&meta, "node.id=2\ndirectory.id=dir-2-new\n").unwrap();

    let h = Harness::new(MigrationState::default());
    h.admin.always_succeed_for(
        QUORUM,
        "describe",
        &report_with(&[(0, "Leader"), (1, "Follower"), (2, "Observer")]),
    );

    let mut cfg = config(2, "kafka-2", ProcessRoles::CONTROLLER);
    cfg.meta_properties_path = meta;
    let report = h.reconciler(cfg).run_cycle().await.unwrap();

    assert!(!report.is_leader);
    assert_eq!(report.migration.action, MigrationAction::EnsureMembership);
    assert_eq!(
        report.migration.joined_directory_id.as_deref(),
        Some("dir-2-new")
    );
    assert_eq!(h.admin.calls_with(QUORUM, "add-controller").len(), 1);
    assert_eq!(h.admin.calls_with(QUORUM, "describe").len(), 1);
}

#[tokio::test]
async fn test_follower_controller_does_not_rejoin() {
    let h = Harness::new(MigrationState::default());
    h.admin.always_succeed_for(
        QUORUM,
        "describe",
        &report_with(&[(0, "Leader"), (1, "Follower")]),
    );

    let report = h
        .reconciler(config(1, "kafka-1", ProcessRoles::CONTROLLER))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.migration.action, MigrationAction::EnsureMembership);
    assert_eq!(report.migration.joined_directory_id, None);
    assert!(h.admin.calls_with(QUORUM, "add-controller").is_empty());
    assert_eq!(h.admin.calls_with(QUORUM, "describe").len(), 1);
}

#[tokio::test]
async fn test_controller_waits_when_quorum_cannot_be_described() {
    let h = Harness::new(MigrationState::default());
    h.admin
        .always_fail_for(QUORUM, "describe", "TimeoutException: Timed out waiting for a node");
    h.probe.set_live("kafka-0", 9098);

    let report = h
        .reconciler(config(0, "kafka-0", ProcessRoles::COMBINED))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.leader_id, None);
    assert_eq!(report.quorum_size, 0);
    assert_eq!(
        report.migration.action,
        MigrationAction::Wait(WaitReason::QuorumUnavailable)
    );
    assert!(!report.converged());
    assert!(h.admin.calls_with(QUORUM, "add-controller").is_empty());
    assert!(h.probe.probed().is_empty());
    assert_eq!(
        h.store.load_migration_state().await.unwrap(),
        MigrationState::default()
    );
}

#[tokio::test]
async fn test_broker_waits_for_controller_track() {
    let h = Harness::new(MigrationState::default());
    h.admin
        .always_succeed_for(QUORUM, "describe", &report_with(&[(0, "Leader")]));
    h.probe.set_live("kafka-3", 19093);

    let report = h
        .reconciler(config(3, "kafka-3", ProcessRoles::BROKER))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(
        report.migration.action,
        MigrationAction::Wait(WaitReason::AwaitingController)
    );
    assert!(h.probe.probed().is_empty());
}

#[tokio::test]
async fn test_broker_moves_after_controller() {
    let h = Harness::new(MigrationState {
        controller_stage: Stage::Done,
        broker_stage: Stage::Idle,
    });
    h.admin
        .always_succeed_for(QUORUM, "describe", &report_with(&[(0, "Leader")]));
    h.probe.set_live("kafka-3", 19093);

    let report = h
        .reconciler(config(3, "kafka-3", ProcessRoles::BROKER))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.migration.action, MigrationAction::ProbeBroker);
    assert!(report.converged());
    assert_eq!(h.probe.probed(), vec![("kafka-3".to_string(), 19093)]);
}

// ============================================================================
// ACL step
// ============================================================================

fn frodo_listing() -> &'static str {
    "Current ACLs for resource `ResourcePattern(resourceType=TOPIC, name=shire, patternType=LITERAL)`:\n\
     \t(principal=User:frodo, host=*, operation=WRITE, permissionType=ALLOW)\n\
     \t(principal=User:frodo, host=*, operation=CREATE, permissionType=ALLOW)\n\
     \t(principal=User:frodo, host=*, operation=DESCRIBE, permissionType=ALLOW)\n"
}

#[tokio::test]
async fn test_broker_swaps_acls_and_publishes_outcome() {
    let h = Harness::new(MigrationState::default());
    h.admin
        .always_succeed_for(QUORUM, "describe", &report_with(&[(0, "Leader")]));
    h.admin.push_success_for("acls", "--list", frodo_listing());

    let desired = desired_rules(&[ClientIntent::producer("sam", "shire")]);
    let report = h
        .reconciler(config(3, "kafka-3", ProcessRoles::BROKER))
        .with_desired_rules(desired)
        .run_cycle()
        .await
        .unwrap();

    let acl = report.acl.expect("broker runs the ACL step");
    assert_eq!(acl.added.len(), 3);
    assert!(acl.added.iter().all(|r| r.principal == "sam"));
    assert_eq!(acl.removed.len(), 3);
    assert!(acl.removed.iter().all(|r| r.principal == "frodo"));

    let acl_calls: Vec<_> = h
        .admin
        .calls()
        .into_iter()
        .filter(|c| c.keyword == "acls")
        .collect();
    assert_eq!(acl_calls.len(), 7);
    // Brokers are not migrated yet: current-mode internal listener.
    assert!(acl_calls.iter().all(|c| c.has_arg("kafka-3:19092")));
    assert!(acl_calls[1..4].iter().all(|c| c.has_arg("--add")));
    assert!(acl_calls[4..].iter().all(|c| c.has_arg("--remove")));

    let added: Vec<Rule> =
        serde_json::from_str(&h.store.published(ACLS_ADDED_KEY).await.unwrap()).unwrap();
    assert_eq!(added.len(), 3);
    let removed: Vec<Rule> =
        serde_json::from_str(&h.store.published(ACLS_REMOVED_KEY).await.unwrap()).unwrap();
    assert_eq!(removed.len(), 3);
}

#[tokio::test]
async fn test_dedicated_controller_skips_acl_step() {
    let h = Harness::new(MigrationState::default());
    h.admin
        .always_succeed_for(QUORUM, "describe", &report_with(&[(0, "Leader")]));

    let report = h
        .reconciler(config(0, "kafka-0", ProcessRoles::CONTROLLER))
        .with_desired_rules(desired_rules(&[ClientIntent::producer("sam", "shire")]))
        .run_cycle()
        .await
        .unwrap();

    assert!(report.acl.is_none());
    assert_eq!(h.admin.call_count("acls"), 0);
}

#[tokio::test]
async fn test_acl_failure_fails_cycle_after_saving_state() {
    let h = Harness::new(MigrationState {
        controller_stage: Stage::Done,
        broker_stage: Stage::Idle,
    });
    h.admin
        .always_succeed_for(QUORUM, "describe", &report_with(&[(0, "Leader")]));
    h.admin.push_success_for("acls", "--list", "");
    h.admin.always_fail_for("acls", "--add", "Connection refused");
    h.probe.set_live("kafka-3", 19093);

    let err = h
        .reconciler(config(3, "kafka-3", ProcessRoles::BROKER))
        .with_desired_rules(desired_rules(&[ClientIntent::producer("sam", "shire")]))
        .run_cycle()
        .await
        .unwrap_err();

    assert!(err.is_retriable());
    assert!(h.store.load_migration_state().await.unwrap().is_complete());
    // Migrated broker talks to the target-mode internal listener.
    let adds = h.admin.calls_with("acls", "--add");
    assert_eq!(adds.len(), 3);
    assert!(adds.iter().all(|c| c.has_arg("kafka-3:19093")));
}

// ============================================================================
// Operator actions
// ============================================================================

#[tokio::test]
async fn test_request_migration_resets_state() {
    let h = Harness::new(MigrationState {
        controller_stage: Stage::Done,
        broker_stage: Stage::Done,
    });
    h.reconciler(config(0, "kafka-0", ProcessRoles::COMBINED))
        .request_migration()
        .await
        .unwrap();

    assert_eq!(
        h.store.load_migration_state().await.unwrap(),
        MigrationState::default()
    );
}

#[tokio::test]
async fn test_decommission_removes_own_voter() {
    let dir = tempfile::tempdir().unwrap();
    let meta = dir.path().join("meta.properties");
    std::fs::write(&meta, "directory.id=dir-1\n").unwrap();

    let h = Harness::new(MigrationState::default());
    h.admin.push_failure_for(
        QUORUM,
        "remove-controller",
        "VoterNotFoundException: voter 1 not found",
    );

    let mut cfg = config(1, "kafka-1", ProcessRoles::CONTROLLER);
    cfg.meta_properties_path = meta;
    h.reconciler(cfg).decommission().await.unwrap();

    let calls = h.admin.calls_with(QUORUM, "remove-controller");
    assert_eq!(calls.len(), 1);
    assert!(calls[0].has_arg("dir-1"));
    assert!(calls[0].has_arg("1"));
}
