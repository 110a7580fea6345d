//! Integration tests for QuorumMembershipController against a scripted admin tool.

use std::sync::Arc;

use kraftctl::cluster::{
    AdminOperation, AuthMode, ErrorClass, ListenerScope, MockAdmin, MockProbe,
    QuorumMembershipController, QuorumRole, ReconcileError, RetryBudget,
};

const KEYWORD: &str = "metadata-quorum";

const REPORT: &str = "\
NodeId\tDirectoryId\tLogEndOffset\tLag\tLastFetchTimestamp\tLastCaughtUpTimestamp\tStatus
0\tpbvuBlaTTwKRxS5NLJwRFQ\t15\t0\t1726150425467\t1726150425467\tLeader
1\tQjrgCkzJTpK4MBlJzQNhmA\t15\t0\t1726150425312\t1726150425312\tFollower
2\tdSF3m1sRQ_GmyBWvVE9a7g\t15\t0\t1726150425312\t1726150425312\tObserver
";

fn controller(admin: &Arc<MockAdmin>, node_id: i32) -> QuorumMembershipController {
    QuorumMembershipController::new(admin.clone(), node_id, "kafka-1")
        .with_budgets(RetryBudget::immediate(4), RetryBudget::immediate(3))
}

fn write_meta_properties(dir: &tempfile::TempDir, directory_id: &str) -> std::path::PathBuf {
    let path = dir.path().join("meta.properties");
    std::fs::write(
        &path,
        format!(
            "#\n#Tue Sep 10 12:00:00 UTC 2024\nnode.id=1\nversion=1\ndirectory.id={}\ncluster.id=4L6g3nShT-eMCtK--X86sw\n",
            directory_id
        ),
    )
    .unwrap();
    path
}

// ============================================================================
// add_node
// ============================================================================

#[tokio::test]
async fn test_add_node_returns_directory_id_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_meta_properties(&dir, "QjrgCkzJTpK4MBlJzQNhmA");
    let admin = Arc::new(MockAdmin::new());
    admin.push_success_for(KEYWORD, "add-controller", "ignored output");

    let quorum = controller(&admin, 1).with_meta_properties_path(path);
    let directory_id = quorum.add_node("kafka-0:9097").await.unwrap();

    assert_eq!(directory_id, "QjrgCkzJTpK4MBlJzQNhmA");
    let calls = admin.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].args,
        vec!["--bootstrap-controller", "kafka-0:9097", "add-controller"]
    );
}

#[tokio::test]
async fn test_add_node_retries_transient_failures() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_meta_properties(&dir, "abc");
    let admin = Arc::new(MockAdmin::new());
    admin.push_failure_for(KEYWORD, "add-controller", "TimeoutException: Timed out waiting");
    admin.push_failure_for(KEYWORD, "add-controller", "NotLeaderOrFollowerException");

    let quorum = controller(&admin, 1).with_meta_properties_path(path);
    assert_eq!(quorum.add_node("kafka-0:9097").await.unwrap(), "abc");
    assert_eq!(admin.call_count(KEYWORD), 3);
}

#[tokio::test]
async fn test_add_node_exhaustion_returns_last_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_meta_properties(&dir, "abc");
    let admin = Arc::new(MockAdmin::new());
    for i in 0..4 {
        admin.push_failure_for(KEYWORD, "add-controller", &format!("connection refused #{}", i));
    }

    let quorum = controller(&admin, 1).with_meta_properties_path(path);
    let err = quorum.add_node("kafka-0:9097").await.unwrap_err();

    match &err {
        ReconcileError::Command {
            operation,
            class,
            attempts,
            source,
        } => {
            assert_eq!(*operation, AdminOperation::AddNode);
            assert_eq!(*class, ErrorClass::Transient);
            assert_eq!(*attempts, 4);
            assert!(source.stderr.contains("#3"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(admin.call_count(KEYWORD), 4);
}

#[tokio::test]
async fn test_add_node_without_identity_file_is_identity_error() {
    let dir = tempfile::tempdir().unwrap();
    let admin = Arc::new(MockAdmin::new());

    let quorum =
        controller(&admin, 1).with_meta_properties_path(dir.path().join("missing.properties"));
    let err = quorum.add_node("kafka-0:9097").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Identity(_)));
}

// ============================================================================
// remove_node
// ============================================================================

#[tokio::test]
async fn test_remove_node_voter_not_found_succeeds_first_call() {
    let admin = Arc::new(MockAdmin::new());
    admin.push_failure_for(
        KEYWORD,
        "remove-controller",
        "org.apache.kafka.common.errors.VoterNotFoundException: voter 3 not found",
    );

    let quorum = controller(&admin, 1);
    quorum.remove_node(3, "dir-3", "kafka-0:9097").await.unwrap();

    let calls = admin.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].args,
        vec![
            "--bootstrap-controller",
            "kafka-0:9097",
            "remove-controller",
            "--controller-id",
            "3",
            "--controller-directory-id",
            "dir-3",
        ]
    );
}

#[tokio::test]
async fn test_remove_node_timeout_is_success() {
    let admin = Arc::new(MockAdmin::new());
    admin.push_failure_for(KEYWORD, "remove-controller", "TimeoutException: Call timed out");

    controller(&admin, 1)
        .remove_node(3, "dir-3", "kafka-0:9097")
        .await
        .unwrap();
    assert_eq!(admin.call_count(KEYWORD), 1);
}

#[tokio::test]
async fn test_remove_node_fatal_error_exhausts_budget() {
    let admin = Arc::new(MockAdmin::new());
    admin.always_fail_for(
        KEYWORD,
        "remove-controller",
        "org.apache.kafka.common.errors.ClusterAuthorizationException: not authorized",
    );

    let err = controller(&admin, 1)
        .remove_node(3, "dir-3", "kafka-0:9097")
        .await
        .unwrap_err();

    assert!(!err.is_retriable());
    assert_eq!(admin.call_count(KEYWORD), 3);
}

// ============================================================================
// Quorum queries
// ============================================================================

#[tokio::test]
async fn test_query_quorum_maps_by_node_id() {
    let admin = Arc::new(MockAdmin::new());
    admin.always_succeed_for(KEYWORD, "describe", REPORT);

    let quorum = controller(&admin, 1);
    let members = quorum.query_quorum("kafka-0:9097").await;

    assert_eq!(members.len(), 3);
    assert_eq!(members[&0].role, QuorumRole::Leader);
    assert_eq!(members[&2].directory_id, "dSF3m1sRQ_GmyBWvVE9a7g");
    assert_eq!(quorum.quorum_leader("kafka-0:9097").await, Some(0));

    let describe = &admin.calls_with(KEYWORD, "describe")[0];
    assert!(describe.has_arg("--replication"));
}

#[tokio::test]
async fn test_query_quorum_failure_is_empty() {
    let admin = Arc::new(MockAdmin::new());
    admin.always_fail_for(KEYWORD, "describe", "Connection to node -1 could not be established");

    let quorum = controller(&admin, 1);
    assert!(quorum.query_quorum("kafka-0:9097").await.is_empty());
    assert_eq!(quorum.quorum_leader("kafka-0:9097").await, None);
    assert!(!quorum.is_voter_or_follower(1, "kafka-0:9097").await);
    // Describe is never retried.
    assert_eq!(admin.call_count(KEYWORD), 3);
}

#[tokio::test]
async fn test_is_voter_or_follower() {
    let admin = Arc::new(MockAdmin::new());
    admin.always_succeed_for(KEYWORD, "describe", REPORT);
    let quorum = controller(&admin, 1);

    assert!(quorum.is_voter_or_follower(0, "kafka-0:9097").await);
    assert!(quorum.is_voter_or_follower(1, "kafka-0:9097").await);
    assert!(!quorum.is_voter_or_follower(2, "kafka-0:9097").await);
    assert!(!quorum.is_voter_or_follower(7, "kafka-0:9097").await);
}

// ============================================================================
// Listener liveness
// ============================================================================

#[tokio::test]
async fn test_check_listener_live_local_only() {
    let admin = Arc::new(MockAdmin::new());
    let probe = Arc::new(MockProbe::new());
    probe.set_live("kafka-1", 9098);
    let auth: AuthMode = "SASL_SSL/SCRAM-SHA-512".parse().unwrap();

    let quorum = controller(&admin, 1)
        .with_peer_hosts(vec!["kafka-0".into(), "kafka-2".into()])
        .with_probe(probe.clone());

    assert!(quorum.check_listener_live(ListenerScope::Controller, auth, false).await);
    assert_eq!(probe.probed(), vec![("kafka-1".to_string(), 9098)]);
}

#[tokio::test]
async fn test_check_listener_live_all_nodes_short_circuits() {
    let admin = Arc::new(MockAdmin::new());
    let probe = Arc::new(MockProbe::new());
    probe.set_live("kafka-1", 19093);
    probe.set_live("kafka-2", 19093);
    let auth: AuthMode = "SASL_SSL/SCRAM-SHA-512".parse().unwrap();

    let quorum = controller(&admin, 1)
        .with_peer_hosts(vec!["kafka-0".into(), "kafka-1".into(), "kafka-2".into()])
        .with_probe(probe.clone());

    assert!(!quorum.check_listener_live(ListenerScope::Internal, auth, true).await);
    // kafka-1 (local) is probed first, kafka-0 fails, kafka-2 is never probed.
    assert_eq!(
        probe.probed(),
        vec![("kafka-1".to_string(), 19093), ("kafka-0".to_string(), 19093)]
    );

    probe.set_live("kafka-0", 19093);
    assert!(quorum.check_listener_live(ListenerScope::Internal, auth, true).await);
}

#[tokio::test]
async fn test_check_listener_live_unsupported_combination() {
    let admin = Arc::new(MockAdmin::new());
    let probe = Arc::new(MockProbe::new());
    let auth: AuthMode = "SASL_SSL/OAUTHBEARER".parse().unwrap();

    let quorum = controller(&admin, 1).with_probe(probe.clone());
    assert!(!quorum.check_listener_live(ListenerScope::Controller, auth, false).await);
    assert!(probe.probed().is_empty());
}
