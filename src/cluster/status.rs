//! Parser for the quorum `describe --replication` report.
//!
//! The report is a tab-separated table with a header row:
//!
//! ```text
//! NodeId  DirectoryId              LogEndOffset  Lag  LastFetchTimestamp  LastCaughtUpTimestamp  Status
//! 0       pbvuBlaTTwKRxS5NLJwRFQ   15            0    1726150425467       1726150425467          Leader
//! 1       QjrgCkzJTpK4MBlJzQNhmA   15            0    1726150425312       1726150425312          Follower
//! 100     dSF3m1sRQ_GmyBWvVE9a7g   15            0    1726150425312       1726150425312          Observer
//! ```
//!
//! Parsing never fails: short rows, non-numeric ids and unknown statuses are
//! skipped so that diagnostic columns or header/footer noise cannot break
//! health polling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::QUORUM_STATUS_MIN_FIELDS;

/// Role of a node in the KRaft quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuorumRole {
    Leader,
    Follower,
    /// Non-voting replica, e.g. a broker or a controller that has not joined yet.
    Observer,
}

impl QuorumRole {
    /// Leaders and followers are voters; observers are not.
    pub fn is_voter(&self) -> bool {
        matches!(self, QuorumRole::Leader | QuorumRole::Follower)
    }
}

impl FromStr for QuorumRole {
    type Err = String;

    /// Exact, case-sensitive match as printed by the tool.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Leader" => Ok(QuorumRole::Leader),
            "Follower" => Ok(QuorumRole::Follower),
            "Observer" => Ok(QuorumRole::Observer),
            other => Err(format!("unknown quorum status '{}'", other)),
        }
    }
}

impl fmt::Display for QuorumRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuorumRole::Leader => write!(f, "Leader"),
            QuorumRole::Follower => write!(f, "Follower"),
            QuorumRole::Observer => write!(f, "Observer"),
        }
    }
}

/// One row of the quorum report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumNodeStatus {
    pub node_id: i32,
    /// Per-incarnation identity; disambiguates a reused node id.
    pub directory_id: String,
    pub role: QuorumRole,
}

/// Parse the quorum report into per-node records, in input order.
///
/// The first line is the header and is always skipped. Duplicate node ids are
/// kept; callers building a map get last-wins semantics.
///
/// # Example
/// ```
/// use kraftctl::cluster::{QuorumRole, parse_quorum_status};
///
/// let report = "NodeId\tDirectoryId\tLogEndOffset\tLag\tLastFetchTimestamp\tLastCaughtUpTimestamp\tStatus\n\
///               0\tdir-a\t15\t0\t1\t1\tLeader\n";
/// let nodes = parse_quorum_status(report);
/// assert_eq!(nodes.len(), 1);
/// assert_eq!(nodes[0].role, QuorumRole::Leader);
/// ```
pub fn parse_quorum_status(raw: &str) -> Vec<QuorumNodeStatus> {
    raw.lines().skip(1).filter_map(parse_row).collect()
}

fn parse_row(line: &str) -> Option<QuorumNodeStatus> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    if fields.len() < QUORUM_STATUS_MIN_FIELDS {
        return None;
    }

    let role = fields.last()?.parse::<QuorumRole>().ok()?;
    let node_id = fields[0].parse::<i32>().ok()?;

    Some(QuorumNodeStatus {
        node_id,
        directory_id: fields[1].to_string(),
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEADER: &str =
        "NodeId\tDirectoryId\tLogEndOffset\tLag\tLastFetchTimestamp\tLastCaughtUpTimestamp\tStatus";

    fn row(node_id: &str, dir: &str, status: &str) -> String {
        format!("{}\t{}\t15\t0\t1726150425467\t1726150425467\t{}", node_id, dir, status)
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_quorum_status("").is_empty());
        assert!(parse_quorum_status(HEADER).is_empty());
    }

    #[test]
    fn test_parse_rows_in_order() {
        let report = [
            HEADER.to_string(),
            row("0", "dir-a", "Leader"),
            row("1", "dir-b", "Follower"),
            row("100", "dir-c", "Observer"),
        ]
        .join("\n");

        let nodes = parse_quorum_status(&report);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].node_id, 0);
        assert_eq!(nodes[0].directory_id, "dir-a");
        assert_eq!(nodes[0].role, QuorumRole::Leader);
        assert_eq!(nodes[1].role, QuorumRole::Follower);
        assert_eq!(nodes[2].node_id, 100);
        assert_eq!(nodes[2].role, QuorumRole::Observer);
    }

    #[test]
    fn test_unknown_status_is_skipped() {
        let report = [
            HEADER.to_string(),
            row("0", "dir-a", "Leader"),
            row("1", "dir-b", "Candidate"),
            row("2", "dir-c", "follower"),
        ]
        .join("\n");

        let nodes = parse_quorum_status(&report);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_id, 0);
    }

    #[test]
    fn test_short_rows_and_noise_are_skipped() {
        let report = format!(
            "{}\n0\tdir-a\tLeader\n\n---\n{}\nnot a table at all",
            HEADER,
            row("1", "dir-b", "Follower")
        );
        let nodes = parse_quorum_status(&report);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_id, 1);
    }

    #[test]
    fn test_extra_diagnostic_columns_are_tolerated() {
        let report = format!(
            "{}\tExtra\n0\tdir-a\t15\t0\t1\t1\tsomething\tLeader",
            HEADER
        );
        let nodes = parse_quorum_status(&report);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].role, QuorumRole::Leader);
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let report = format!("{}\n 3 \t dir-x \t15\t0\t1\t1\t Follower \r", HEADER);
        let nodes = parse_quorum_status(&report);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_id, 3);
        assert_eq!(nodes[0].directory_id, "dir-x");
    }

    #[test]
    fn test_non_numeric_node_id_is_skipped() {
        let report = format!("{}\n{}", HEADER, row("abc", "dir-a", "Leader"));
        assert!(parse_quorum_status(&report).is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let report = [
            HEADER.to_string(),
            row("1", "old-dir", "Observer"),
            row("1", "new-dir", "Follower"),
        ]
        .join("\n");
        let nodes = parse_quorum_status(&report);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].directory_id, "new-dir");
    }

    #[test]
    fn test_role_helpers() {
        assert!(QuorumRole::Leader.is_voter());
        assert!(QuorumRole::Follower.is_voter());
        assert!(!QuorumRole::Observer.is_voter());
        assert_eq!("Observer".parse::<QuorumRole>(), Ok(QuorumRole::Observer));
        assert!("LEADER".parse::<QuorumRole>().is_err());
        assert_eq!(QuorumRole::Follower.to_string(), "Follower");
    }

    // ========================================================================
    // Property Tests
    // ========================================================================

    fn arb_role() -> impl Strategy<Value = QuorumRole> {
        prop_oneof![
            Just(QuorumRole::Leader),
            Just(QuorumRole::Follower),
            Just(QuorumRole::Observer),
        ]
    }

    proptest! {
        #[test]
        fn prop_quorum_parser_never_panics(raw in "\\PC{0,400}") {
            let _ = parse_quorum_status(&raw);
        }

        #[test]
        fn prop_quorum_parser_never_panics_on_tabbed_noise(
            rows in proptest::collection::vec("[0-9a-zA-Z \\t-]{0,60}", 0..10)
        ) {
            let report = format!("{}\n{}", HEADER, rows.join("\n"));
            let _ = parse_quorum_status(&report);
        }

        #[test]
        fn prop_well_formed_rows_parse_in_order(
            entries in proptest::collection::vec((0i32..10_000, "[a-zA-Z0-9_-]{1,22}", arb_role()), 0..12)
        ) {
            let mut lines = vec![HEADER.to_string()];
            lines.extend(
                entries
                    .iter()
                    .map(|(id, dir, role)| row(&id.to_string(), dir, &role.to_string())),
            );

            let nodes = parse_quorum_status(&lines.join("\n"));

            prop_assert_eq!(nodes.len(), entries.len());
            for (node, (id, dir, role)) in nodes.iter().zip(&entries) {
                prop_assert_eq!(node.node_id, *id);
                prop_assert_eq!(&node.directory_id, dir);
                prop_assert_eq!(node.role, *role);
            }
        }
    }
}
