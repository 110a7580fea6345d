//! Fixed-delay retry policies for administrative mutations.
//!
//! Every mutation the engine issues (join, leave, grant, revoke) is idempotent in
//! intent and runs under a bounded [`RetryBudget`]. Policies are built on the
//! `backon` crate so all call sites share the same retry, logging and metrics path.
//!
//! # Budgets
//!
//! | Budget | Attempts | Delay | Worst-case sleep |
//! |--------|----------|-------|------------------|
//! | [`RetryBudget::add_node`] | 4 | 15s | 45s |
//! | [`RetryBudget::remove_node`] | 3 | 10s | 20s |
//! | [`RetryBudget::acl`] | 3 | 5s | 10s |
//!
//! Attempts include the initial call. There is no jitter: each node runs its own
//! engine and convergence comes from repetition, not from spreading load.
//!
//! # Example
//!
//! ```rust,no_run
//! use kraftctl::cluster::retry::{RetryBudget, with_fixed_delay};
//!
//! async fn example() -> Result<(), std::io::Error> {
//!     with_fixed_delay(
//!         "example",
//!         RetryBudget::remove_node(),
//!         || async { Ok::<_, std::io::Error>(()) },
//!         |e| e.kind() == std::io::ErrorKind::TimedOut,
//!     )
//!     .await
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use tracing::warn;

use crate::constants::{
    ACL_MAX_ATTEMPTS, ACL_RETRY_DELAY_SECS, ADD_NODE_MAX_ATTEMPTS, ADD_NODE_RETRY_DELAY_SECS,
    REMOVE_NODE_MAX_ATTEMPTS, REMOVE_NODE_RETRY_DELAY_SECS,
};

/// Bounded retry policy: total attempts and the fixed delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Sleep between consecutive attempts.
    pub delay: Duration,
}

impl RetryBudget {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Budget for joining the quorum.
    pub const fn add_node() -> Self {
        Self::new(
            ADD_NODE_MAX_ATTEMPTS,
            Duration::from_secs(ADD_NODE_RETRY_DELAY_SECS),
        )
    }

    /// Budget for leaving the quorum.
    pub const fn remove_node() -> Self {
        Self::new(
            REMOVE_NODE_MAX_ATTEMPTS,
            Duration::from_secs(REMOVE_NODE_RETRY_DELAY_SECS),
        )
    }

    /// Budget for a single ACL grant or revoke.
    pub const fn acl() -> Self {
        Self::new(ACL_MAX_ATTEMPTS, Duration::from_secs(ACL_RETRY_DELAY_SECS))
    }

    /// Same attempt count with no delay between attempts.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Number of retries after the initial attempt.
    pub fn retries(&self) -> u32 {
        self.max_attempts.saturating_sub(1)
    }

    /// Total time spent sleeping if every attempt fails.
    pub fn worst_case_delay(&self) -> Duration {
        self.delay * self.retries()
    }
}

/// Build the `backon` policy for a budget.
pub fn fixed_delay_policy(budget: RetryBudget) -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(budget.delay)
        .with_max_times(budget.retries() as usize)
}

/// Run `operation` under `budget`, retrying while `condition` holds.
///
/// Returns the first success, or the last error once the budget is exhausted or
/// `condition` rejects an error. Retries and outcomes are recorded under `policy`.
pub async fn with_fixed_delay<F, Fut, T, E, C>(
    policy: &'static str,
    budget: RetryBudget,
    operation: F,
    condition: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    C: FnMut(&E) -> bool,
{
    let mut retry = 0u32;
    let result = operation
        .retry(fixed_delay_policy(budget))
        .when(condition)
        .notify(|err: &E, delay: Duration| {
            retry += 1;
            record_retry(policy, "attempt");
            warn!(
                policy,
                retry,
                max_attempts = budget.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Admin command failed, retrying"
            );
        })
        .await;

    match &result {
        Ok(_) => record_retry(policy, "success"),
        Err(_) => {
            record_retry(policy, "exhausted");
            warn!(policy, attempts = retry + 1, "Retry budget exhausted");
        }
    }
    result
}

/// Count one retry event for `policy`: `attempt`, `success` or `exhausted`.
fn record_retry(policy: &str, event: &str) {
    super::metrics::RETRY_ATTEMPTS
        .with_label_values(&[policy, event])
        .inc();
}
