//! Administrative command interface.
//!
//! Every mutation and query the engine performs against the cluster goes through
//! the [`AdminCommand`] trait. The engine never shells out directly; it only knows
//! the `run(keyword, args, opts)` contract.
//!
//! # Available Implementations
//!
//! - [`ProcessAdminCommand`]: runs the Kafka CLI tools (`kafka-<keyword>.sh`) via `tokio::process`
//! - [`MockAdmin`](super::MockAdmin): scripted responses for tests (`test-utilities` feature)
//!
//! # Keywords
//!
//! | Keyword | Tool | Used for |
//! |---------|------|----------|
//! | `metadata-quorum` | `kafka-metadata-quorum.sh` | add/remove controller, describe |
//! | `acls` | `kafka-acls.sh` | grant, revoke, list |

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::error::{AdminOperation, ErrorClass, ReconcileError, ReconcileResult, classify_error};
use super::metrics::record_admin_command;
use super::retry::{RetryBudget, with_fixed_delay};
use crate::constants::DEFAULT_COMMAND_TIMEOUT_SECS;

/// A failed administrative command.
///
/// The admin tools carry no structured error codes; `stderr` is the only signal
/// and is what [`classify_error`](super::classify_error) inspects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command failed (exit code {exit_code:?}): {stderr}")]
pub struct CommandError {
    /// Error text reported by the tool (stdout is used when stderr is empty).
    pub stderr: String,
    /// Process exit code; `None` when the process could not be spawned or was killed.
    pub exit_code: Option<i32>,
}

impl CommandError {
    pub fn new(stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
        }
    }
}

/// Capability to run the clustered system's own administrative tooling.
///
/// Implementations must be safe to call repeatedly; the engine retries on failure.
#[async_trait]
pub trait AdminCommand: Send + Sync {
    /// Run the tool named by `keyword` with `args`; `opts` are JVM options for the tool.
    ///
    /// Returns stdout on success.
    async fn run(&self, keyword: &str, args: &[String], opts: &[String])
    -> Result<String, CommandError>;
}

/// Runs `<bin_dir>/kafka-<keyword>.sh` as a child process.
///
/// `opts` are passed to the tool through the `KAFKA_OPTS` environment variable,
/// which is how the Kafka launch scripts pick up JAAS and TLS settings.
#[derive(Debug, Clone)]
pub struct ProcessAdminCommand {
    bin_dir: PathBuf,
    timeout: Duration,
}

impl ProcessAdminCommand {
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    /// Kill the tool and report a failure if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the script for `keyword`.
    pub fn program(&self, keyword: &str) -> PathBuf {
        self.bin_dir.join(format!("kafka-{}.sh", keyword))
    }
}

#[async_trait]
impl AdminCommand for ProcessAdminCommand {
    async fn run(
        &self,
        keyword: &str,
        args: &[String],
        opts: &[String],
    ) -> Result<String, CommandError> {
        let program = self.program(keyword);
        debug!(program = %program.display(), ?args, "Running admin command");

        let mut command = Command::new(&program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !opts.is_empty() {
            command.env("KAFKA_OPTS", opts.join(" "));
        }

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(program = %program.display(), error = %e, "Failed to spawn admin command");
                return Err(CommandError::new(e.to_string(), None));
            }
            Err(_) => {
                return Err(CommandError::new(
                    format!(
                        "{} timeout after {}s",
                        program.display(),
                        self.timeout.as_secs()
                    ),
                    None,
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            stdout
        } else {
            stderr.into_owned()
        };
        Err(CommandError::new(message, output.status.code()))
    }
}

/// Result of a mutation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command succeeded; carries stdout.
    Completed(String),
    /// The command failed with a benign marker; carries the error text.
    AlreadyConverged(String),
}

/// Run one administrative operation under `budget`.
///
/// Benign failures (per [`classify_error`]) end the loop immediately as
/// [`CommandOutcome::AlreadyConverged`]. Transient and fatal failures are
/// retried; once the budget is exhausted the last failure is returned as
/// [`ReconcileError::Command`].
pub(crate) async fn execute(
    admin: &dyn AdminCommand,
    operation: AdminOperation,
    keyword: &str,
    args: &[String],
    opts: &[String],
    budget: RetryBudget,
) -> ReconcileResult<CommandOutcome> {
    let attempts = AtomicU32::new(0);

    let result = with_fixed_delay(
        operation.as_label(),
        budget,
        || {
            let attempts = &attempts;
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                match admin.run(keyword, args, opts).await {
                    Ok(stdout) => {
                        record_admin_command(operation.as_label(), "ok");
                        Ok(CommandOutcome::Completed(stdout))
                    }
                    Err(e) => match classify_error(operation, &e.stderr) {
                        ErrorClass::Benign => {
                            record_admin_command(operation.as_label(), "benign");
                            info!(
                                operation = operation.as_label(),
                                stderr = %e.stderr.trim(),
                                "Treating benign failure as success"
                            );
                            Ok(CommandOutcome::AlreadyConverged(e.stderr))
                        }
                        class => {
                            record_admin_command(operation.as_label(), class.as_metric_label());
                            Err(e)
                        }
                    },
                }
            }
        },
        |_| true,
    )
    .await;

    result.map_err(|source| {
        let class = classify_error(operation, &source.stderr);
        ReconcileError::Command {
            operation,
            class,
            attempts: attempts.load(Ordering::SeqCst),
            source,
        }
    })
}

/// Builds the shared `--command-config` flag pair for admin invocations.
pub(crate) fn command_config_args(command_config: Option<&PathBuf>) -> Vec<String> {
    match command_config {
        Some(path) => vec![
            "--command-config".to_string(),
            path.display().to_string(),
        ],
        None => Vec::new(),
    }
}
