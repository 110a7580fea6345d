//! Scripted admin command and listener probe for testing.
//!
//! Responses are queued per keyword and optionally narrowed by a marker argument
//! (e.g. `describe` vs `add-controller`, both under `metadata-quorum`). Every
//! invocation is recorded so tests can assert on the exact commands issued.
//!
//! # Usage
//!
//! This module is available when the `test-utilities` feature is enabled,
//! or during unit tests:
//!
//! ```toml
//! [dev-dependencies]
//! kraftctl = { path = ".", features = ["test-utilities"] }
//! ```
//!
//! Unscripted calls succeed with empty stdout.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::admin::{AdminCommand, CommandError};
use super::listener::ListenerProbe;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub keyword: String,
    pub args: Vec<String>,
    pub opts: Vec<String>,
}

impl RecordedCall {
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

#[derive(Debug, Clone)]
struct Scripted {
    keyword: String,
    marker: Option<String>,
    result: Result<String, CommandError>,
    sticky: bool,
}

impl Scripted {
    fn matches(&self, keyword: &str, args: &[String]) -> bool {
        self.keyword == keyword
            && self
                .marker
                .as_ref()
                .is_none_or(|m| args.iter().any(|a| a == m))
    }
}

#[derive(Debug, Default)]
struct MockState {
    scripted: Vec<Scripted>,
    calls: Vec<RecordedCall>,
}

#[derive(Debug, Default)]
pub struct MockAdmin {
    state: Mutex<MockState>,
}

impl MockAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, keyword: &str, marker: Option<&str>, result: Result<String, CommandError>, sticky: bool) {
        self.state().scripted.push(Scripted {
            keyword: keyword.to_string(),
            marker: marker.map(str::to_string),
            result,
            sticky,
        });
    }

    /// Queue one successful response for `keyword`.
    pub fn push_success(&self, keyword: &str, stdout: &str) {
        self.push(keyword, None, Ok(stdout.to_string()), false);
    }

    /// Queue one failure for `keyword`.
    pub fn push_failure(&self, keyword: &str, stderr: &str) {
        self.push(keyword, None, Err(CommandError::new(stderr, Some(1))), false);
    }

    /// Queue one successful response for calls to `keyword` whose args contain `marker`.
    pub fn push_success_for(&self, keyword: &str, marker: &str, stdout: &str) {
        self.push(keyword, Some(marker), Ok(stdout.to_string()), false);
    }

    /// Queue one failure for calls to `keyword` whose args contain `marker`.
    pub fn push_failure_for(&self, keyword: &str, marker: &str, stderr: &str) {
        self.push(
            keyword,
            Some(marker),
            Err(CommandError::new(stderr, Some(1))),
            false,
        );
    }

    /// Answer every matching call with `stdout` once the queue ahead of it drains.
    pub fn always_succeed_for(&self, keyword: &str, marker: &str, stdout: &str) {
        self.push(keyword, Some(marker), Ok(stdout.to_string()), true);
    }

    /// Fail every matching call with `stderr`.
    pub fn always_fail_for(&self, keyword: &str, marker: &str, stderr: &str) {
        self.push(
            keyword,
            Some(marker),
            Err(CommandError::new(stderr, Some(1))),
            true,
        );
    }

    /// All invocations so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, keyword: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.keyword == keyword)
            .count()
    }

    /// Invocations of `keyword` whose args contain `marker`.
    pub fn calls_with(&self, keyword: &str, marker: &str) -> Vec<RecordedCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.keyword == keyword && c.has_arg(marker))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl AdminCommand for MockAdmin {
    async fn run(
        &self,
        keyword: &str,
        args: &[String],
        opts: &[String],
    ) -> Result<String, CommandError> {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            keyword: keyword.to_string(),
            args: args.to_vec(),
            opts: opts.to_vec(),
        });

        // One-shot entries take precedence over sticky ones.
        let position = state
            .scripted
            .iter()
            .position(|s| !s.sticky && s.matches(keyword, args))
            .or_else(|| {
                state
                    .scripted
                    .iter()
                    .position(|s| s.sticky && s.matches(keyword, args))
            });

        match position {
            Some(i) if state.scripted[i].sticky => state.scripted[i].result.clone(),
            Some(i) => state.scripted.remove(i).result,
            None => Ok(String::new()),
        }
    }
}

/// Listener probe answering from a fixed set of live endpoints.
#[derive(Debug, Default)]
pub struct MockProbe {
    live: Mutex<HashSet<(String, u16)>>,
    probed: Mutex<Vec<(String, u16)>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `host:port` as reachable.
    pub fn set_live(&self, host: &str, port: u16) {
        self.live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((host.to_string(), port));
    }

    pub fn set_down(&self, host: &str, port: u16) {
        self.live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(host.to_string(), port));
    }

    /// Endpoints probed so far, in order.
    pub fn probed(&self) -> Vec<(String, u16)> {
        self.probed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ListenerProbe for MockProbe {
    async fn is_reachable(&self, host: &str, port: u16, _timeout: Duration) -> bool {
        let endpoint = (host.to_string(), port);
        self.probed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(endpoint.clone());
        self.live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&endpoint)
    }
}
