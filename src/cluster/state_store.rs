//! Cross-cycle state owned outside the engine.
//!
//! The engine reads [`MigrationState`] once per cycle, writes it back only when it
//! changed, and publishes outcomes under the keys in [`super::keys`].
//!
//! # Available Implementations
//!
//! - [`MemoryStateStore`]: in-process map, for tests and single-shot runs
//! - [`JsonFileStateStore`]: one JSON document on disk, rewritten atomically

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::error::{ReconcileError, ReconcileResult};
use super::keys::{BROKER_STAGE_KEY, CONTROLLER_STAGE_KEY};
use super::migration::MigrationState;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persisted migration state, or the default (both tracks idle) if none.
    async fn load_migration_state(&self) -> ReconcileResult<MigrationState>;

    async fn save_migration_state(&self, state: MigrationState) -> ReconcileResult<()>;

    /// Publish `value` under `key`, replacing any previous value.
    async fn publish(&self, key: &str, value: &str) -> ReconcileResult<()>;
}

/// Serialized form shared by both implementations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default)]
    pub migration: MigrationState,
    #[serde(default)]
    pub published: BTreeMap<String, String>,
}

impl StoredState {
    fn set_migration(&mut self, state: MigrationState) {
        self.migration = state;
        self.published.insert(
            CONTROLLER_STAGE_KEY.to_string(),
            state.controller_stage.as_str().to_string(),
        );
        self.published.insert(
            BROKER_STAGE_KEY.to_string(),
            state.broker_stage.as_str().to_string(),
        );
    }
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: RwLock<StoredState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MigrationState) -> Self {
        let mut stored = StoredState::default();
        stored.set_migration(state);
        Self {
            inner: RwLock::new(stored),
        }
    }

    /// Last value published under `key`.
    pub async fn published(&self, key: &str) -> Option<String> {
        self.inner.read().await.published.get(key).cloned()
    }

    pub async fn snapshot(&self) -> StoredState {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_migration_state(&self) -> ReconcileResult<MigrationState> {
        Ok(self.inner.read().await.migration)
    }

    async fn save_migration_state(&self, state: MigrationState) -> ReconcileResult<()> {
        self.inner.write().await.set_migration(state);
        Ok(())
    }

    async fn publish(&self, key: &str, value: &str) -> ReconcileResult<()> {
        self.inner
            .write()
            .await
            .published
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A [`StoredState`] document on disk.
///
/// Writes go to a sibling temp file that is then renamed over the target.
#[derive(Debug)]
pub struct JsonFileStateStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document; a missing file is an empty document.
    pub async fn read(&self) -> ReconcileResult<StoredState> {
        let _guard = self.lock.read().await;
        self.read_unlocked().await
    }

    async fn read_unlocked(&self) -> ReconcileResult<StoredState> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StoredState::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredState::default()),
            Err(e) => Err(ReconcileError::StateStore(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn update<F>(&self, mutate: F) -> ReconcileResult<()>
    where
        F: FnOnce(&mut StoredState) + Send,
    {
        let _guard = self.lock.write().await;
        let mut stored = self.read_unlocked().await?;
        mutate(&mut stored);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&stored)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "State file written");
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load_migration_state(&self) -> ReconcileResult<MigrationState> {
        Ok(self.read().await?.migration)
    }

    async fn save_migration_state(&self, state: MigrationState) -> ReconcileResult<()> {
        self.update(|stored| stored.set_migration(state)).await
    }

    async fn publish(&self, key: &str, value: &str) -> ReconcileResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.update(move |stored| {
            stored.published.insert(key, value);
        })
        .await
    }
}
