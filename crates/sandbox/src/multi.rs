// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Id-keyed sandbox pool with snapshot/resume.

use crate::manager::{FileUpload, SandboxError, SandboxManager};
use crate::provider::SandboxProvider;
use crate::snapshot;
use parking_lot::Mutex;
use reflexive_core::{AppState, SandboxConfig, SandboxInstance, Snapshot, SandboxStatus};
use reflexive_storage::SnapshotStore;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_MAX_SANDBOXES: usize = 10;

/// A pool of [`SandboxManager`]s sharing one provider and one snapshot
/// store. Each sandbox gets its own [`AppState`].
pub struct MultiSandboxManager {
    provider: Arc<dyn SandboxProvider>,
    store: Arc<dyn SnapshotStore>,
    max_sandboxes: usize,
    sandboxes: Mutex<HashMap<String, Arc<SandboxManager>>>,
}

impl MultiSandboxManager {
    pub fn new(
        provider: Arc<dyn SandboxProvider>,
        store: Arc<dyn SnapshotStore>,
        max_sandboxes: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            store,
            max_sandboxes: max_sandboxes.max(1),
            sandboxes: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Create a sandbox under a caller-chosen unique id.
    pub async fn create(
        &self,
        id: &str,
        config: SandboxConfig,
    ) -> Result<SandboxInstance, SandboxError> {
        let manager = {
            let mut sandboxes = self.sandboxes.lock();
            if sandboxes.contains_key(id) {
                return Err(SandboxError::DuplicateId(id.to_string()));
            }
            if sandboxes.len() >= self.max_sandboxes {
                return Err(SandboxError::LimitReached(self.max_sandboxes));
            }
            let manager =
                SandboxManager::new(id, Arc::clone(&self.provider), AppState::default());
            sandboxes.insert(id.to_string(), Arc::clone(&manager));
            manager
        };

        match manager.create(config).await {
            Ok(instance) => Ok(instance),
            Err(e) => {
                // Provision failed; release the slot.
                self.sandboxes.lock().remove(id);
                Err(e)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<SandboxManager>> {
        self.sandboxes.lock().get(id).cloned()
    }

    fn require(&self, id: &str) -> Result<Arc<SandboxManager>, SandboxError> {
        self.get(id).ok_or_else(|| SandboxError::UnknownSandbox(id.to_string()))
    }

    pub fn list(&self) -> Vec<SandboxInstance> {
        let mut all: Vec<SandboxInstance> =
            self.sandboxes.lock().values().filter_map(|m| m.instance()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    pub fn count(&self) -> usize {
        self.sandboxes.lock().len()
    }

    pub fn running_count(&self) -> usize {
        self.sandboxes
            .lock()
            .values()
            .filter(|m| m.status() == Some(SandboxStatus::Running))
            .count()
    }

    pub async fn start(
        &self,
        id: &str,
        entry: &str,
        args: &[String],
    ) -> Result<(), SandboxError> {
        self.require(id)?.start(entry, args).await
    }

    /// Stop a sandbox; stopping a non-running one is a no-op.
    pub async fn stop(&self, id: &str) -> Result<(), SandboxError> {
        self.require(id)?.stop().await
    }

    /// Destroy and forget a sandbox. Running sandboxes are stopped first;
    /// destroying an unknown id is a no-op.
    pub async fn destroy(&self, id: &str) -> Result<(), SandboxError> {
        let Some(manager) = self.get(id) else { return Ok(()) };
        if manager.is_running() {
            manager.stop().await?;
        }
        manager.destroy().await?;
        self.sandboxes.lock().remove(id);
        Ok(())
    }

    pub async fn destroy_all(&self) -> Result<(), SandboxError> {
        let ids: Vec<String> = self.sandboxes.lock().keys().cloned().collect();
        for id in ids {
            self.destroy(&id).await?;
        }
        Ok(())
    }

    /// Capture a snapshot of the given file set (possibly empty).
    pub async fn snapshot(
        &self,
        id: &str,
        files: &[String],
    ) -> Result<Snapshot, SandboxError> {
        let manager = self.require(id)?;
        snapshot::capture(&manager, files, &self.store).await
    }

    /// Create a new sandbox seeded from a snapshot. Returns the new id;
    /// the sandbox is left in created state (caller starts it).
    pub async fn resume(
        &self,
        snapshot_id: &str,
        new_id: Option<String>,
    ) -> Result<SandboxInstance, SandboxError> {
        let snapshot = self
            .store
            .load(snapshot_id)
            .await?
            .ok_or_else(|| SandboxError::UnknownSnapshot(snapshot_id.to_string()))?;

        let epoch_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let id = new_id.unwrap_or_else(|| snapshot::resume_id(&snapshot.sandbox_id, epoch_ms));
        let instance = self.create(&id, SandboxConfig::default()).await?;
        let manager = self.require(&id)?;
        snapshot::restore_into(&manager, &snapshot).await?;
        Ok(instance)
    }

    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>, SandboxError> {
        Ok(self.store.list().await?)
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>, SandboxError> {
        Ok(self.store.load(id).await?)
    }

    pub async fn delete_snapshot(&self, id: &str) -> Result<bool, SandboxError> {
        Ok(self.store.delete(id).await?)
    }

    // Per-id delegations used by the tool plane and REST layer.

    pub async fn upload_files(&self, id: &str, files: &[FileUpload]) -> Result<(), SandboxError> {
        self.require(id)?.upload_files(files).await
    }

    pub async fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>, SandboxError> {
        self.require(id)?.read_file(path).await
    }

    pub async fn write_file(
        &self,
        id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), SandboxError> {
        self.require(id)?.write_file(path, content).await
    }

    pub async fn run_command(
        &self,
        id: &str,
        command: &str,
        args: &[String],
    ) -> Result<crate::provider::ExecOutput, SandboxError> {
        self.require(id)?.run_command(command, args).await
    }

    pub fn logs(
        &self,
        id: &str,
        count: Option<usize>,
        query: Option<&str>,
    ) -> Result<Vec<reflexive_core::LogEntry>, SandboxError> {
        let manager = self.require(id)?;
        Ok(match query {
            Some(query) => manager.search_logs(query),
            None => manager.logs(count, None),
        })
    }

    pub fn custom_state(
        &self,
        id: &str,
        key: Option<&str>,
    ) -> Result<serde_json::Value, SandboxError> {
        let manager = self.require(id)?;
        Ok(match key {
            Some(key) => manager.get_custom_state(key).unwrap_or(serde_json::Value::Null),
            None => serde_json::to_value(manager.custom_state()).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
#[path = "multi_tests.rs"]
mod tests;
