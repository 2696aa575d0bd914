// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory snapshot store.

use crate::{SnapshotStore, StorageError};
use async_trait::async_trait;
use parking_lot::Mutex;
use reflexive_core::Snapshot;
use std::collections::HashMap;

/// Map-backed store. Values are cloned on the way in and out so callers
/// never share a snapshot with the store.
#[derive(Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<String, Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.snapshots.lock().insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Snapshot>, StorageError> {
        Ok(self.snapshots.lock().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Snapshot>, StorageError> {
        let mut all: Vec<Snapshot> = self.snapshots.lock().values().cloned().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(all)
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.snapshots.lock().remove(id).is_some())
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.snapshots.lock().contains_key(id))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
