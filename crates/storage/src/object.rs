// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object-store snapshot backend.
//!
//! Objects live at `<root>/<prefix>/<id>.json` as UTF-8 JSON. Listing
//! tolerates unreadable or malformed objects by skipping them.

use crate::{SnapshotStore, StorageError};
use async_trait::async_trait;
use reflexive_core::Snapshot;
use std::path::{Path, PathBuf};

pub struct ObjectStore {
    dir: PathBuf,
}

impl ObjectStore {
    /// `prefix` namespaces this store's objects under `root`.
    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Self {
        Self { dir: root.into().join(prefix) }
    }

    fn object_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Io { path: self.dir.clone(), source })
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io { path: path.to_path_buf(), source }
}

#[async_trait]
impl SnapshotStore for ObjectStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.ensure_dir().await?;
        let path = self.object_path(&snapshot.id);
        let json = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&path, json).await.map_err(|e| io_err(&path, e))
    }

    async fn load(&self, id: &str) -> Result<Option<Snapshot>, StorageError> {
        let path = self.object_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path, e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn list(&self) -> Result<Vec<Snapshot>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.dir, e)),
        };

        let mut all = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(io_err(&self.dir, e)),
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<Snapshot>(&bytes) {
                    Ok(snapshot) => all.push(snapshot),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping malformed snapshot object");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable snapshot object");
                }
            }
        }

        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(all)
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let path = self.object_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.object_path(id)).await.unwrap_or(false))
    }
}

#[cfg(test)]
#[path = "object_tests.rs"]
mod tests;
