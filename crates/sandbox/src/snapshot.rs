// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot capture and restore over a [`SandboxManager`] and a
//! [`SnapshotStore`].

use crate::manager::{SandboxError, SandboxManager};
use crate::STATE_SEED_FILE;
use base64::Engine;
use reflexive_core::{id, Snapshot, SnapshotFile, SnapshotFileEncoding};
use reflexive_storage::SnapshotStore;
use std::sync::Arc;

/// How many log entries a snapshot carries at most.
const LOG_SLICE: usize = 100;

/// Read the requested files plus in-memory state and a bounded log slice,
/// assign a fresh `snap_*` id, and persist the record.
pub async fn capture(
    manager: &Arc<SandboxManager>,
    files: &[String],
    store: &Arc<dyn SnapshotStore>,
) -> Result<Snapshot, SandboxError> {
    let mut captured = Vec::new();
    for path in files {
        let bytes = manager.read_file(path).await?;
        let file = match String::from_utf8(bytes) {
            Ok(content) => SnapshotFile {
                path: path.clone(),
                content,
                encoding: SnapshotFileEncoding::Utf8,
            },
            Err(err) => SnapshotFile {
                path: path.clone(),
                content: base64::engine::general_purpose::STANDARD.encode(err.into_bytes()),
                encoding: SnapshotFileEncoding::Base64,
            },
        };
        captured.push(file);
    }

    let timestamp = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let snapshot = Snapshot {
        id: id::snapshot_id(timestamp),
        sandbox_id: manager.id().to_string(),
        timestamp,
        files: captured,
        state: manager.custom_state(),
        logs: manager.logs(Some(LOG_SLICE), None),
    };
    store.save(&snapshot).await?;
    Ok(snapshot)
}

/// Write a snapshot's files and seed state into a freshly created sandbox.
/// Captured logs are historical metadata and are not re-injected.
pub async fn restore_into(
    manager: &Arc<SandboxManager>,
    snapshot: &Snapshot,
) -> Result<(), SandboxError> {
    for file in &snapshot.files {
        let bytes = match file.encoding {
            SnapshotFileEncoding::Utf8 => file.content.clone().into_bytes(),
            SnapshotFileEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(&file.content)
                .unwrap_or_default(),
        };
        manager.write_file(&file.path, &bytes).await?;
    }

    let state_json =
        serde_json::to_vec(&snapshot.state).map_err(reflexive_storage::StorageError::from)?;
    manager.write_file(STATE_SEED_FILE, &state_json).await?;
    manager.seed_state(snapshot.state.clone());
    Ok(())
}

/// Default id for a resumed sandbox: `<origId>-resume-<ts36>`.
pub fn resume_id(original: &str, epoch_ms: u64) -> String {
    format!("{original}-resume-{}", id::ts36(epoch_ms))
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
