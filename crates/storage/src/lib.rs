// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! reflexive-storage: Snapshot blob persistence.
//!
//! A [`SnapshotStore`] is the four-method interface the sandbox layer saves
//! to: in-memory for tests and ephemeral runs, object-store for anything
//! that must survive the process.

mod memory;
mod object;

pub use memory::MemoryStore;
pub use object::ObjectStore;

use async_trait::async_trait;
use reflexive_core::Snapshot;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from snapshot persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Snapshot blob CRUD. `save` is an idempotent replace; `delete` reports
/// whether the id existed. `list` returns snapshots newest-first.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
    async fn load(&self, id: &str) -> Result<Option<Snapshot>, StorageError>;
    async fn list(&self) -> Result<Vec<Snapshot>, StorageError>;
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;
    async fn exists(&self, id: &str) -> Result<bool, StorageError>;
}
