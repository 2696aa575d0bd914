// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::SnapshotStore;
use reflexive_core::{Snapshot, SnapshotFile, SnapshotFileEncoding};

fn snap(id: &str, ts: u64) -> Snapshot {
    Snapshot {
        id: id.to_string(),
        sandbox_id: "sb".to_string(),
        timestamp: ts,
        files: vec![SnapshotFile {
            path: "/app/main.js".into(),
            content: "x".into(),
            encoding: SnapshotFileEncoding::Utf8,
        }],
        state: Default::default(),
        logs: Vec::new(),
    }
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let store = MemoryStore::new();
    let s = snap("snap_a", 1);
    store.save(&s).await.unwrap();
    let loaded = store.load("snap_a").await.unwrap().unwrap();
    assert_eq!(loaded, s);
}

#[tokio::test]
async fn load_missing_returns_none() {
    let store = MemoryStore::new();
    assert!(store.load("snap_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn save_is_idempotent_replace() {
    let store = MemoryStore::new();
    store.save(&snap("snap_a", 1)).await.unwrap();
    let mut updated = snap("snap_a", 2);
    updated.sandbox_id = "other".into();
    store.save(&updated).await.unwrap();
    assert_eq!(store.list().await.unwrap().len(), 1);
    assert_eq!(store.load("snap_a").await.unwrap().unwrap().sandbox_id, "other");
}

#[tokio::test]
async fn list_sorts_by_timestamp_descending() {
    let store = MemoryStore::new();
    store.save(&snap("snap_old", 10)).await.unwrap();
    store.save(&snap("snap_new", 30)).await.unwrap();
    store.save(&snap("snap_mid", 20)).await.unwrap();
    let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, ["snap_new", "snap_mid", "snap_old"]);
}

#[tokio::test]
async fn delete_reports_existence() {
    let store = MemoryStore::new();
    store.save(&snap("snap_a", 1)).await.unwrap();
    assert!(store.delete("snap_a").await.unwrap());
    assert!(!store.delete("snap_a").await.unwrap());
    assert!(!store.exists("snap_a").await.unwrap());
}

#[tokio::test]
async fn loaded_snapshot_is_not_shared_with_store() {
    let store = MemoryStore::new();
    store.save(&snap("snap_a", 1)).await.unwrap();
    let mut loaded = store.load("snap_a").await.unwrap().unwrap();
    loaded.files[0].content = "mutated".into();
    let reloaded = store.load("snap_a").await.unwrap().unwrap();
    assert_eq!(reloaded.files[0].content, "x");
}
