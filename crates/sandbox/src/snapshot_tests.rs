// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::manager::FileUpload;
use crate::provider::{FakeProvider, SandboxProvider};
use reflexive_core::{AppState, LogType, SandboxConfig};
use reflexive_storage::MemoryStore;

async fn running_manager(provider: &Arc<FakeProvider>) -> Arc<SandboxManager> {
    let manager = SandboxManager::new(
        "sb-snap",
        Arc::clone(provider) as Arc<dyn SandboxProvider>,
        AppState::default(),
    );
    manager.create(SandboxConfig::default()).await.unwrap();
    manager.start("/app/main.js", &[]).await.unwrap();
    manager
}

#[tokio::test]
async fn capture_bundles_files_state_and_logs() {
    let provider = Arc::new(FakeProvider::new());
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
    let manager = running_manager(&provider).await;

    manager
        .upload_files(&[FileUpload {
            path: "/app/main.js".into(),
            content: "console.log(\"Hello\")".into(),
        }])
        .await
        .unwrap();
    manager.seed_state([("counter".to_string(), serde_json::json!(1))].into_iter().collect());
    manager.app().log(LogType::Stdout, "Hello", None);

    let snapshot = capture(&manager, &["/app/main.js".to_string()], &store).await.unwrap();
    assert!(snapshot.id.starts_with("snap_"));
    assert_eq!(snapshot.sandbox_id, "sb-snap");
    assert_eq!(snapshot.files.len(), 1);
    assert_eq!(snapshot.files[0].content, "console.log(\"Hello\")");
    assert_eq!(snapshot.state.get("counter"), Some(&serde_json::json!(1)));
    assert!(snapshot.logs.iter().any(|e| e.message == "Hello"));

    // Persisted and loadable, byte-identical file contents.
    let loaded = store.load(&snapshot.id).await.unwrap().unwrap();
    assert_eq!(loaded, snapshot);
    let value = serde_json::to_value(&loaded).unwrap();
    assert!(reflexive_core::validate_snapshot(&value).is_empty());
}

#[tokio::test]
async fn capture_with_no_files_is_valid() {
    let provider = Arc::new(FakeProvider::new());
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
    let manager = running_manager(&provider).await;
    let snapshot = capture(&manager, &[], &store).await.unwrap();
    assert!(snapshot.files.is_empty());
    assert!(store.exists(&snapshot.id).await.unwrap());
}

#[tokio::test]
async fn binary_content_round_trips_via_base64() {
    let provider = Arc::new(FakeProvider::new());
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
    let manager = running_manager(&provider).await;
    manager.write_file("/app/blob.bin", &[0xff, 0xfe, 0x00, 0x7f]).await.unwrap();

    let snapshot = capture(&manager, &["/app/blob.bin".to_string()], &store).await.unwrap();
    assert_eq!(snapshot.files[0].encoding, reflexive_core::SnapshotFileEncoding::Base64);

    let target = SandboxManager::new(
        "sb-restored",
        Arc::clone(&provider) as Arc<dyn SandboxProvider>,
        AppState::default(),
    );
    target.create(SandboxConfig::default()).await.unwrap();
    restore_into(&target, &snapshot).await.unwrap();
    assert_eq!(target.read_file("/app/blob.bin").await.unwrap(), vec![0xff, 0xfe, 0x00, 0x7f]);
}

#[tokio::test]
async fn restore_writes_files_and_state_seed() {
    let provider = Arc::new(FakeProvider::new());
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
    let manager = running_manager(&provider).await;
    manager
        .upload_files(&[FileUpload { path: "/app/main.js".into(), content: "x".into() }])
        .await
        .unwrap();
    manager.seed_state([("counter".to_string(), serde_json::json!(7))].into_iter().collect());
    let snapshot = capture(&manager, &["/app/main.js".to_string()], &store).await.unwrap();

    let target = SandboxManager::new(
        "sb-target",
        Arc::clone(&provider) as Arc<dyn SandboxProvider>,
        AppState::default(),
    );
    target.create(SandboxConfig::default()).await.unwrap();
    restore_into(&target, &snapshot).await.unwrap();

    assert_eq!(target.read_file("/app/main.js").await.unwrap(), b"x");
    let seed = target.read_file(crate::STATE_SEED_FILE).await.unwrap();
    let seeded: serde_json::Value = serde_json::from_slice(&seed).unwrap();
    assert_eq!(seeded["counter"], 7);
    assert_eq!(target.get_custom_state("counter"), Some(serde_json::json!(7)));
    assert!(target.logs(None, None).is_empty(), "captured logs are not re-injected");
}

#[test]
fn resume_id_shape() {
    assert_eq!(resume_id("workflow-test", 36), "workflow-test-resume-10");
}
