// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::provider::FakeProvider;

fn setup() -> (Arc<SandboxManager>, Arc<FakeProvider>, AppState) {
    let provider = Arc::new(FakeProvider::new());
    let app = AppState::default();
    let manager =
        SandboxManager::new("sb-1", Arc::clone(&provider) as Arc<dyn SandboxProvider>, app.clone());
    (manager, provider, app)
}

fn shim_line(kind: &str, data: Value) -> String {
    serde_json::json!({ "type": kind, "data": data, "ts": 1_706_200_000_000u64 }).to_string()
        + "\n"
}

#[tokio::test]
async fn create_twice_is_an_error() {
    let (manager, _, _) = setup();
    let instance = manager.create(SandboxConfig::default()).await.unwrap();
    assert_eq!(instance.status, SandboxStatus::Created);
    assert!(matches!(
        manager.create(SandboxConfig::default()).await,
        Err(SandboxError::AlreadyCreated(_))
    ));
}

#[tokio::test]
async fn start_without_create_is_an_error() {
    let (manager, _, _) = setup();
    assert!(matches!(manager.start("/app/main.js", &[]).await, Err(SandboxError::NotCreated)));
}

#[tokio::test]
async fn start_uploads_shim_and_preloads_it() {
    let (manager, provider, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    manager.start("/app/main.js", &["--flag".into()]).await.unwrap();

    assert!(manager.is_running());
    let shim = provider.read_file("sb-1", SHIM_FILE).await.unwrap();
    assert!(!shim.is_empty());
    let (command, args) = provider.last_process("sb-1").unwrap();
    assert_eq!(command, "node");
    assert_eq!(args, ["/app/main.js", "--flag"]);
}

#[tokio::test]
async fn poll_decodes_shim_lines() {
    let (manager, provider, app) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    manager.start("/app/main.js", &[]).await.unwrap();
    let (_id, mut ready_rx) = app.on(Some("injectionReady"));

    provider.append_file(
        "sb-1",
        LOG_FILE,
        &shim_line(
            "ready",
            serde_json::json!({ "pid": 1234, "nodeVersion": "v22.0.0", "platform": "linux" }),
        ),
    );
    provider.append_file(
        "sb-1",
        LOG_FILE,
        &shim_line("log", serde_json::json!({ "level": "info", "message": "Listening on port 3000" })),
    );
    provider.append_file(
        "sb-1",
        LOG_FILE,
        &shim_line("state", serde_json::json!({ "key": "counter", "value": 1 })),
    );

    let processed = manager.poll_logs().await.unwrap();
    assert_eq!(processed, 3);

    let ready = ready_rx.try_recv().unwrap();
    match ready {
        Event::InjectionReady { info } => assert_eq!(info["pid"], 1234),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(manager.injection_ready());
    assert!(manager
        .logs(None, None)
        .iter()
        .any(|e| e.message == "Listening on port 3000" && e.entry_type == LogType::Info));
    assert_eq!(manager.get_custom_state("counter"), Some(Value::from(1)));
}

#[tokio::test]
async fn poll_tracks_offset_and_does_not_reprocess() {
    let (manager, provider, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    manager.start("/app/main.js", &[]).await.unwrap();

    provider.append_file("sb-1", LOG_FILE, &shim_line("log", serde_json::json!({"level":"info","message":"one"})));
    assert_eq!(manager.poll_logs().await.unwrap(), 1);
    assert_eq!(manager.poll_logs().await.unwrap(), 0, "no new bytes, no messages");

    provider.append_file("sb-1", LOG_FILE, &shim_line("log", serde_json::json!({"level":"info","message":"two"})));
    assert_eq!(manager.poll_logs().await.unwrap(), 1);
    assert_eq!(manager.search_logs("one").len(), 1, "first line processed exactly once");
}

#[tokio::test]
async fn poll_skips_malformed_lines_and_missing_file() {
    let (manager, provider, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();

    // No start yet: log file absent, poll yields nothing.
    assert_eq!(manager.poll_logs().await.unwrap(), 0);

    manager.start("/app/main.js", &[]).await.unwrap();
    provider.append_file("sb-1", LOG_FILE, "garbage line\n");
    provider.append_file("sb-1", LOG_FILE, &shim_line("log", serde_json::json!({"level":"warn","message":"kept"})));
    assert_eq!(manager.poll_logs().await.unwrap(), 1);
    assert_eq!(manager.search_logs("kept").len(), 1);
}

#[tokio::test]
async fn error_lines_become_inject_error_entries() {
    let (manager, provider, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    manager.start("/app/main.js", &[]).await.unwrap();

    provider.append_file(
        "sb-1",
        LOG_FILE,
        &shim_line("error", serde_json::json!({ "name": "TypeError", "message": "boom", "stack": "at x" })),
    );
    manager.poll_logs().await.unwrap();

    let errors = manager.logs(None, Some(&LogType::Inject("inject:error".into())));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("TypeError: boom"));
}

#[tokio::test]
async fn stop_is_a_no_op_when_not_running() {
    let (manager, _, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    manager.stop().await.unwrap();
    manager.start("/app/main.js", &[]).await.unwrap();
    manager.stop().await.unwrap();
    assert_eq!(manager.status(), Some(SandboxStatus::Stopped));
    manager.stop().await.unwrap();
}

#[tokio::test]
async fn restart_requires_an_entry() {
    let (manager, _, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    assert!(matches!(manager.restart().await, Err(SandboxError::NoEntry)));
}

#[tokio::test]
async fn restart_truncates_log_and_resets_offset() {
    let (manager, provider, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    manager.start("/app/main.js", &[]).await.unwrap();
    provider.append_file("sb-1", LOG_FILE, &shim_line("log", serde_json::json!({"level":"info","message":"before"})));
    manager.poll_logs().await.unwrap();

    manager.restart().await.unwrap();
    assert!(manager.is_running());
    let log = provider.read_file("sb-1", LOG_FILE).await.unwrap();
    assert!(log.is_empty(), "restart truncates the shim log");

    provider.append_file("sb-1", LOG_FILE, &shim_line("log", serde_json::json!({"level":"info","message":"after"})));
    assert_eq!(manager.poll_logs().await.unwrap(), 1);
    assert_eq!(manager.search_logs("after").len(), 1);
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let (manager, provider, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    manager.start("/app/main.js", &[]).await.unwrap();
    manager.destroy().await.unwrap();
    assert_eq!(provider.sandbox_count(), 0);
    assert!(manager.instance().is_none());
    manager.destroy().await.unwrap();
}

#[tokio::test]
async fn run_command_returns_scripted_output() {
    let (manager, provider, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    provider.script_exec(
        "ls",
        ExecOutput { stdout: "main.js\n".into(), stderr: String::new(), exit_code: 0 },
    );
    let output = manager.run_command("ls", &["/app".into()]).await.unwrap();
    assert_eq!(output.stdout, "main.js\n");
    assert_eq!(output.exit_code, 0);
}

#[tokio::test]
async fn file_io_round_trips() {
    let (manager, _, _) = setup();
    manager.create(SandboxConfig::default()).await.unwrap();
    manager
        .upload_files(&[FileUpload {
            path: "/app/main.js".into(),
            content: "console.log(\"Hello\")".into(),
        }])
        .await
        .unwrap();
    let content = manager.read_file("/app/main.js").await.unwrap();
    assert_eq!(content, b"console.log(\"Hello\")");
    let listed = manager.list_files("/app").await.unwrap();
    assert_eq!(listed, ["/app/main.js"]);
}
