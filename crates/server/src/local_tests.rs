// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use reflexive_chat::{FakeLlm, LlmEvent};
use reflexive_core::{AppState, Capabilities};
use reflexive_process::ProcessOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn serve_local() -> (u16, Arc<LocalCtx>) {
    let mut opts = ProcessOptions::new("app.js");
    opts.capabilities = Capabilities::all();
    let manager = ProcessManager::new(AppState::default(), opts);
    let llm = Arc::new(FakeLlm::with_script(vec![
        LlmEvent::SessionInit { session_id: "sess-42".into() },
        LlmEvent::TextDelta { content: "looking".into() },
        LlmEvent::End,
    ]));
    let ctx = Arc::new(LocalCtx {
        manager,
        chat: Some(Arc::new(ChatStream::new(llm))),
        session_id: Mutex::new(None),
        shutdown: CancellationToken::new(),
    });
    let router = local_router(Arc::clone(&ctx));
    let (port, _task) = Arc::new(router).serve("127.0.0.1", 0).await.unwrap();
    (port, ctx)
}

async fn call(port: u16, method: &str, path: &str, body: Option<&Value>) -> (u16, Value) {
    let body_text = body.map(|b| b.to_string()).unwrap_or_default();
    let raw = format!(
        "{method} {path} HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
        body_text.len(),
        body_text
    );
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    let status: u16 =
        response.split_whitespace().nth(1).and_then(|s| s.parse().ok()).unwrap_or(0);
    let body_start = response.find("\r\n\r\n").map(|i| i + 4).unwrap_or(response.len());
    (status, serde_json::from_str(&response[body_start..]).unwrap_or(Value::Null))
}

#[tokio::test]
async fn state_reports_process_and_capabilities() {
    let (port, _ctx) = serve_local().await;
    let (status, body) = call(port, "GET", "/state", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["process"]["isRunning"], false);
    assert_eq!(body["capabilities"]["debug"], true);
    assert!(body["app"]["logCount"].is_number());
}

#[tokio::test]
async fn logs_endpoint_filters() {
    let (port, ctx) = serve_local().await;
    ctx.manager.app().log(LogType::Stdout, "out", None);
    ctx.manager.app().log(LogType::Stderr, "err", None);
    let (status, body) = call(port, "GET", "/logs?type=stderr", None).await;
    assert_eq!(status, 200);
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["message"], "err");
}

#[tokio::test]
async fn cli_input_without_target_is_400() {
    let (port, _ctx) = serve_local().await;
    let (status, body) =
        call(port, "POST", "/cli-input", Some(&json!({ "text": "hello" }))).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("not running"));
}

#[tokio::test]
async fn shutdown_cancels_the_token() {
    let (port, ctx) = serve_local().await;
    assert!(!ctx.shutdown.is_cancelled());
    let (status, _) = call(port, "POST", "/shutdown", None).await;
    assert_eq!(status, 200);
    assert!(ctx.shutdown.is_cancelled());
}

#[tokio::test]
async fn breakpoints_crud_via_dashboard_routes() {
    let (port, _ctx) = serve_local().await;

    let (status, bp) = call(
        port,
        "POST",
        "/debugger-breakpoints",
        Some(&json!({ "file": "/app/main.js", "line": 5, "prompt": "why?" })),
    )
    .await;
    assert_eq!(status, 201);
    let id = bp["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("bp_"));

    let (status, listed) = call(port, "GET", "/debugger-breakpoints", None).await;
    assert_eq!(status, 200);
    assert_eq!(listed["breakpoints"].as_array().unwrap().len(), 1);

    let (status, patched) = call(
        port,
        "PATCH",
        &format!("/debugger-breakpoint/{id}"),
        Some(&json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(patched["enabled"], false);

    let (status, _) =
        call(port, "DELETE", &format!("/debugger-breakpoint/{id}"), None).await;
    assert_eq!(status, 200);
    let (status, _) =
        call(port, "DELETE", &format!("/debugger-breakpoint/{id}"), None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn debugger_actions_require_a_connection() {
    let (port, _ctx) = serve_local().await;
    let (status, body) = call(port, "POST", "/debugger-resume", None).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("not connected"));
}

#[tokio::test]
async fn chat_records_session_id_and_reset_clears_it() {
    let (port, ctx) = serve_local().await;

    let body = json!({ "message": "hi" }).to_string();
    let raw = format!(
        "POST /chat HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.contains("\"sessionId\":\"sess-42\""));
    assert!(response.contains("data: {\"type\":\"done\"}"));
    assert_eq!(ctx.session_id.lock().as_deref(), Some("sess-42"));

    let (status, _) = call(port, "POST", "/reset-conversation", None).await;
    assert_eq!(status, 200);
    assert!(ctx.session_id.lock().is_none());
}

#[tokio::test]
async fn permissions_toggle_capabilities() {
    let (port, ctx) = serve_local().await;

    let (status, body) = call(
        port,
        "POST",
        "/permissions",
        Some(&json!({ "capabilities": { "eval": false, "debug": false } })),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["capabilities"]["debug"], false);
    assert!(!ctx.manager.capabilities().debug);

    let (status, body) = call(
        port,
        "POST",
        "/permissions",
        Some(&json!({ "dangerouslySkipPermissions": true })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["capabilities"]["eval"], true);
    assert!(ctx.manager.capabilities().debug);

    let (status, _) = call(port, "POST", "/permissions", Some(&json!({}))).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn files_lists_cwd_entries() {
    let (port, ctx) = serve_local().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.js"), "x").unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    // Point the listing at the temp dir through the query parameter.
    let (status, body) = call(
        port,
        "GET",
        &format!("/files?dir={}", dir.path().display()),
        None,
    )
    .await;
    assert_eq!(status, 200, "{body}");
    let files = body["files"].as_array().unwrap();
    assert!(files.iter().any(|f| f["name"] == "a.js" && f["dir"] == false));
    assert!(files.iter().any(|f| f["name"] == "src" && f["dir"] == true));
    drop(ctx);
}
