// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use reflexive_chat::{FakeLlm, LlmEvent};
use reflexive_sandbox::{FakeProvider, SandboxProvider};
use reflexive_storage::{MemoryStore, SnapshotStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn serve_api() -> (u16, Arc<ApiCtx>) {
    let provider = Arc::new(FakeProvider::new());
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
    let pool = MultiSandboxManager::new(provider as Arc<dyn SandboxProvider>, store, 10);
    let llm = Arc::new(FakeLlm::with_script(vec![
        LlmEvent::SessionInit { session_id: "s-1".into() },
        LlmEvent::TextDelta { content: "hello".into() },
        LlmEvent::End,
    ]));
    let ctx = Arc::new(ApiCtx {
        pool,
        chat: Some(Arc::new(ChatStream::new(llm))),
        capabilities: Capabilities::all(),
    });
    let router = api_router(Arc::clone(&ctx), "/api");
    let (port, _task) = Arc::new(router).serve("127.0.0.1", 0).await.unwrap();
    (port, ctx)
}

async fn call(port: u16, method: &str, path: &str, body: Option<&Value>) -> (u16, Value, String) {
    let body_text = body.map(|b| b.to_string()).unwrap_or_default();
    let raw = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body_text.len(),
        body_text
    );
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let status: u16 = response
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let body_start = response.find("\r\n\r\n").map(|i| i + 4).unwrap_or(response.len());
    let body_text = &response[body_start..];
    let value = serde_json::from_str(body_text).unwrap_or(Value::Null);
    (status, value, response)
}

#[tokio::test]
async fn health_reports_counts() {
    let (port, ctx) = serve_api().await;
    ctx.pool.create("a", SandboxConfig::default()).await.unwrap();
    let (status, body, _) = call(port, "GET", "/api/health", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sandboxes"], 1);
    assert_eq!(body["running"], 0);
}

#[tokio::test]
async fn full_sandbox_lifecycle_over_rest() {
    let (port, _ctx) = serve_api().await;

    let (status, body, _) =
        call(port, "POST", "/api/sandboxes", Some(&json!({ "id": "workflow-test" }))).await;
    assert_eq!(status, 201, "{body}");
    assert_eq!(body["id"], "workflow-test");
    assert_eq!(body["status"], "created");

    let (status, _, _) = call(
        port,
        "PUT",
        "/api/sandboxes/workflow-test/files/app/main.js",
        Some(&json!({ "content": "console.log(\"Hello\")" })),
    )
    .await;
    assert_eq!(status, 200);

    let (status, _, _) = call(
        port,
        "POST",
        "/api/sandboxes/workflow-test/start",
        Some(&json!({ "entryFile": "/app/main.js" })),
    )
    .await;
    assert_eq!(status, 200);

    let (status, snap, _) =
        call(port, "POST", "/api/sandboxes/workflow-test/snapshot", None).await;
    assert_eq!(status, 201);
    let snapshot_id = snap["snapshotId"].as_str().unwrap().to_string();
    assert!(snapshot_id.starts_with("snap_"));

    let (status, _, _) = call(port, "POST", "/api/sandboxes/workflow-test/stop", None).await;
    assert_eq!(status, 200);
    let (status, _, _) = call(port, "DELETE", "/api/sandboxes/workflow-test", None).await;
    assert_eq!(status, 200);

    let (status, resumed, _) = call(
        port,
        "POST",
        &format!("/api/snapshots/{snapshot_id}/resume"),
        Some(&json!({ "newId": "workflow-restored" })),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(resumed["id"], "workflow-restored");

    let (status, fetched, _) =
        call(port, "GET", "/api/sandboxes/workflow-restored", None).await;
    assert_eq!(status, 200);
    assert_eq!(fetched["id"], "workflow-restored");

    let (status, file, _) = call(
        port,
        "GET",
        "/api/sandboxes/workflow-restored/files/app/main.js",
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(file["content"], "console.log(\"Hello\")");
}

#[tokio::test]
async fn missing_ids_map_to_404() {
    let (port, _ctx) = serve_api().await;
    let (status, body, _) = call(port, "GET", "/api/sandboxes/ghost", None).await;
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("ghost"));

    let (status, _, _) = call(port, "GET", "/api/snapshots/snap_nope", None).await;
    assert_eq!(status, 404);
    let (status, _, _) = call(port, "DELETE", "/api/snapshots/snap_nope", None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn precondition_violations_map_to_400() {
    let (port, _ctx) = serve_api().await;
    call(port, "POST", "/api/sandboxes", Some(&json!({ "id": "a" }))).await;
    let (status, _, _) =
        call(port, "POST", "/api/sandboxes", Some(&json!({ "id": "a" }))).await;
    assert_eq!(status, 400, "duplicate create");

    let (status, _, _) = call(
        port,
        "POST",
        "/api/sandboxes/a/start",
        Some(&json!({})),
    )
    .await;
    assert_eq!(status, 400, "missing entryFile");
}

#[tokio::test]
async fn malformed_json_body_is_400() {
    let (port, _ctx) = serve_api().await;
    let raw = "POST /api/sandboxes HTTP/1.1\r\nContent-Length: 8\r\n\r\nnot json";
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.contains("400"));
    assert!(response.contains("Invalid JSON body"));
}

#[tokio::test]
async fn logs_and_state_queries_work() {
    let (port, ctx) = serve_api().await;
    ctx.pool.create("a", SandboxConfig::default()).await.unwrap();
    let manager = ctx.pool.get("a").unwrap();
    manager.app().log(reflexive_core::LogType::Stdout, "Listening on port 3000", None);
    manager.seed_state([("counter".to_string(), json!(1))].into_iter().collect());

    let (status, body, _) =
        call(port, "GET", "/api/sandboxes/a/logs?query=listening", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["logs"].as_array().unwrap().len(), 1);

    let (status, body, _) = call(port, "GET", "/api/sandboxes/a/state?key=counter", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["state"], 1);
}

#[tokio::test]
async fn chat_streams_sse_frames() {
    let (port, ctx) = serve_api().await;
    ctx.pool.create("a", SandboxConfig::default()).await.unwrap();

    let body = json!({ "message": "hi" }).to_string();
    let raw = format!(
        "POST /api/sandboxes/a/chat HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.contains("Content-Type: text/event-stream"));
    assert!(response.contains("data: {\"type\":\"session\",\"sessionId\":\"s-1\"}\n\n"));
    assert!(response.contains("data: {\"type\":\"text\",\"content\":\"hello\"}\n\n"));
    assert!(response.trim_end().ends_with("data: {\"type\":\"done\"}"));
}

#[tokio::test]
async fn chat_to_unknown_sandbox_is_404() {
    let (port, _ctx) = serve_api().await;
    let (status, _, _) =
        call(port, "POST", "/api/sandboxes/ghost/chat", Some(&json!({ "message": "x" }))).await;
    assert_eq!(status, 404);
}
