// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::net::UnixStream;

struct ShimEnd {
    stream: tokio::io::BufReader<UnixStream>,
}

impl ShimEnd {
    async fn connect(path: &PathBuf) -> Self {
        let stream = UnixStream::connect(path).await.unwrap();
        Self { stream: tokio::io::BufReader::new(stream) }
    }

    async fn send(&mut self, msg: Value) {
        let line = msg.to_string() + "\n";
        self.stream.get_mut().write_all(line.as_bytes()).await.unwrap();
    }

    async fn send_ready(&mut self) {
        self.send(json!({
            "type": "ready",
            "data": { "pid": 1234, "nodeVersion": "v22.0.0", "platform": "linux" },
            "ts": 1_706_200_000_000u64,
        }))
        .await;
    }

    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(2), self.stream.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(&line).unwrap()
    }
}

fn channel(dir: &tempfile::TempDir) -> (InjectChannel, AppState) {
    let app = AppState::default();
    let path = dir.path().join("reflexive.sock");
    let channel = InjectChannel::listen(path, app.clone()).unwrap();
    (channel, app)
}

async fn ready_channel(dir: &tempfile::TempDir) -> (InjectChannel, AppState, ShimEnd) {
    let (channel, app) = channel(dir);
    let (_id, mut ready_rx) = app.on(Some("injectionReady"));
    let mut shim = ShimEnd::connect(channel.socket_path()).await;
    shim.send_ready().await;
    tokio::time::timeout(Duration::from_secs(2), ready_rx.recv()).await.unwrap().unwrap();
    (channel, app, shim)
}

#[tokio::test]
async fn ready_message_flips_state_and_emits() {
    let dir = tempfile::tempdir().unwrap();
    let (channel, app, _shim) = ready_channel(&dir).await;
    assert!(channel.is_ready());
    let logs = app.logs(None, None);
    assert!(logs.iter().any(|e| e.message == "Injection ready"));
}

#[tokio::test]
async fn log_and_state_messages_route_to_app_state() {
    let dir = tempfile::tempdir().unwrap();
    let (channel, app, mut shim) = ready_channel(&dir).await;

    shim.send(json!({
        "type": "log",
        "data": { "level": "info", "message": "Listening on port 3000" },
        "ts": 1_706_200_001_000u64,
    }))
    .await;
    shim.send(json!({
        "type": "state",
        "data": { "key": "counter", "value": 1 },
        "ts": 1_706_200_002_000u64,
    }))
    .await;

    // The reader task consumes lines asynchronously.
    tokio::time::timeout(Duration::from_secs(2), async {
        while app.get_state("counter").is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(app.get_state("counter"), Some(1.into()));
    assert_eq!(channel.cached_state().get("counter"), Some(&Value::from(1)));
    let hits = app.search_logs("listening on port 3000");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entry_type, LogType::Info);
}

#[tokio::test]
async fn error_message_becomes_inject_error_entry() {
    let dir = tempfile::tempdir().unwrap();
    let (_channel, app, mut shim) = ready_channel(&dir).await;
    let (_id, mut err_rx) = app.on(Some("injectError"));

    shim.send(json!({
        "type": "error",
        "data": { "name": "TypeError", "message": "x is not a function", "stack": "at main" },
        "ts": 0,
    }))
    .await;

    let event = tokio::time::timeout(Duration::from_secs(2), err_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.name(), "injectError");
    let entries = app.logs(None, Some(&LogType::Inject("inject:error".into())));
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("TypeError"));
}

#[tokio::test]
async fn evaluate_round_trips_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let (channel, _app, mut shim) = ready_channel(&dir).await;

    let eval = tokio::spawn(async move {
        channel.evaluate("1 + 1", Duration::from_secs(2)).await
    });

    let request = shim.recv().await;
    assert_eq!(request["type"], "evaluate");
    assert_eq!(request["code"], "1 + 1");
    let id = request["id"].as_u64().unwrap();
    shim.send(json!({ "type": "eval_response", "id": id, "result": 2, "ts": 0 })).await;

    let result = eval.await.unwrap().unwrap();
    assert_eq!(result, Value::from(2));
}

#[tokio::test]
async fn evaluate_times_out_and_discards_late_response() {
    let dir = tempfile::tempdir().unwrap();
    let (channel, _app, mut shim) = ready_channel(&dir).await;

    let err = channel.evaluate("while(true){}", Duration::from_millis(50)).await.unwrap_err();
    assert!(matches!(err, InjectError::Timeout(_)));

    // Late response: nothing to correlate with, silently dropped.
    let request = shim.recv().await;
    let id = request["id"].as_u64().unwrap();
    shim.send(json!({ "type": "eval_response", "id": id, "result": "late", "ts": 0 })).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(channel.is_ready(), "late response must not wedge the channel");
}

#[tokio::test]
async fn evaluate_before_ready_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (channel, _app) = channel(&dir);
    let err = channel.evaluate("1", Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, InjectError::NotReady));
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let (channel, app, mut shim) = ready_channel(&dir).await;
    shim.stream.get_mut().write_all(b"this is not json\n").await.unwrap();
    shim.send(json!({
        "type": "log",
        "data": { "level": "warn", "message": "after garbage" },
        "ts": 0,
    }))
    .await;

    tokio::time::timeout(Duration::from_secs(2), async {
        while app.search_logs("after garbage").is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(channel.is_ready());
}

#[tokio::test]
async fn query_state_returns_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let (channel, _app, mut shim) = ready_channel(&dir).await;

    let query = tokio::spawn(async move { channel.query_state().await });
    let request = shim.recv().await;
    assert_eq!(request["type"], "query_state");
    let id = request["id"].as_u64().unwrap();
    shim.send(json!({
        "type": "state_response",
        "id": id,
        "state": { "counter": 7 },
        "ts": 0,
    }))
    .await;

    let state = query.await.unwrap().unwrap();
    assert_eq!(state.get("counter"), Some(&Value::from(7)));
}
