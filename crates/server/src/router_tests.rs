// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn request(method: &str, path: &str) -> Request {
    Request { method: method.into(), path: path.into(), ..Default::default() }
}

async fn body_of(outcome: Outcome) -> (u16, serde_json::Value) {
    match outcome {
        Outcome::Response(response) => {
            let value = serde_json::from_slice(&response.body).unwrap_or(serde_json::Value::Null);
            (response.status, value)
        }
        Outcome::Stream(_) => panic!("expected a plain response"),
    }
}

#[tokio::test]
async fn literal_and_param_routes_dispatch() {
    let mut router = Router::new();
    router.add("GET", "/health", |_| async { Response::json(200, &json!({ "status": "ok" })) });
    router.add("GET", "/sandboxes/:id", |req: Request| async move {
        Response::json(200, &json!({ "id": req.param("id") }))
    });

    let (status, body) = body_of(router.dispatch(request("GET", "/health")).await).await;
    assert_eq!((status, body["status"].as_str()), (200, Some("ok")));

    let (status, body) =
        body_of(router.dispatch(request("GET", "/sandboxes/workflow-test")).await).await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], "workflow-test");
}

#[tokio::test]
async fn wildcard_captures_the_rest_of_the_path() {
    let mut router = Router::new();
    router.add("GET", "/sandboxes/:id/files/*", |req: Request| async move {
        Response::json(
            200,
            &json!({ "id": req.param("id"), "path": req.param("wildcard") }),
        )
    });
    let (_, body) = body_of(
        router.dispatch(request("GET", "/sandboxes/a/files/app/main.js")).await,
    )
    .await;
    assert_eq!(body["path"], "app/main.js");
}

#[tokio::test]
async fn unmatched_method_and_path_are_404() {
    let mut router = Router::new();
    router.add("POST", "/things", |_| async { Response::no_content() });
    let (status, body) = body_of(router.dispatch(request("GET", "/things")).await).await;
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("/things"));
}

#[tokio::test]
async fn options_short_circuits_to_204() {
    let router = Router::new();
    match router.dispatch(request("OPTIONS", "/anything")).await {
        Outcome::Response(response) => assert_eq!(response.status, 204),
        Outcome::Stream(_) => panic!("unexpected stream"),
    }
}

#[tokio::test]
async fn star_method_matches_all() {
    let mut router = Router::new();
    router.add("*", "/any", |req: Request| async move {
        Response::json(200, &json!({ "method": req.method }))
    });
    let (_, body) = body_of(router.dispatch(request("DELETE", "/any")).await).await;
    assert_eq!(body["method"], "DELETE");
}

async fn raw_request(port: u16, raw: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn serve_binds_and_answers_over_tcp() {
    let mut router = Router::new();
    router.add("GET", "/health", |_| async { Response::json(200, &json!({ "status": "ok" })) });
    let (port, _task) = Arc::new(router).serve("127.0.0.1", 0).await.unwrap();

    let response = raw_request(port, "GET /health HTTP/1.1\r\nHost: x\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.contains("{\"status\":\"ok\"}"));
    assert!(response.contains("Access-Control-Allow-Origin: *"));
}

#[tokio::test]
async fn serve_retries_past_a_taken_port() {
    let taken = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let start = taken.local_addr().unwrap().port();

    let (port, _task) = Arc::new(Router::new()).serve("127.0.0.1", start).await.unwrap();
    assert!(port > start, "bound {port} after occupied {start}");
}

#[tokio::test]
async fn auth_gate_rejects_and_accepts() {
    let mut router = Router::new();
    router.add("GET", "/api/thing", |_| async { Response::json(200, &json!({ "ok": true })) });
    router.add("GET", "/api/health", |_| async { Response::json(200, &json!({ "ok": true })) });
    let router = router.with_auth(AuthConfig {
        api_key: Some("sekrit".into()),
        additional_keys: Vec::new(),
        public_paths: vec!["/api/health".into()],
    });
    let (port, _task) = Arc::new(router).serve("127.0.0.1", 0).await.unwrap();

    let denied = raw_request(port, "GET /api/thing HTTP/1.1\r\n\r\n").await;
    assert!(denied.starts_with("HTTP/1.1 401"));
    assert!(!denied.contains("sekrit"), "the key never appears in output");

    let allowed =
        raw_request(port, "GET /api/thing HTTP/1.1\r\nX-API-Key: sekrit\r\n\r\n").await;
    assert!(allowed.starts_with("HTTP/1.1 200"));

    let public = raw_request(port, "GET /api/health HTTP/1.1\r\n\r\n").await;
    assert!(public.starts_with("HTTP/1.1 200"), "public paths bypass auth");
}

#[tokio::test]
async fn rate_limit_gate_returns_429_with_headers() {
    let mut router = Router::new();
    router.add("GET", "/api/thing", |_| async { Response::json(200, &json!({ "ok": true })) });
    let router = router
        .with_auth(AuthConfig {
            api_key: Some("k".into()),
            additional_keys: Vec::new(),
            public_paths: Vec::new(),
        })
        .with_rate_limit(3, 60_000);
    let (port, _task) = Arc::new(router).serve("127.0.0.1", 0).await.unwrap();

    for _ in 0..3 {
        let ok = raw_request(port, "GET /api/thing HTTP/1.1\r\nX-API-Key: k\r\n\r\n").await;
        assert!(ok.starts_with("HTTP/1.1 200"), "{ok}");
    }
    let limited = raw_request(port, "GET /api/thing HTTP/1.1\r\nX-API-Key: k\r\n\r\n").await;
    assert!(limited.starts_with("HTTP/1.1 429"));
    assert!(limited.contains("X-RateLimit-Remaining: 0"));
    assert!(limited.contains("Retry-After:"));
}

#[tokio::test]
async fn sse_outcome_pipes_frames() {
    let mut router = Router::new();
    router.add("POST", "/chat", |_| async {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx.send("data: {\"type\":\"text\",\"content\":\"hi\"}\n\n".to_string()).await;
            let _ = tx.send("data: {\"type\":\"done\"}\n\n".to_string()).await;
        });
        Outcome::Stream(rx)
    });
    let (port, _task) = Arc::new(router).serve("127.0.0.1", 0).await.unwrap();

    let response = raw_request(port, "POST /chat HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await;
    assert!(response.contains("Content-Type: text/event-stream"));
    assert!(response.contains("Cache-Control: no-cache"));
    assert!(response.contains("data: {\"type\":\"text\",\"content\":\"hi\"}\n\n"));
    assert!(response.ends_with("data: {\"type\":\"done\"}\n\n"));
}
