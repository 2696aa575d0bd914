// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST surface for hosted/sandbox mode, mounted under the API base.

use crate::http::{Request, Response};
use crate::router::{Outcome, Router};
use reflexive_chat::tools::hosted::hosted_tools;
use reflexive_chat::{context, sse_frame, ChatOptions, ChatStream};
use reflexive_core::{Capabilities, SandboxConfig};
use reflexive_sandbox::manager::{FileUpload, SandboxError};
use reflexive_sandbox::MultiSandboxManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Map sandbox-layer errors onto status codes. This is the only place
/// that mapping happens.
fn error_response(error: &SandboxError) -> Response {
    let status = match error {
        SandboxError::UnknownSandbox(_) | SandboxError::UnknownSnapshot(_) => 404,
        SandboxError::AlreadyCreated(_)
        | SandboxError::NotCreated
        | SandboxError::NotRunning
        | SandboxError::NoEntry
        | SandboxError::DuplicateId(_)
        | SandboxError::LimitReached(_) => 400,
        SandboxError::Provider(_) | SandboxError::Storage(_) => 500,
    };
    Response::error(status, error.to_string())
}

fn bad_json() -> Response {
    Response::error(400, "Invalid JSON body")
}

/// Shared context for the API handlers.
pub struct ApiCtx {
    pub pool: Arc<MultiSandboxManager>,
    pub chat: Option<Arc<ChatStream>>,
    pub capabilities: Capabilities,
}

/// Build the hosted REST router (§ endpoints under `base`, default
/// `/api`).
pub fn api_router(ctx: Arc<ApiCtx>, base: &str) -> Router {
    let mut router = Router::new();
    let base = base.trim_end_matches('/').to_string();
    let at = |suffix: &str| format!("{base}{suffix}");

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", &at("/health"), move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                Response::json(
                    200,
                    &json!({
                        "status": "ok",
                        "sandboxes": ctx.pool.count(),
                        "running": ctx.pool.running_count(),
                    }),
                )
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", &at("/sandboxes"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let Ok(body) = req.json() else { return bad_json() };
                let Some(id) = body.get("id").and_then(Value::as_str) else {
                    return Response::error(400, "missing required field: id");
                };
                let config: SandboxConfig = body
                    .get("config")
                    .cloned()
                    .and_then(|c| serde_json::from_value(c).ok())
                    .unwrap_or_default();
                match ctx.pool.create(id, config).await {
                    Ok(instance) => Response::json(201, &instance),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", &at("/sandboxes"), move |_| {
            let ctx = Arc::clone(&ctx);
            async move { Response::json(200, &json!({ "sandboxes": ctx.pool.list() })) }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", &at("/sandboxes/:id"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default();
                match ctx.pool.get(id).and_then(|m| m.instance()) {
                    Some(instance) => Response::json(200, &instance),
                    None => Response::error(404, format!("unknown sandbox: {id}")),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", &at("/sandboxes/:id/start"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                let Ok(body) = req.json() else { return bad_json() };
                let Some(entry) = body.get("entryFile").and_then(Value::as_str) else {
                    return Response::error(400, "missing required field: entryFile");
                };
                let args: Vec<String> = body
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default();
                match ctx.pool.start(&id, entry, &args).await {
                    Ok(()) => Response::json(200, &json!({ "status": "started" })),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", &at("/sandboxes/:id/stop"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                match ctx.pool.stop(&id).await {
                    Ok(()) => Response::json(200, &json!({ "status": "stopped" })),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("DELETE", &at("/sandboxes/:id"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                match ctx.pool.destroy(&id).await {
                    Ok(()) => Response::json(200, &json!({ "status": "destroyed" })),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", &at("/sandboxes/:id/snapshot"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                let Ok(body) = req.json() else { return bad_json() };
                let files: Vec<String> = body
                    .get("files")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default();
                match ctx.pool.snapshot(&id, &files).await {
                    Ok(snapshot) => {
                        Response::json(201, &json!({ "snapshotId": snapshot.id }))
                    }
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", &at("/snapshots"), move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                match ctx.pool.list_snapshots().await {
                    Ok(snapshots) => Response::json(200, &json!({ "snapshots": snapshots })),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", &at("/snapshots/:id"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                match ctx.pool.get_snapshot(&id).await {
                    Ok(Some(snapshot)) => Response::json(200, &snapshot),
                    Ok(None) => Response::error(404, format!("unknown snapshot: {id}")),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", &at("/snapshots/:id/resume"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                let Ok(body) = req.json() else { return bad_json() };
                let new_id =
                    body.get("newId").and_then(Value::as_str).map(String::from);
                match ctx.pool.resume(&id, new_id).await {
                    Ok(instance) => Response::json(201, &instance),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("DELETE", &at("/snapshots/:id"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                match ctx.pool.delete_snapshot(&id).await {
                    Ok(true) => Response::json(200, &json!({ "status": "deleted" })),
                    Ok(false) => Response::error(404, format!("unknown snapshot: {id}")),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", &at("/sandboxes/:id/logs"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                let count = req.query_param("count").and_then(|c| c.parse().ok());
                let query = req.query_param("query").map(String::from);
                match ctx.pool.logs(&id, count, query.as_deref()) {
                    Ok(logs) => Response::json(200, &json!({ "logs": logs })),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", &at("/sandboxes/:id/state"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                let key = req.query_param("key").map(String::from);
                match ctx.pool.custom_state(&id, key.as_deref()) {
                    Ok(state) => Response::json(200, &json!({ "state": state })),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", &at("/sandboxes/:id/files/*"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                let path = format!("/{}", req.param("wildcard").unwrap_or_default());
                match ctx.pool.read_file(&id, &path).await {
                    Ok(bytes) => Response::json(
                        200,
                        &json!({ "path": path, "content": String::from_utf8_lossy(&bytes) }),
                    ),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("PUT", &at("/sandboxes/:id/files/*"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                let path = format!("/{}", req.param("wildcard").unwrap_or_default());
                let Ok(body) = req.json() else { return bad_json() };
                let Some(content) = body.get("content").and_then(Value::as_str) else {
                    return Response::error(400, "missing required field: content");
                };
                let upload = FileUpload { path: path.clone(), content: content.to_string() };
                match ctx.pool.upload_files(&id, &[upload]).await {
                    Ok(()) => Response::json(200, &json!({ "status": "written", "path": path })),
                    Err(e) => error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", &at("/sandboxes/:id/chat"), move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move { chat_outcome(ctx, req).await }
        });
    }

    router
}

/// Run one chat turn against a sandbox and return the SSE stream.
async fn chat_outcome(ctx: Arc<ApiCtx>, req: Request) -> Outcome {
    let id = req.param("id").unwrap_or_default().to_string();
    let Some(manager) = ctx.pool.get(&id) else {
        return Outcome::Response(Response::error(404, format!("unknown sandbox: {id}")));
    };
    let Ok(body) = req.json() else { return Outcome::Response(bad_json()) };
    let Some(message) = body.get("message").and_then(Value::as_str) else {
        return Outcome::Response(Response::error(400, "missing required field: message"));
    };
    let Some(chat) = ctx.chat.clone() else {
        return Outcome::Response(Response::error(501, "chat is not configured"));
    };

    let cancel = CancellationToken::new();
    let plane = Arc::new(hosted_tools(&ctx.pool, ctx.capabilities));
    let options = ChatOptions {
        context: Some(context::build_context(manager.app(), None)),
        plane: Some(plane),
        cancel: cancel.clone(),
        ..Default::default()
    };

    let events = match chat.run(message, options).await {
        Ok(events) => events,
        Err(e) => return Outcome::Response(Response::error(500, e.to_string())),
    };

    let (tx, rx) = mpsc::channel::<String>(64);
    tokio::spawn(async move {
        let mut events = events;
        while let Some(event) = events.recv().await {
            if tx.send(sse_frame(&event)).await.is_err() {
                // Client disconnected: abort the upstream query.
                cancel.cancel();
                break;
            }
        }
    });
    Outcome::Stream(rx)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
