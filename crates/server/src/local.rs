// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-mode dashboard REST: a 1:1 mirror of the process tool plane.

use crate::http::{Request, Response};
use crate::router::{Outcome, Router};
use parking_lot::Mutex;
use reflexive_chat::tools::process::process_tools;
use reflexive_chat::{context, sse_frame, ChatOptions, ChatStream};
use reflexive_core::LogType;
use reflexive_process::{ProcessError, ProcessManager};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn bad_json() -> Response {
    Response::error(400, "Invalid JSON body")
}

fn process_error_response(error: &ProcessError) -> Response {
    let status = match error {
        ProcessError::AlreadyRunning
        | ProcessError::NotRunning
        | ProcessError::InjectDisabled
        | ProcessError::EvalDisabled
        | ProcessError::UnsupportedEntry(_) => 400,
        _ => 500,
    };
    Response::error(status, error.to_string())
}

/// Shared context for the dashboard handlers.
pub struct LocalCtx {
    pub manager: Arc<ProcessManager>,
    pub chat: Option<Arc<ChatStream>>,
    /// Session continuity across chat turns; cleared by
    /// `/reset-conversation`.
    pub session_id: Mutex<Option<String>>,
    /// Shutdown signal owned by the CLI entry point.
    pub shutdown: CancellationToken,
}

/// Build the local dashboard router.
pub fn local_router(ctx: Arc<LocalCtx>) -> Router {
    let mut router = Router::new();

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", "/state", move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                Response::json(
                    200,
                    &json!({
                        "process": ctx.manager.state(),
                        "capabilities": ctx.manager.capabilities(),
                        "app": ctx.manager.app().status(),
                    }),
                )
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", "/logs", move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let count = req.query_param("count").and_then(|c| c.parse().ok());
                let filter = req.query_param("type").map(LogType::parse);
                Response::json(
                    200,
                    &json!({ "logs": ctx.manager.app().logs(count, filter.as_ref()) }),
                )
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", "/chat", move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move { chat_outcome(ctx, req).await }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", "/reset-conversation", move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                *ctx.session_id.lock() = None;
                Response::json(200, &json!({ "status": "reset" }))
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", "/start", move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                match ctx.manager.start().await {
                    Ok(()) => Response::json(200, &json!({ "status": "started" })),
                    Err(e) => process_error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", "/stop", move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                match ctx.manager.stop().await {
                    Ok(()) => Response::json(200, &json!({ "status": "stopped" })),
                    Err(e) => process_error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", "/restart", move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                match ctx.manager.restart().await {
                    Ok(()) => Response::json(200, &json!({ "status": "restarted" })),
                    Err(e) => process_error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", "/run-app", move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                let result = if ctx.manager.is_running() {
                    ctx.manager.restart().await
                } else {
                    ctx.manager.start().await
                };
                match result {
                    Ok(()) => Response::json(200, &json!({ "status": "running" })),
                    Err(e) => process_error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", "/shutdown", move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                ctx.shutdown.cancel();
                Response::json(200, &json!({ "status": "shutting down" }))
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", "/cli-input", move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let Ok(body) = req.json() else { return bad_json() };
                let Some(text) = body.get("text").and_then(Value::as_str) else {
                    return Response::error(400, "missing required field: text");
                };
                match ctx.manager.send(text) {
                    Ok(()) => Response::json(200, &json!({ "status": "sent" })),
                    Err(e) => process_error_response(&e),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", "/permissions", move |_| {
            let ctx = Arc::clone(&ctx);
            async move { Response::json(200, &json!({ "capabilities": ctx.manager.capabilities() })) }
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("POST", "/permissions", move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let Ok(body) = req.json() else { return bad_json() };
                let mut caps = ctx.manager.capabilities();
                if body.get("dangerouslySkipPermissions").and_then(Value::as_bool)
                    == Some(true)
                {
                    caps = reflexive_core::Capabilities::all();
                } else if let Some(updates) = body.get("capabilities") {
                    let merged = serde_json::to_value(caps)
                        .ok()
                        .and_then(|mut current| {
                            if let (Some(current), Some(updates)) =
                                (current.as_object_mut(), updates.as_object())
                            {
                                for (key, value) in updates {
                                    current.insert(key.clone(), value.clone());
                                }
                            }
                            serde_json::from_value(current).ok()
                        });
                    match merged {
                        Some(merged) => caps = merged,
                        None => return Response::error(400, "invalid capabilities object"),
                    }
                } else {
                    return Response::error(
                        400,
                        "expected capabilities or dangerouslySkipPermissions",
                    );
                }
                ctx.manager.set_capabilities(caps);
                Response::json(
                    200,
                    &json!({ "capabilities": ctx.manager.capabilities() }),
                )
            }
        });
    }

    {
        router.add("POST", "/reload", move |_| async move {
            Response::json(200, &json!({ "status": "reloaded" }))
        });
    }

    {
        let ctx = Arc::clone(&ctx);
        router.add("GET", "/files", move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                if !ctx.manager.capabilities().read_files {
                    return Response::error(403, "readFiles capability is disabled");
                }
                let dir = req.query_param("dir").unwrap_or(".").to_string();
                let base = ctx.manager.state().cwd.join(&dir);
                let mut entries = Vec::new();
                match tokio::fs::read_dir(&base).await {
                    Ok(mut dir_entries) => {
                        while let Ok(Some(entry)) = dir_entries.next_entry().await {
                            let name = entry.file_name().to_string_lossy().into_owned();
                            let is_dir =
                                entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                            entries.push(json!({ "name": name, "dir": is_dir }));
                        }
                        entries.sort_by_key(|e| e["name"].as_str().unwrap_or("").to_string());
                        Response::json(200, &json!({ "dir": dir, "files": entries }))
                    }
                    Err(e) => Response::error(400, format!("cannot list {dir}: {e}")),
                }
            }
        });
    }

    debugger_routes(&mut router, &ctx);
    router
}

fn debugger_routes(router: &mut Router, ctx: &Arc<LocalCtx>) {
    {
        let ctx = Arc::clone(ctx);
        router.add("GET", "/debugger-status", move |_| {
            let ctx = Arc::clone(&ctx);
            async move { Response::json(200, &ctx.manager.debugger().state()) }
        });
    }

    {
        let ctx = Arc::clone(ctx);
        router.add("GET", "/debugger-breakpoints", move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                Response::json(
                    200,
                    &json!({ "breakpoints": ctx.manager.debugger().list_breakpoints() }),
                )
            }
        });
    }

    {
        let ctx = Arc::clone(ctx);
        router.add("POST", "/debugger-breakpoints", move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let Ok(body) = req.json() else { return bad_json() };
                let Some(file) = body.get("file").and_then(Value::as_str) else {
                    return Response::error(400, "missing required field: file");
                };
                let Some(line) = body.get("line").and_then(Value::as_u64) else {
                    return Response::error(400, "missing required field: line");
                };
                let condition =
                    body.get("condition").and_then(Value::as_str).map(String::from);
                let prompt = body.get("prompt").and_then(Value::as_str).map(String::from);
                match ctx
                    .manager
                    .debugger()
                    .set_breakpoint(file, line as u32, condition, prompt)
                    .await
                {
                    Ok(bp) => Response::json(201, &bp),
                    Err(e) => Response::error(400, e.to_string()),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(ctx);
        router.add("PATCH", "/debugger-breakpoint/:id", move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                let Ok(body) = req.json() else { return bad_json() };
                let condition = body
                    .get("condition")
                    .map(|v| v.as_str().map(String::from));
                let prompt = body.get("prompt").map(|v| v.as_str().map(String::from));
                let enabled = body.get("enabled").and_then(Value::as_bool);
                match ctx
                    .manager
                    .debugger()
                    .update_breakpoint(&id, condition, prompt, enabled)
                    .await
                {
                    Ok(bp) => Response::json(200, &bp),
                    Err(e) => Response::error(404, e.to_string()),
                }
            }
        });
    }

    {
        let ctx = Arc::clone(ctx);
        router.add("DELETE", "/debugger-breakpoint/:id", move |req: Request| {
            let ctx = Arc::clone(&ctx);
            async move {
                let id = req.param("id").unwrap_or_default().to_string();
                match ctx.manager.debugger().remove_breakpoint(&id).await {
                    Ok(()) => Response::json(200, &json!({ "status": "removed" })),
                    Err(e) => Response::error(404, e.to_string()),
                }
            }
        });
    }

    for (path, action) in [
        ("/debugger-resume", "resume"),
        ("/debugger-step-over", "step_over"),
        ("/debugger-step-into", "step_into"),
        ("/debugger-step-out", "step_out"),
    ] {
        let ctx = Arc::clone(ctx);
        router.add("POST", path, move |_| {
            let ctx = Arc::clone(&ctx);
            async move {
                let debugger = ctx.manager.debugger();
                let result = match action {
                    "resume" => debugger.resume().await,
                    "step_over" => debugger.step_over().await,
                    "step_into" => debugger.step_into().await,
                    _ => debugger.step_out().await,
                };
                match result {
                    Ok(()) => Response::json(200, &json!({ "status": action })),
                    Err(e) => Response::error(400, e.to_string()),
                }
            }
        });
    }
}

/// Run one chat turn against the local target.
async fn chat_outcome(ctx: Arc<LocalCtx>, req: Request) -> Outcome {
    let Ok(body) = req.json() else { return Outcome::Response(bad_json()) };
    let Some(message) = body.get("message").and_then(Value::as_str) else {
        return Outcome::Response(Response::error(400, "missing required field: message"));
    };
    let Some(chat) = ctx.chat.clone() else {
        return Outcome::Response(Response::error(501, "chat is not configured"));
    };

    let cancel = CancellationToken::new();
    let plane = Arc::new(process_tools(&ctx.manager));
    let process_state = serde_json::to_value(ctx.manager.state()).unwrap_or_default();
    let options = ChatOptions {
        context: Some(context::build_context(ctx.manager.app(), Some(&process_state))),
        session_id: ctx.session_id.lock().clone(),
        plane: Some(plane),
        cancel: cancel.clone(),
        ..Default::default()
    };

    let events = match chat.run(message, options).await {
        Ok(events) => events,
        Err(e) => return Outcome::Response(Response::error(500, e.to_string())),
    };

    let (tx, rx) = mpsc::channel::<String>(64);
    let session_slot = Arc::clone(&ctx);
    tokio::spawn(async move {
        let mut events = events;
        while let Some(event) = events.recv().await {
            if let reflexive_chat::ChatStreamEvent::Session { session_id } = &event {
                *session_slot.session_id.lock() = Some(session_id.clone());
            }
            if tx.send(sse_frame(&event)).await.is_err() {
                cancel.cancel();
                break;
            }
        }
    });
    Outcome::Stream(rx)
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
