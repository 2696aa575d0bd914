// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hosted tools: sandbox-scoped operations plus snapshot/resume, bound to
//! a [`MultiSandboxManager`].

use super::{input_str, input_u64, require_str, Tool, ToolPlane, ToolResult};
use reflexive_core::{Capabilities, SandboxConfig};
use reflexive_sandbox::manager::FileUpload;
use reflexive_sandbox::MultiSandboxManager;
use serde_json::{json, Value};
use std::sync::Arc;

macro_rules! pool_tool {
    ($tools:expr, $pool:expr, $name:literal, $desc:literal, $schema:expr, $body:expr) => {{
        let pool = Arc::clone($pool);
        let body = $body;
        $tools.push(Tool::new($name, $desc, $schema, move |input| {
            body(Arc::clone(&pool), input)
        }));
    }};
}

/// Build the hosted plane. File writes require `write_files`; command
/// execution requires `shell_access`.
pub fn hosted_tools(pool: &Arc<MultiSandboxManager>, caps: Capabilities) -> ToolPlane {
    let mut tools: Vec<Tool> = Vec::new();

    pool_tool!(
        tools,
        pool,
        "list_sandboxes",
        "List sandbox instances and their statuses",
        json!({ "type": "object", "properties": {} }),
        |pool: Arc<MultiSandboxManager>, _input: Value| async move { ToolResult::json(&pool.list()) }
    );

    pool_tool!(
        tools,
        pool,
        "create_sandbox",
        "Create a sandbox under a unique id",
        json!({
            "type": "object",
            "properties": { "id": { "type": "string" }, "config": { "type": "object" } },
            "required": ["id"],
        }),
        |pool: Arc<MultiSandboxManager>, input: Value| async move {
            let id = match require_str(&input, "id") {
                Ok(id) => id,
                Err(e) => return e,
            };
            let config: SandboxConfig = input
                .get("config")
                .cloned()
                .and_then(|c| serde_json::from_value(c).ok())
                .unwrap_or_default();
            match pool.create(&id, config).await {
                Ok(instance) => ToolResult::json(&instance),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    pool_tool!(
        tools,
        pool,
        "start_sandbox",
        "Start a sandbox's target with the inject shim preloaded",
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "entryFile": { "type": "string" },
                "args": { "type": "array", "items": { "type": "string" } },
            },
            "required": ["id", "entryFile"],
        }),
        |pool: Arc<MultiSandboxManager>, input: Value| async move {
            let id = match require_str(&input, "id") {
                Ok(id) => id,
                Err(e) => return e,
            };
            let entry = match require_str(&input, "entryFile") {
                Ok(entry) => entry,
                Err(e) => return e,
            };
            let args: Vec<String> = input
                .get("args")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default();
            match pool.start(&id, &entry, &args).await {
                Ok(()) => ToolResult::text(format!("started {id}")),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    pool_tool!(
        tools,
        pool,
        "stop_sandbox",
        "Stop a sandbox's target",
        json!({
            "type": "object",
            "properties": { "id": { "type": "string" } },
            "required": ["id"],
        }),
        |pool: Arc<MultiSandboxManager>, input: Value| async move {
            let id = match require_str(&input, "id") {
                Ok(id) => id,
                Err(e) => return e,
            };
            match pool.stop(&id).await {
                Ok(()) => ToolResult::text(format!("stopped {id}")),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    pool_tool!(
        tools,
        pool,
        "destroy_sandbox",
        "Destroy a sandbox and free its slot",
        json!({
            "type": "object",
            "properties": { "id": { "type": "string" } },
            "required": ["id"],
        }),
        |pool: Arc<MultiSandboxManager>, input: Value| async move {
            let id = match require_str(&input, "id") {
                Ok(id) => id,
                Err(e) => return e,
            };
            match pool.destroy(&id).await {
                Ok(()) => ToolResult::text(format!("destroyed {id}")),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    pool_tool!(
        tools,
        pool,
        "get_sandbox_logs",
        "Recent logs for one sandbox, optionally filtered by substring",
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "count": { "type": "number" },
                "query": { "type": "string" },
            },
            "required": ["id"],
        }),
        |pool: Arc<MultiSandboxManager>, input: Value| async move {
            let id = match require_str(&input, "id") {
                Ok(id) => id,
                Err(e) => return e,
            };
            let count = input_u64(&input, "count").map(|c| c as usize);
            let query = input_str(&input, "query");
            match pool.logs(&id, count, query.as_deref()) {
                Ok(logs) => ToolResult::json(&logs),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    pool_tool!(
        tools,
        pool,
        "get_sandbox_state",
        "Custom state reported by a sandbox's shim",
        json!({
            "type": "object",
            "properties": { "id": { "type": "string" }, "key": { "type": "string" } },
            "required": ["id"],
        }),
        |pool: Arc<MultiSandboxManager>, input: Value| async move {
            let id = match require_str(&input, "id") {
                Ok(id) => id,
                Err(e) => return e,
            };
            let key = input_str(&input, "key");
            match pool.custom_state(&id, key.as_deref()) {
                Ok(state) => ToolResult::json(&state),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    if caps.read_files {
        pool_tool!(
            tools,
            pool,
            "read_sandbox_file",
            "Read a file from a sandbox",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" }, "path": { "type": "string" } },
                "required": ["id", "path"],
            }),
            |pool: Arc<MultiSandboxManager>, input: Value| async move {
                let id = match require_str(&input, "id") {
                    Ok(id) => id,
                    Err(e) => return e,
                };
                let path = match require_str(&input, "path") {
                    Ok(path) => path,
                    Err(e) => return e,
                };
                match pool.read_file(&id, &path).await {
                    Ok(bytes) => ToolResult::text(String::from_utf8_lossy(&bytes).into_owned()),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        );
    }

    if caps.write_files {
        pool_tool!(
            tools,
            pool,
            "write_sandbox_file",
            "Write a file into a sandbox",
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "path": { "type": "string" },
                    "content": { "type": "string" },
                },
                "required": ["id", "path", "content"],
            }),
            |pool: Arc<MultiSandboxManager>, input: Value| async move {
                let id = match require_str(&input, "id") {
                    Ok(id) => id,
                    Err(e) => return e,
                };
                let path = match require_str(&input, "path") {
                    Ok(path) => path,
                    Err(e) => return e,
                };
                let content = match require_str(&input, "content") {
                    Ok(content) => content,
                    Err(e) => return e,
                };
                match pool
                    .upload_files(&id, &[FileUpload { path: path.clone(), content }])
                    .await
                {
                    Ok(()) => ToolResult::text(format!("wrote {path}")),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        );
    }

    if caps.shell_access {
        pool_tool!(
            tools,
            pool,
            "run_sandbox_command",
            "Run a short command inside a sandbox",
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "command": { "type": "string" },
                    "args": { "type": "array", "items": { "type": "string" } },
                },
                "required": ["id", "command"],
            }),
            |pool: Arc<MultiSandboxManager>, input: Value| async move {
                let id = match require_str(&input, "id") {
                    Ok(id) => id,
                    Err(e) => return e,
                };
                let command = match require_str(&input, "command") {
                    Ok(command) => command,
                    Err(e) => return e,
                };
                let args: Vec<String> = input
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default();
                match pool.run_command(&id, &command, &args).await {
                    Ok(output) => ToolResult::json(&json!({
                        "stdout": output.stdout,
                        "stderr": output.stderr,
                        "exitCode": output.exit_code,
                    })),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        );
    }

    pool_tool!(
        tools,
        pool,
        "snapshot_sandbox",
        "Capture a snapshot (selected files + state + recent logs)",
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "files": { "type": "array", "items": { "type": "string" } },
            },
            "required": ["id"],
        }),
        |pool: Arc<MultiSandboxManager>, input: Value| async move {
            let id = match require_str(&input, "id") {
                Ok(id) => id,
                Err(e) => return e,
            };
            let files: Vec<String> = input
                .get("files")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default();
            match pool.snapshot(&id, &files).await {
                Ok(snapshot) => ToolResult::json(&json!({ "snapshotId": snapshot.id })),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    pool_tool!(
        tools,
        pool,
        "resume_snapshot",
        "Seed a new sandbox from a snapshot",
        json!({
            "type": "object",
            "properties": {
                "snapshotId": { "type": "string" },
                "newId": { "type": "string" },
            },
            "required": ["snapshotId"],
        }),
        |pool: Arc<MultiSandboxManager>, input: Value| async move {
            let snapshot_id = match require_str(&input, "snapshotId") {
                Ok(snapshot_id) => snapshot_id,
                Err(e) => return e,
            };
            let new_id = input_str(&input, "newId");
            match pool.resume(&snapshot_id, new_id).await {
                Ok(instance) => ToolResult::json(&json!({ "id": instance.id })),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    pool_tool!(
        tools,
        pool,
        "list_snapshots",
        "List stored snapshots, newest first",
        json!({ "type": "object", "properties": {} }),
        |pool: Arc<MultiSandboxManager>, _input: Value| async move {
            match pool.list_snapshots().await {
                Ok(snapshots) => ToolResult::json(&snapshots),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    pool_tool!(
        tools,
        pool,
        "delete_snapshot",
        "Delete a stored snapshot",
        json!({
            "type": "object",
            "properties": { "snapshotId": { "type": "string" } },
            "required": ["snapshotId"],
        }),
        |pool: Arc<MultiSandboxManager>, input: Value| async move {
            let snapshot_id = match require_str(&input, "snapshotId") {
                Ok(snapshot_id) => snapshot_id,
                Err(e) => return e,
            };
            match pool.delete_snapshot(&snapshot_id).await {
                Ok(true) => ToolResult::text(format!("deleted {snapshot_id}")),
                Ok(false) => ToolResult::error(format!("unknown snapshot: {snapshot_id}")),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    ToolPlane::new(tools)
}

#[cfg(test)]
#[path = "hosted_tests.rs"]
mod tests;
