// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI tools: everything the agent can do to a locally supervised target,
//! gated by capabilities.

use super::{input_str, input_u64, require_str, Tool, ToolPlane, ToolResult};
use reflexive_core::LogType;
use reflexive_process::ProcessManager;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

macro_rules! manager_tool {
    ($tools:expr, $manager:expr, $name:literal, $desc:literal, $schema:expr, $body:expr) => {{
        let manager = Arc::clone($manager);
        let body = $body;
        $tools.push(Tool::new($name, $desc, $schema, move |input| {
            body(Arc::clone(&manager), input)
        }));
    }};
}

/// Build the process plane for one target. Tools whose capability is off
/// are not registered; registered handlers still re-check at entry.
pub fn process_tools(manager: &Arc<ProcessManager>) -> ToolPlane {
    let caps = manager.capabilities();
    let mut tools: Vec<Tool> = Vec::new();

    manager_tool!(
        tools,
        manager,
        "get_process_state",
        "Get the target process state (pid, uptime, debugger, injection)",
        json!({ "type": "object", "properties": {} }),
        |manager: Arc<ProcessManager>, _input: Value| async move { ToolResult::json(&manager.state()) }
    );

    manager_tool!(
        tools,
        manager,
        "get_output_logs",
        "Get recent target output, optionally filtered by type",
        json!({
            "type": "object",
            "properties": {
                "count": { "type": "number" },
                "type": { "type": "string" },
            },
        }),
        |manager: Arc<ProcessManager>, input: Value| async move {
            let count = input_u64(&input, "count").unwrap_or(50) as usize;
            let filter = input_str(&input, "type").map(|t| LogType::parse(&t));
            ToolResult::json(&manager.app().logs(Some(count), filter.as_ref()))
        }
    );

    manager_tool!(
        tools,
        manager,
        "search_logs",
        "Case-insensitive substring search over target output",
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"],
        }),
        |manager: Arc<ProcessManager>, input: Value| async move {
            match require_str(&input, "query") {
                Ok(query) => ToolResult::json(&manager.app().search_logs(&query)),
                Err(e) => e,
            }
        }
    );

    manager_tool!(
        tools,
        manager,
        "send_input",
        "Write a line to the target's stdin",
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"],
        }),
        |manager: Arc<ProcessManager>, input: Value| async move {
            let text = match require_str(&input, "text") {
                Ok(text) => text,
                Err(e) => return e,
            };
            match manager.send(&text) {
                Ok(()) => ToolResult::text("input sent"),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    if caps.restart {
        manager_tool!(
            tools,
            manager,
            "restart_process",
            "Gracefully restart the target (logs and breakpoints survive)",
            json!({ "type": "object", "properties": {} }),
            |manager: Arc<ProcessManager>, _input: Value| async move {
                if !manager.capabilities().restart {
                    return ToolResult::error("restart capability is disabled");
                }
                match manager.restart().await {
                    Ok(()) => ToolResult::text("process restarted"),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        );

        manager_tool!(
            tools,
            manager,
            "stop_process",
            "Stop the target (SIGTERM, then SIGKILL after a grace period)",
            json!({ "type": "object", "properties": {} }),
            |manager: Arc<ProcessManager>, _input: Value| async move {
                match manager.stop().await {
                    Ok(()) => ToolResult::text("process stopped"),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        );

        manager_tool!(
            tools,
            manager,
            "start_process",
            "Start the target if it is not running",
            json!({ "type": "object", "properties": {} }),
            |manager: Arc<ProcessManager>, _input: Value| async move {
                match manager.start().await {
                    Ok(()) => ToolResult::text("process started"),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        );
    }

    if caps.inject {
        manager_tool!(
            tools,
            manager,
            "get_injected_state",
            "Read the custom state reported by the injected shim",
            json!({ "type": "object", "properties": {} }),
            |manager: Arc<ProcessManager>, _input: Value| async move {
                match manager.injected_state().await {
                    Ok(state) => ToolResult::json(&state),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        );

        manager_tool!(
            tools,
            manager,
            "get_injection_logs",
            "Get log entries reported through the injected channel",
            json!({ "type": "object", "properties": { "count": { "type": "number" } } }),
            |manager: Arc<ProcessManager>, input: Value| async move {
                let count = input_u64(&input, "count").unwrap_or(50) as usize;
                let entries: Vec<_> = manager
                    .app()
                    .logs(None, None)
                    .into_iter()
                    .filter(|e| matches!(e.entry_type, LogType::Inject(_)))
                    .collect();
                let take = count.min(entries.len());
                ToolResult::json(&entries[entries.len() - take..])
            }
        );
    }

    if caps.eval {
        manager_tool!(
            tools,
            manager,
            "evaluate_in_app",
            "Evaluate an expression inside the target's VM",
            json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string" },
                    "timeout": { "type": "number", "description": "Milliseconds (default 10000)" },
                },
                "required": ["code"],
            }),
            |manager: Arc<ProcessManager>, input: Value| async move {
                if !manager.capabilities().eval {
                    return ToolResult::error("eval capability is disabled");
                }
                let code = match require_str(&input, "code") {
                    Ok(code) => code,
                    Err(e) => return e,
                };
                let timeout = input_u64(&input, "timeout").map(Duration::from_millis);
                match manager.evaluate_in_app(&code, timeout).await {
                    Ok(result) => ToolResult::json(&result),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        );

        manager_tool!(
            tools,
            manager,
            "list_app_globals",
            "List global bindings visible inside the target",
            json!({ "type": "object", "properties": {} }),
            |manager: Arc<ProcessManager>, _input: Value| async move {
                match manager
                    .evaluate_in_app("Object.getOwnPropertyNames(globalThis)", None)
                    .await
                {
                    Ok(result) => ToolResult::json(&result),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        );
    }

    if caps.debug {
        debug_tools(&mut tools, manager);
    }

    ToolPlane::new(tools)
}

fn debug_tools(tools: &mut Vec<Tool>, manager: &Arc<ProcessManager>) {
    manager_tool!(
        tools,
        manager,
        "debug_set_breakpoint",
        "Set a breakpoint; an optional prompt is fed to chat when it hits",
        json!({
            "type": "object",
            "properties": {
                "file": { "type": "string" },
                "line": { "type": "number" },
                "condition": { "type": "string" },
                "prompt": { "type": "string" },
            },
            "required": ["file", "line"],
        }),
        |manager: Arc<ProcessManager>, input: Value| async move {
            if !manager.capabilities().debug {
                return ToolResult::error("debug capability is disabled");
            }
            let file = match require_str(&input, "file") {
                Ok(file) => file,
                Err(e) => return e,
            };
            let Some(line) = input_u64(&input, "line") else {
                return ToolResult::error("missing required field: line");
            };
            let condition = input_str(&input, "condition");
            let prompt = input_str(&input, "prompt");
            match manager.debugger().set_breakpoint(&file, line as u32, condition, prompt).await
            {
                Ok(bp) => ToolResult::json(&bp),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    manager_tool!(
        tools,
        manager,
        "debug_remove_breakpoint",
        "Remove a breakpoint by id",
        json!({
            "type": "object",
            "properties": { "id": { "type": "string" } },
            "required": ["id"],
        }),
        |manager: Arc<ProcessManager>, input: Value| async move {
            let id = match require_str(&input, "id") {
                Ok(id) => id,
                Err(e) => return e,
            };
            match manager.debugger().remove_breakpoint(&id).await {
                Ok(()) => ToolResult::text(format!("removed {id}")),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    manager_tool!(
        tools,
        manager,
        "debug_list_breakpoints",
        "List registered breakpoints",
        json!({ "type": "object", "properties": {} }),
        |manager: Arc<ProcessManager>, _input: Value| async move { ToolResult::json(&manager.debugger().list_breakpoints()) }
    );

    for (name, desc) in [
        ("debug_resume", "Resume the paused debuggee"),
        ("debug_pause", "Pause the debuggee"),
        ("debug_step_over", "Step over the current line"),
        ("debug_step_into", "Step into the current call"),
        ("debug_step_out", "Step out of the current frame"),
    ] {
        let manager = Arc::clone(manager);
        tools.push(Tool::new(
            name,
            desc,
            json!({ "type": "object", "properties": {} }),
            move |_input| {
                let manager = Arc::clone(&manager);
                async move {
                    let debugger = manager.debugger();
                    let result = match name {
                        "debug_resume" => debugger.resume().await,
                        "debug_pause" => debugger.pause().await,
                        "debug_step_over" => debugger.step_over().await,
                        "debug_step_into" => debugger.step_into().await,
                        _ => debugger.step_out().await,
                    };
                    match result {
                        Ok(()) => ToolResult::text("ok"),
                        Err(e) => ToolResult::error(e.to_string()),
                    }
                }
            },
        ));
    }

    manager_tool!(
        tools,
        manager,
        "debug_get_call_stack",
        "Call stack of the paused debuggee (null when running)",
        json!({ "type": "object", "properties": {} }),
        |manager: Arc<ProcessManager>, _input: Value| async move { ToolResult::json(&manager.debugger().call_stack()) }
    );

    manager_tool!(
        tools,
        manager,
        "debug_evaluate",
        "Evaluate an expression, optionally scoped to a paused frame",
        json!({
            "type": "object",
            "properties": {
                "expression": { "type": "string" },
                "frameId": { "type": "string" },
            },
            "required": ["expression"],
        }),
        |manager: Arc<ProcessManager>, input: Value| async move {
            let expression = match require_str(&input, "expression") {
                Ok(expression) => expression,
                Err(e) => return e,
            };
            let frame_id = input_str(&input, "frameId");
            match manager.debugger().evaluate(&expression, frame_id.as_deref(), None).await {
                Ok(result) => ToolResult::json(&result),
                Err(e) => ToolResult::error(e.to_string()),
            }
        }
    );

    manager_tool!(
        tools,
        manager,
        "debug_get_scope_variables",
        "Scopes and their variables for a paused frame",
        json!({
            "type": "object",
            "properties": { "frameId": { "type": "string" } },
            "required": ["frameId"],
        }),
        |manager: Arc<ProcessManager>, input: Value| async move {
            let frame_id = match require_str(&input, "frameId") {
                Ok(frame_id) => frame_id,
                Err(e) => return e,
            };
            let debugger = manager.debugger();
            let scopes = match debugger.scopes(&frame_id).await {
                Ok(scopes) => scopes,
                Err(e) => return ToolResult::error(e.to_string()),
            };
            let mut out = Vec::new();
            for scope in scopes {
                let variables = if scope.variables_reference > 0 {
                    debugger.variables(scope.variables_reference).await.unwrap_or_default()
                } else {
                    Vec::new()
                };
                out.push(json!({ "scope": scope, "variables": variables }));
            }
            ToolResult::json(&out)
        }
    );

    manager_tool!(
        tools,
        manager,
        "debug_get_state",
        "Debugger connection/pause state, breakpoints, call stack",
        json!({ "type": "object", "properties": {} }),
        |manager: Arc<ProcessManager>, _input: Value| async move { ToolResult::json(&manager.debugger().state()) }
    );
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
