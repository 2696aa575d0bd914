// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Library tools: in-process observation of one [`AppState`].

use super::{input_str, input_u64, require_str, Tool, ToolPlane, ToolResult};
use reflexive_core::{AppState, LogType};
use serde_json::{json, Value};

/// The always-available library plane: status, logs, custom state.
pub fn library_tools(app: AppState) -> ToolPlane {
    let mut tools = Vec::new();

    {
        let app = app.clone();
        tools.push(Tool::new(
            "get_app_status",
            "Get the app's uptime, log count, and state key count",
            json!({ "type": "object", "properties": {} }),
            move |_| {
                let app = app.clone();
                async move { ToolResult::json(&app.status()) }
            },
        ));
    }

    {
        let app = app.clone();
        tools.push(Tool::new(
            "get_logs",
            "Get recent log entries, optionally filtered by type",
            json!({
                "type": "object",
                "properties": {
                    "count": { "type": "number", "description": "How many entries (default 50)" },
                    "type": { "type": "string", "description": "Filter: info|warn|error|stdout|stderr|system" },
                },
            }),
            move |input| {
                let app = app.clone();
                async move {
                    let count = input_u64(&input, "count").unwrap_or(50) as usize;
                    let filter = input_str(&input, "type").map(|t| LogType::parse(&t));
                    ToolResult::json(&app.logs(Some(count), filter.as_ref()))
                }
            },
        ));
    }

    {
        let app = app.clone();
        tools.push(Tool::new(
            "search_logs",
            "Case-insensitive substring search over log messages",
            json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"],
            }),
            move |input| {
                let app = app.clone();
                async move {
                    match require_str(&input, "query") {
                        Ok(query) => ToolResult::json(&app.search_logs(&query)),
                        Err(e) => e,
                    }
                }
            },
        ));
    }

    {
        let app = app.clone();
        tools.push(Tool::new(
            "get_custom_state",
            "Read one custom state key, or the whole map",
            json!({
                "type": "object",
                "properties": { "key": { "type": "string" } },
            }),
            move |input| {
                let app = app.clone();
                async move {
                    match input_str(&input, "key") {
                        Some(key) => {
                            ToolResult::json(&app.get_state(&key).unwrap_or(Value::Null))
                        }
                        None => ToolResult::json(&app.state_snapshot()),
                    }
                }
            },
        ));
    }

    {
        let app = app.clone();
        tools.push(Tool::new(
            "set_custom_state",
            "Write a custom state key",
            json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string" },
                    "value": {},
                },
                "required": ["key", "value"],
            }),
            move |input| {
                let app = app.clone();
                async move {
                    let key = match require_str(&input, "key") {
                        Ok(key) => key,
                        Err(e) => return e,
                    };
                    let Some(value) = input.get("value").cloned() else {
                        return ToolResult::error("missing required field: value");
                    };
                    app.set_state(&key, value);
                    ToolResult::text(format!("set {key}"))
                }
            },
        ));
    }

    ToolPlane::new(tools)
}

#[cfg(test)]
#[path = "library_tests.rs"]
mod tests;
