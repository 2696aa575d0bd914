// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context block prepended to every chat turn: target status plus the
//! most recent log messages.

use reflexive_core::AppState;

/// How many recent log messages ride along with each chat message.
const CONTEXT_LOG_COUNT: usize = 10;

/// Default system prompt for the agent.
pub const SYSTEM_PROMPT: &str = "You are an agent supervising a running application. \
You can observe its logs, state, and process status through tools, and, when the \
corresponding capabilities are enabled, restart it, evaluate code inside it, and \
drive its debugger. Prefer observing before mutating. Report findings concisely.";

/// Render the context summary for one chat turn.
pub fn build_context(app: &AppState, extra_status: Option<&serde_json::Value>) -> String {
    let status = app.status();
    let mut out = String::from("## Current app status\n");
    out.push_str(&serde_json::to_string(&status).unwrap_or_else(|_| "{}".to_string()));
    if let Some(extra) = extra_status {
        out.push_str("\n\n## Process\n");
        out.push_str(&extra.to_string());
    }

    out.push_str("\n\n## Recent logs\n");
    let logs = app.logs(Some(CONTEXT_LOG_COUNT), None);
    if logs.is_empty() {
        out.push_str("(no logs yet)\n");
    } else {
        for entry in logs {
            out.push_str(&format!("- [{}] {}\n", entry.entry_type, entry.message));
        }
    }
    out
}
