// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor events carried on the [`EventBus`](crate::bus::EventBus).

use crate::debugger::StackFrame;
use crate::log::LogEntry;
use crate::sandbox::SandboxStatus;
use crate::watch::Watch;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events emitted by AppState and the managers.
///
/// One enum for the whole supervisor; subscribers filter by
/// [`Event::name`]. Adapter-internal debug events live in the debug
/// crate and are translated into these before reaching the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// A log entry was appended to the rolling buffer
    Log { entry: LogEntry },

    /// A custom-state key was written
    #[serde(rename_all = "camelCase")]
    StateChange {
        key: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_value: Option<Value>,
    },

    /// A custom-state key was deleted
    StateDelete { key: String },

    /// The log buffer was cleared
    LogsCleared,

    /// An enabled watch matched a log message
    WatchHit { watch: Watch, entry: LogEntry },

    /// Target process spawned
    ProcessStarted { pid: u32 },

    /// Target process exited (normally or not)
    #[serde(rename_all = "camelCase")]
    ProcessExited { exit_code: Option<i32> },

    /// Injected shim connected and reported its environment
    InjectionReady { info: Value },

    /// Uncaught exception / unhandled rejection reported by the shim
    InjectError {
        name: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },

    /// Debugger transport attached
    #[serde(rename_all = "camelCase")]
    DebuggerConnected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inspector_url: Option<String>,
    },

    /// Debugger failed to attach; the target keeps running
    DebuggerFailed { message: String },

    /// Debuggee halted
    #[serde(rename_all = "camelCase")]
    DebuggerPaused {
        reason: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        hit_breakpoint_ids: Vec<String>,
    },

    /// Debuggee resumed
    DebuggerResumed,

    /// A breakpoint with an attached prompt was hit
    #[serde(rename_all = "camelCase")]
    BreakpointPrompt {
        prompt: String,
        file: String,
        line: u32,
        call_stack: Vec<StackFrame>,
    },

    /// A sandbox changed status
    SandboxStatus { id: String, status: SandboxStatus },

    /// Application-defined event forwarded from the shim (`reflexive.emit`)
    Custom { name: String, payload: Value },
}

impl Event {
    /// Wire name, used by subscribers to filter.
    pub fn name(&self) -> &str {
        match self {
            Event::Log { .. } => "log",
            Event::StateChange { .. } => "stateChange",
            Event::StateDelete { .. } => "stateDelete",
            Event::LogsCleared => "logsCleared",
            Event::WatchHit { .. } => "watchHit",
            Event::ProcessStarted { .. } => "processStarted",
            Event::ProcessExited { .. } => "processExited",
            Event::InjectionReady { .. } => "injectionReady",
            Event::InjectError { .. } => "injectError",
            Event::DebuggerConnected { .. } => "debuggerConnected",
            Event::DebuggerFailed { .. } => "debuggerFailed",
            Event::DebuggerPaused { .. } => "debuggerPaused",
            Event::DebuggerResumed => "debuggerResumed",
            Event::BreakpointPrompt { .. } => "breakpointPrompt",
            Event::SandboxStatus { .. } => "sandboxStatus",
            Event::Custom { .. } => "event",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
