// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The uniform debug contract both transports implement.

use async_trait::async_trait;
use reflexive_core::{BreakpointInfo, Scope, StackFrame, Variable};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from a debug transport.
#[derive(Debug, Error)]
pub enum DebugError {
    #[error("not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("debugger reported error: {0}")]
    Protocol(String),

    #[error("unknown breakpoint: {0}")]
    UnknownBreakpoint(String),

    #[error("connection closed")]
    Disconnected,
}

/// How to reach the debuggee.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// Full inspector WebSocket URL when the banner carried one (V8 only).
    pub ws_url: Option<String>,
}

/// Result of installing one breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointResult {
    pub breakpoint_id: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Events pushed up from an adapter.
///
/// `Paused` holds until the next `Resumed`; [`DebugAdapter::is_paused`]
/// reflects exactly that window.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    Paused {
        reason: String,
        hit_breakpoint_ids: Vec<String>,
        thread_id: Option<i64>,
    },
    Resumed,
    Disconnected,
    Output {
        category: String,
        text: String,
        source: Option<String>,
        line: Option<u32>,
    },
    BreakpointResolved {
        id: String,
        line: Option<u32>,
        verified: bool,
    },
}

/// Uniform debug capability set.
///
/// Adapters are shared handles: methods take `&self` and synchronize
/// internally; each socket has a single writer task.
#[async_trait]
pub trait DebugAdapter: Send + Sync {
    // Lifecycle
    async fn connect(&self, opts: ConnectOptions) -> Result<(), DebugError>;
    async fn disconnect(&self) -> Result<(), DebugError>;
    fn is_connected(&self) -> bool;
    async fn initialize(&self) -> Result<(), DebugError>;
    /// Let the debuggee run user code. Breakpoints installed before this
    /// call are guaranteed to be armed first.
    async fn launch(&self, config: Option<Value>) -> Result<(), DebugError>;

    // Breakpoints
    async fn set_breakpoint(
        &self,
        file: &str,
        line: u32,
        condition: Option<&str>,
    ) -> Result<SetBreakpointResult, DebugError>;
    async fn remove_breakpoint(&self, id: &str) -> Result<(), DebugError>;
    async fn list_breakpoints(&self) -> Result<Vec<BreakpointInfo>, DebugError>;

    // Execution
    async fn resume(&self, thread_id: Option<i64>) -> Result<(), DebugError>;
    async fn pause(&self, thread_id: Option<i64>) -> Result<(), DebugError>;
    async fn step_over(&self, thread_id: Option<i64>) -> Result<(), DebugError>;
    async fn step_into(&self, thread_id: Option<i64>) -> Result<(), DebugError>;
    async fn step_out(&self, thread_id: Option<i64>) -> Result<(), DebugError>;

    // Inspection
    /// `Ok(None)` when the debuggee is not paused.
    async fn call_stack(&self, thread_id: Option<i64>)
        -> Result<Option<Vec<StackFrame>>, DebugError>;
    async fn scopes(&self, frame_id: &str) -> Result<Vec<Scope>, DebugError>;
    async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, DebugError>;
    async fn evaluate(
        &self,
        expression: &str,
        frame_id: Option<&str>,
        context: Option<&str>,
    ) -> Result<Value, DebugError>;

    /// True from a `Paused` event until the next `Resumed`.
    fn is_paused(&self) -> bool;

    /// Subscribe to adapter events. Every subscriber gets every event.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<DebugEvent>;
}
