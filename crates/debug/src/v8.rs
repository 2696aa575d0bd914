// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket client for the V8 Inspector protocol (Chrome DevTools).
//!
//! Outgoing commands are `{id, method, params}` correlated by `id` against a
//! pending-request table; incoming frames are either responses (have `id`)
//! or events (have `method`). Inspector line numbers are 0-based and are
//! normalized to the 1-based DAP shapes at this boundary.

use crate::adapter::{
    ConnectOptions, DebugAdapter, DebugError, DebugEvent, SetBreakpointResult,
};
use crate::fanout::EventFanout;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reflexive_core::{BreakpointInfo, Scope, StackFrame, Source, Variable};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type PendingMap = HashMap<i64, oneshot::Sender<Result<Value, DebugError>>>;

#[derive(Debug, Clone)]
struct PausedState {
    reason: String,
    hit_breakpoint_ids: Vec<String>,
    /// Raw inspector call frames, newest first.
    call_frames: Vec<Value>,
}

/// Maps DAP-style integer `variablesReference`s to inspector object ids,
/// scoped to one pause.
#[derive(Default)]
struct VarRefs {
    next: i64,
    by_ref: HashMap<i64, String>,
}

impl VarRefs {
    fn allocate(&mut self, object_id: String) -> i64 {
        self.next += 1;
        self.by_ref.insert(self.next, object_id);
        self.next
    }

    fn get(&self, reference: i64) -> Option<&String> {
        self.by_ref.get(&reference)
    }

    fn clear(&mut self) {
        self.by_ref.clear();
    }
}

struct Inner {
    next_id: AtomicI64,
    connected: AtomicBool,
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: Mutex<PendingMap>,
    events: EventFanout,
    paused: Mutex<Option<PausedState>>,
    breakpoints: Mutex<HashMap<String, BreakpointInfo>>,
    var_refs: Mutex<VarRefs>,
    ws_url: Mutex<Option<String>>,
}

/// V8 Inspector adapter. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct V8InspectorAdapter {
    inner: Arc<Inner>,
}

impl Default for V8InspectorAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl V8InspectorAdapter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicI64::new(0),
                connected: AtomicBool::new(false),
                writer: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                events: EventFanout::default(),
                paused: Mutex::new(None),
                breakpoints: Mutex::new(HashMap::new()),
                var_refs: Mutex::new(VarRefs::default()),
                ws_url: Mutex::new(None),
            }),
        }
    }

    /// Inspector WebSocket URL once connected.
    pub fn inspector_url(&self) -> Option<String> {
        self.inner.ws_url.lock().clone()
    }

    async fn send(&self, method: &str, params: Value) -> Result<Value, DebugError> {
        let inner = &self.inner;
        if !inner.connected.load(Ordering::SeqCst) {
            return Err(DebugError::NotConnected);
        }
        let id = inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        inner.pending.lock().insert(id, tx);

        let frame = json!({ "id": id, "method": method, "params": params }).to_string();
        let sent = inner.writer.lock().as_ref().map(|w| w.send(frame).is_ok()).unwrap_or(false);
        if !sent {
            inner.pending.lock().remove(&id);
            return Err(DebugError::NotConnected);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DebugError::Disconnected),
            Err(_) => {
                inner.pending.lock().remove(&id);
                Err(DebugError::Timeout(method.to_string()))
            }
        }
    }
}

/// Reader-task message handling, separated from the socket for testability.
fn handle_message(inner: &Inner, text: &str) {
    let Ok(msg) = serde_json::from_str::<Value>(text) else {
        tracing::warn!("inspector: dropping unparseable frame");
        return;
    };

    if let Some(id) = msg.get("id").and_then(Value::as_i64) {
        let Some(tx) = inner.pending.lock().remove(&id) else { return };
        let result = match msg.get("error") {
            Some(err) => Err(DebugError::Protocol(
                err.get("message").and_then(Value::as_str).unwrap_or("unknown error").to_string(),
            )),
            None => Ok(msg.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = tx.send(result);
        return;
    }

    let Some(method) = msg.get("method").and_then(Value::as_str) else { return };
    let params = msg.get("params").cloned().unwrap_or(Value::Null);
    match method {
        "Debugger.paused" => {
            let reason =
                params.get("reason").and_then(Value::as_str).unwrap_or("pause").to_string();
            let hit_breakpoint_ids = params
                .get("hitBreakpoints")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter().filter_map(Value::as_str).map(String::from).collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let call_frames = params
                .get("callFrames")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            *inner.paused.lock() = Some(PausedState {
                reason: reason.clone(),
                hit_breakpoint_ids: hit_breakpoint_ids.clone(),
                call_frames,
            });
            inner.var_refs.lock().clear();
            inner.events.emit(DebugEvent::Paused {
                reason,
                hit_breakpoint_ids,
                thread_id: None,
            });
        }
        "Debugger.resumed" => {
            *inner.paused.lock() = None;
            inner.var_refs.lock().clear();
            inner.events.emit(DebugEvent::Resumed);
        }
        "Debugger.breakpointResolved" => {
            let id = params
                .get("breakpointId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let line = params
                .get("location")
                .and_then(|l| l.get("lineNumber"))
                .and_then(Value::as_u64)
                .map(|n| n as u32 + 1);
            if let Some(bp) = inner.breakpoints.lock().get_mut(&id) {
                bp.verified = true;
                if let Some(line) = line {
                    bp.line = line;
                }
            }
            inner.events.emit(DebugEvent::BreakpointResolved { id, line, verified: true });
        }
        "Runtime.consoleAPICalled" => {
            let category =
                params.get("type").and_then(Value::as_str).unwrap_or("log").to_string();
            let text = params
                .get("args")
                .and_then(Value::as_array)
                .map(|args| {
                    args.iter()
                        .map(describe_remote_object)
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            inner.events.emit(DebugEvent::Output { category, text, source: None, line: None });
        }
        "Runtime.exceptionThrown" => {
            let text = params
                .pointer("/exceptionDetails/text")
                .and_then(Value::as_str)
                .unwrap_or("uncaught exception")
                .to_string();
            inner.events.emit(DebugEvent::Output {
                category: "exception".to_string(),
                text,
                source: None,
                line: None,
            });
        }
        _ => {}
    }
}

/// Tear down after socket close: fail every pending request and tell
/// subscribers the connection is gone.
fn teardown(inner: &Inner) {
    inner.connected.store(false, Ordering::SeqCst);
    *inner.writer.lock() = None;
    *inner.paused.lock() = None;
    let pending: Vec<_> = inner.pending.lock().drain().collect();
    for (_, tx) in pending {
        let _ = tx.send(Err(DebugError::Disconnected));
    }
    inner.events.emit(DebugEvent::Disconnected);
}

/// Human-readable rendering of an inspector RemoteObject.
fn describe_remote_object(obj: &Value) -> String {
    if let Some(desc) = obj.get("description").and_then(Value::as_str) {
        return desc.to_string();
    }
    match obj.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => obj.get("type").and_then(Value::as_str).unwrap_or("undefined").to_string(),
    }
}

fn frame_to_stack_frame(frame: &Value) -> StackFrame {
    let url = frame.get("url").and_then(Value::as_str).unwrap_or_default();
    let path = url.strip_prefix("file://").unwrap_or(url).to_string();
    let name = frame.get("functionName").and_then(Value::as_str).unwrap_or_default();
    StackFrame {
        id: frame.get("callFrameId").and_then(Value::as_str).unwrap_or_default().to_string(),
        name: StackFrame::normalized_name(name),
        source: Source {
            path: (!path.is_empty()).then(|| path.clone()),
            name: path.rsplit('/').next().filter(|s| !s.is_empty()).map(String::from),
        },
        line: frame
            .pointer("/location/lineNumber")
            .and_then(Value::as_u64)
            .map(|n| n as u32 + 1)
            .unwrap_or(1),
        column: frame
            .pointer("/location/columnNumber")
            .and_then(Value::as_u64)
            .map(|n| n as u32 + 1)
            .unwrap_or(1),
    }
}

#[async_trait]
impl DebugAdapter for V8InspectorAdapter {
    async fn connect(&self, opts: ConnectOptions) -> Result<(), DebugError> {
        let url = opts
            .ws_url
            .clone()
            .unwrap_or_else(|| format!("ws://{}:{}", opts.host, opts.port));
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| DebugError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<String>();
        *self.inner.writer.lock() = Some(writer_tx);
        *self.inner.ws_url.lock() = Some(url);
        self.inner.connected.store(true, Ordering::SeqCst);

        // Writer task: single owner of the sink.
        tokio::spawn(async move {
            while let Some(frame) = writer_rx.recv().await {
                if sink.send(Message::text(frame)).await.is_err() {
                    break;
                }
            }
        });

        // Reader task: responses, events, teardown on close.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => handle_message(&inner, &text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "inspector: socket error");
                        break;
                    }
                    _ => {} // Ping/Pong/Binary — ignore
                }
            }
            teardown(&inner);
        });

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DebugError> {
        // Dropping the writer ends the writer task and closes the sink;
        // the reader task observes the close and runs teardown.
        *self.inner.writer.lock() = None;
        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<(), DebugError> {
        self.send("Runtime.enable", json!({})).await?;
        self.send("Debugger.enable", json!({})).await?;
        Ok(())
    }

    async fn launch(&self, _config: Option<Value>) -> Result<(), DebugError> {
        // Breakpoints installed before this point are armed before user
        // code runs: the debuggee was spawned with --inspect-brk.
        self.send("Runtime.runIfWaitingForDebugger", json!({})).await?;
        Ok(())
    }

    async fn set_breakpoint(
        &self,
        file: &str,
        line: u32,
        condition: Option<&str>,
    ) -> Result<SetBreakpointResult, DebugError> {
        let url = if file.starts_with("file://") {
            file.to_string()
        } else {
            format!("file://{file}")
        };
        let mut params = json!({
            "lineNumber": line.saturating_sub(1),
            "url": url,
            "columnNumber": 0,
        });
        if let Some(cond) = condition {
            params["condition"] = json!(cond);
        }
        let result = self.send("Debugger.setBreakpointByUrl", params).await?;

        let breakpoint_id = result
            .get("breakpointId")
            .and_then(Value::as_str)
            .ok_or_else(|| DebugError::Protocol("setBreakpointByUrl: no breakpointId".into()))?
            .to_string();
        let locations = result.get("locations").and_then(Value::as_array);
        let verified = locations.is_some_and(|l| !l.is_empty());
        let resolved_line = locations
            .and_then(|l| l.first())
            .and_then(|loc| loc.get("lineNumber"))
            .and_then(Value::as_u64)
            .map(|n| n as u32 + 1);

        self.inner.breakpoints.lock().insert(
            breakpoint_id.clone(),
            BreakpointInfo {
                id: breakpoint_id.clone(),
                file: file.to_string(),
                line: resolved_line.unwrap_or(line),
                column: None,
                condition: condition.map(String::from),
                hit_condition: None,
                log_message: None,
                verified,
            },
        );

        Ok(SetBreakpointResult {
            breakpoint_id,
            verified,
            line: resolved_line,
            source: Some(file.to_string()),
        })
    }

    async fn remove_breakpoint(&self, id: &str) -> Result<(), DebugError> {
        if self.inner.breakpoints.lock().remove(id).is_none() {
            return Err(DebugError::UnknownBreakpoint(id.to_string()));
        }
        self.send("Debugger.removeBreakpoint", json!({ "breakpointId": id })).await?;
        Ok(())
    }

    async fn list_breakpoints(&self) -> Result<Vec<BreakpointInfo>, DebugError> {
        let mut all: Vec<BreakpointInfo> =
            self.inner.breakpoints.lock().values().cloned().collect();
        all.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        Ok(all)
    }

    async fn resume(&self, _thread_id: Option<i64>) -> Result<(), DebugError> {
        self.send("Debugger.resume", json!({})).await.map(|_| ())
    }

    async fn pause(&self, _thread_id: Option<i64>) -> Result<(), DebugError> {
        self.send("Debugger.pause", json!({})).await.map(|_| ())
    }

    async fn step_over(&self, _thread_id: Option<i64>) -> Result<(), DebugError> {
        self.send("Debugger.stepOver", json!({})).await.map(|_| ())
    }

    async fn step_into(&self, _thread_id: Option<i64>) -> Result<(), DebugError> {
        self.send("Debugger.stepInto", json!({})).await.map(|_| ())
    }

    async fn step_out(&self, _thread_id: Option<i64>) -> Result<(), DebugError> {
        self.send("Debugger.stepOut", json!({})).await.map(|_| ())
    }

    async fn call_stack(
        &self,
        _thread_id: Option<i64>,
    ) -> Result<Option<Vec<StackFrame>>, DebugError> {
        let paused = self.inner.paused.lock();
        Ok(paused.as_ref().map(|p| p.call_frames.iter().map(frame_to_stack_frame).collect()))
    }

    async fn scopes(&self, frame_id: &str) -> Result<Vec<Scope>, DebugError> {
        let chain = {
            let paused = self.inner.paused.lock();
            let state = paused.as_ref().ok_or(DebugError::Protocol("not paused".into()))?;
            let frame = state
                .call_frames
                .iter()
                .find(|f| f.get("callFrameId").and_then(Value::as_str) == Some(frame_id))
                .ok_or_else(|| DebugError::Protocol(format!("unknown frame: {frame_id}")))?;
            frame.get("scopeChain").and_then(Value::as_array).cloned().unwrap_or_default()
        };

        let mut scopes = Vec::new();
        for scope in &chain {
            let scope_type =
                scope.get("type").and_then(Value::as_str).unwrap_or("local").to_string();
            let reference = scope
                .pointer("/object/objectId")
                .and_then(Value::as_str)
                .map(|oid| self.inner.var_refs.lock().allocate(oid.to_string()))
                .unwrap_or(0);
            let mut name: Vec<char> = scope_type.chars().collect();
            if let Some(first) = name.first_mut() {
                *first = first.to_ascii_uppercase();
            }
            scopes.push(Scope {
                name: name.into_iter().collect(),
                scope_type: scope_type.clone(),
                variables_reference: reference,
                expensive: scope_type == "global",
            });
        }
        Ok(scopes)
    }

    async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, DebugError> {
        let object_id = self
            .inner
            .var_refs
            .lock()
            .get(variables_reference)
            .cloned()
            .ok_or_else(|| {
                DebugError::Protocol(format!("unknown variablesReference: {variables_reference}"))
            })?;
        let result = self
            .send("Runtime.getProperties", json!({ "objectId": object_id, "ownProperties": true }))
            .await?;

        let mut vars = Vec::new();
        for prop in result.get("result").and_then(Value::as_array).into_iter().flatten() {
            let Some(name) = prop.get("name").and_then(Value::as_str) else { continue };
            let value = prop.get("value");
            let reference = value
                .and_then(|v| v.get("objectId"))
                .and_then(Value::as_str)
                .map(|oid| self.inner.var_refs.lock().allocate(oid.to_string()))
                .unwrap_or(0);
            vars.push(Variable {
                name: name.to_string(),
                value: value.map(describe_remote_object).unwrap_or_default(),
                var_type: value
                    .and_then(|v| v.get("type"))
                    .and_then(Value::as_str)
                    .map(String::from),
                variables_reference: reference,
            });
        }
        Ok(vars)
    }

    async fn evaluate(
        &self,
        expression: &str,
        frame_id: Option<&str>,
        _context: Option<&str>,
    ) -> Result<Value, DebugError> {
        let use_frame = self.is_paused() && frame_id.is_some();
        let result = if use_frame {
            self.send(
                "Debugger.evaluateOnCallFrame",
                json!({ "callFrameId": frame_id, "expression": expression }),
            )
            .await?
        } else {
            self.send("Runtime.evaluate", json!({ "expression": expression })).await?
        };

        if let Some(details) = result.get("exceptionDetails") {
            let text = details.get("text").and_then(Value::as_str).unwrap_or("evaluation threw");
            return Err(DebugError::Protocol(text.to_string()));
        }
        Ok(result.get("result").cloned().unwrap_or(Value::Null))
    }

    fn is_paused(&self) -> bool {
        self.inner.paused.lock().is_some()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<DebugEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
#[path = "v8_tests.rs"]
mod tests;
