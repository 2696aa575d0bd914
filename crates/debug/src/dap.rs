// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framed TCP client for the Debug Adapter Protocol.
//!
//! Wire format: `Content-Length: N\r\n\r\n<N-byte JSON body>`. Requests are
//! correlated by `seq`; `setBreakpoints` is a per-source bulk replace, so
//! the adapter remembers the desired set per file and re-sends the reduced
//! set on removal.

use crate::adapter::{
    ConnectOptions, DebugAdapter, DebugError, DebugEvent, SetBreakpointResult,
};
use crate::fanout::EventFanout;
use async_trait::async_trait;
use parking_lot::Mutex;
use reflexive_core::{BreakpointInfo, Scope, Source, StackFrame, Variable};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Harmonized stop reasons; anything else passes through raw.
pub(crate) fn map_stop_reason(raw: &str) -> String {
    match raw {
        "breakpoint" | "step" | "exception" | "pause" | "entry" | "goto"
        | "function breakpoint" | "data breakpoint" => raw.to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
struct DesiredBreakpoint {
    line: u32,
    condition: Option<String>,
}

type PendingMap = HashMap<i64, oneshot::Sender<Result<Value, DebugError>>>;

struct Inner {
    seq: AtomicI64,
    connected: AtomicBool,
    writer: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    pending: Mutex<PendingMap>,
    events: EventFanout,
    paused: Mutex<Option<i64>>, // stopped thread id
    /// Desired breakpoints per source path.
    desired: Mutex<HashMap<String, Vec<DesiredBreakpoint>>>,
    /// Adapter-assigned breakpoint id → (file, line, verified).
    installed: Mutex<HashMap<String, BreakpointInfo>>,
    default_thread: AtomicI64,
}

/// DAP client over TCP. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct DapAdapter {
    inner: Arc<Inner>,
}

impl Default for DapAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract complete `Content-Length`-framed bodies from `buf`, leaving any
/// partial frame in place. Never splits a body.
pub(crate) fn drain_frames(buf: &mut Vec<u8>) -> Vec<String> {
    let mut out = Vec::new();
    loop {
        let Some(header_end) = find_subslice(buf, b"\r\n\r\n") else { break };
        let header = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let Some(len) = header
            .lines()
            .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(str::trim).map(String::from))
            .and_then(|v| v.parse::<usize>().ok())
        else {
            // Unparseable header; drop it and resync at the next frame.
            buf.drain(..header_end + 4);
            continue;
        };
        let body_start = header_end + 4;
        if buf.len() < body_start + len {
            break; // partial body, wait for more bytes
        }
        let body = String::from_utf8_lossy(&buf[body_start..body_start + len]).to_string();
        buf.drain(..body_start + len);
        out.push(body);
    }
    out
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub(crate) fn encode_frame(body: &str) -> Vec<u8> {
    let mut out = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    out.extend_from_slice(body.as_bytes());
    out
}

fn handle_body(inner: &Inner, body: &str) {
    let Ok(msg) = serde_json::from_str::<Value>(body) else {
        tracing::warn!("dap: dropping unparseable frame");
        return;
    };
    match msg.get("type").and_then(Value::as_str) {
        Some("response") => {
            let Some(seq) = msg.get("request_seq").and_then(Value::as_i64) else { return };
            let Some(tx) = inner.pending.lock().remove(&seq) else { return };
            let result = if msg.get("success").and_then(Value::as_bool).unwrap_or(false) {
                Ok(msg.get("body").cloned().unwrap_or(Value::Null))
            } else {
                Err(DebugError::Protocol(
                    msg.get("message").and_then(Value::as_str).unwrap_or("request failed").into(),
                ))
            };
            let _ = tx.send(result);
        }
        Some("event") => handle_event(inner, &msg),
        _ => {}
    }
}

fn handle_event(inner: &Inner, msg: &Value) {
    let body = msg.get("body").cloned().unwrap_or(Value::Null);
    match msg.get("event").and_then(Value::as_str) {
        Some("stopped") => {
            let reason = body.get("reason").and_then(Value::as_str).unwrap_or("pause");
            let thread_id = body.get("threadId").and_then(Value::as_i64);
            if let Some(tid) = thread_id {
                inner.default_thread.store(tid, Ordering::SeqCst);
            }
            *inner.paused.lock() = Some(thread_id.unwrap_or(1));
            let hit_breakpoint_ids = body
                .get("hitBreakpointIds")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(String::from)))
                        .collect()
                })
                .unwrap_or_default();
            inner.events.emit(DebugEvent::Paused {
                reason: map_stop_reason(reason),
                hit_breakpoint_ids,
                thread_id,
            });
        }
        Some("continued") => {
            *inner.paused.lock() = None;
            inner.events.emit(DebugEvent::Resumed);
        }
        Some("terminated") | Some("exited") => {
            inner.events.emit(DebugEvent::Disconnected);
        }
        Some("output") => {
            inner.events.emit(DebugEvent::Output {
                category: body
                    .get("category")
                    .and_then(Value::as_str)
                    .unwrap_or("console")
                    .to_string(),
                text: body.get("output").and_then(Value::as_str).unwrap_or_default().to_string(),
                source: body.pointer("/source/path").and_then(Value::as_str).map(String::from),
                line: body.get("line").and_then(Value::as_u64).map(|n| n as u32),
            });
        }
        Some("breakpoint") => {
            let bp = body.get("breakpoint").cloned().unwrap_or(Value::Null);
            let id = bp
                .get("id")
                .and_then(Value::as_i64)
                .map(|n| n.to_string())
                .unwrap_or_default();
            let verified = bp.get("verified").and_then(Value::as_bool).unwrap_or(false);
            let line = bp.get("line").and_then(Value::as_u64).map(|n| n as u32);
            if let Some(info) = inner.installed.lock().get_mut(&id) {
                info.verified = verified;
                if let Some(line) = line {
                    info.line = line;
                }
            }
            inner.events.emit(DebugEvent::BreakpointResolved { id, line, verified });
        }
        _ => {}
    }
}

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

impl DapAdapter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                seq: AtomicI64::new(0),
                connected: AtomicBool::new(false),
                writer: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                events: EventFanout::default(),
                paused: Mutex::new(None),
                desired: Mutex::new(HashMap::new()),
                installed: Mutex::new(HashMap::new()),
                default_thread: AtomicI64::new(1),
            }),
        }
    }

    async fn request(&self, command: &str, arguments: Value) -> Result<Value, DebugError> {
        let inner = &self.inner;
        if !inner.connected.load(Ordering::SeqCst) {
            return Err(DebugError::NotConnected);
        }
        let seq = inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        inner.pending.lock().insert(seq, tx);

        let body = json!({
            "seq": seq,
            "type": "request",
            "command": command,
            "arguments": arguments,
        })
        .to_string();
        let sent = inner
            .writer
            .lock()
            .as_ref()
            .map(|w| w.send(encode_frame(&body)).is_ok())
            .unwrap_or(false);
        if !sent {
            inner.pending.lock().remove(&seq);
            return Err(DebugError::NotConnected);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DebugError::Disconnected),
            Err(_) => {
                inner.pending.lock().remove(&seq);
                Err(DebugError::Timeout(command.to_string()))
            }
        }
    }

    fn thread(&self, thread_id: Option<i64>) -> i64 {
        thread_id.unwrap_or_else(|| self.inner.default_thread.load(Ordering::SeqCst))
    }

    /// Send the full desired set for one source (bulk replace) and refresh
    /// the installed-id registry from the response.
    async fn sync_source(&self, file: &str) -> Result<Vec<SetBreakpointResult>, DebugError> {
        let desired = self.inner.desired.lock().get(file).cloned().unwrap_or_default();
        let breakpoints: Vec<Value> = desired
            .iter()
            .map(|bp| {
                let mut entry = json!({ "line": bp.line });
                if let Some(cond) = &bp.condition {
                    entry["condition"] = json!(cond);
                }
                entry
            })
            .collect();

        let body = self
            .request(
                "setBreakpoints",
                json!({
                    "source": { "path": file },
                    "breakpoints": breakpoints,
                }),
            )
            .await?;

        let mut installed = self.inner.installed.lock();
        installed.retain(|_, info| info.file != file);
        let mut results = Vec::new();
        let returned = body.get("breakpoints").and_then(Value::as_array).cloned().unwrap_or_default();
        for (i, bp) in returned.iter().enumerate() {
            let id = bp
                .get("id")
                .and_then(Value::as_i64)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("{file}:{i}"));
            let verified = bp.get("verified").and_then(Value::as_bool).unwrap_or(false);
            let line = bp
                .get("line")
                .and_then(Value::as_u64)
                .map(|n| n as u32)
                .or(desired.get(i).map(|d| d.line));
            installed.insert(
                id.clone(),
                BreakpointInfo {
                    id: id.clone(),
                    file: file.to_string(),
                    line: line.unwrap_or_default(),
                    column: None,
                    condition: desired.get(i).and_then(|d| d.condition.clone()),
                    hit_condition: None,
                    log_message: None,
                    verified,
                },
            );
            results.push(SetBreakpointResult {
                breakpoint_id: id,
                verified,
                line,
                source: Some(file.to_string()),
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl DebugAdapter for DapAdapter {
    async fn connect(&self, opts: ConnectOptions) -> Result<(), DebugError> {
        let addr = format!("{}:{}", opts.host, opts.port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| DebugError::Connect(format!("{addr}: {e}")))?;
        let (read_half, mut write_half) = stream.into_split();

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        *self.inner.writer.lock() = Some(writer_tx);
        self.inner.connected.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            while let Some(frame) = writer_rx.recv().await {
                if write_half.write_all(&frame).await.is_err() {
                    break;
                }
            }
        });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut read_half = read_half;
            let mut buf: Vec<u8> = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                match read_half.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        for body in drain_frames(&mut buf) {
                            handle_body(&inner, &body);
                        }
                    }
                }
            }
            teardown(&inner);
        });

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DebugError> {
        if self.is_connected() {
            let _ = self.request("disconnect", json!({})).await;
        }
        *self.inner.writer.lock() = None;
        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<(), DebugError> {
        self.request(
            "initialize",
            json!({
                "clientID": "reflexive",
                "clientName": "Reflexive",
                "adapterID": "reflexive",
                "linesStartAt1": true,
                "columnsStartAt1": true,
                "pathFormat": "path",
            }),
        )
        .await
        .map(|_| ())
    }

    async fn launch(&self, config: Option<Value>) -> Result<(), DebugError> {
        self.request("launch", config.unwrap_or_else(|| json!({}))).await?;
        // Breakpoints queued between initialize and here were sent with
        // setBreakpoints; configurationDone releases the debuggee.
        self.request("configurationDone", json!({})).await.map(|_| ())
    }

    async fn set_breakpoint(
        &self,
        file: &str,
        line: u32,
        condition: Option<&str>,
    ) -> Result<SetBreakpointResult, DebugError> {
        {
            let mut desired = self.inner.desired.lock();
            let list = desired.entry(file.to_string()).or_default();
            list.push(DesiredBreakpoint { line, condition: condition.map(String::from) });
        }
        let results = self.sync_source(file).await?;
        results
            .into_iter()
            .rev()
            .find(|r| r.line == Some(line) || r.line.is_none())
            .ok_or_else(|| DebugError::Protocol("setBreakpoints returned no entries".into()))
    }

    async fn remove_breakpoint(&self, id: &str) -> Result<(), DebugError> {
        let Some(info) = self.inner.installed.lock().get(id).cloned() else {
            return Err(DebugError::UnknownBreakpoint(id.to_string()));
        };
        {
            let mut desired = self.inner.desired.lock();
            if let Some(list) = desired.get_mut(&info.file) {
                if let Some(pos) = list.iter().position(|bp| bp.line == info.line) {
                    list.remove(pos);
                }
            }
        }
        self.sync_source(&info.file).await.map(|_| ())
    }

    async fn list_breakpoints(&self) -> Result<Vec<BreakpointInfo>, DebugError> {
        let mut all: Vec<BreakpointInfo> =
            self.inner.installed.lock().values().cloned().collect();
        all.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        Ok(all)
    }

    async fn resume(&self, thread_id: Option<i64>) -> Result<(), DebugError> {
        let tid = self.thread(thread_id);
        self.request("continue", json!({ "threadId": tid })).await?;
        // Some adapters do not emit `continued` after an explicit request.
        if self.inner.paused.lock().take().is_some() {
            self.inner.events.emit(DebugEvent::Resumed);
        }
        Ok(())
    }

    async fn pause(&self, thread_id: Option<i64>) -> Result<(), DebugError> {
        let tid = self.thread(thread_id);
        self.request("pause", json!({ "threadId": tid })).await.map(|_| ())
    }

    async fn step_over(&self, thread_id: Option<i64>) -> Result<(), DebugError> {
        let tid = self.thread(thread_id);
        self.request("next", json!({ "threadId": tid })).await.map(|_| ())
    }

    async fn step_into(&self, thread_id: Option<i64>) -> Result<(), DebugError> {
        let tid = self.thread(thread_id);
        self.request("stepIn", json!({ "threadId": tid })).await.map(|_| ())
    }

    async fn step_out(&self, thread_id: Option<i64>) -> Result<(), DebugError> {
        let tid = self.thread(thread_id);
        self.request("stepOut", json!({ "threadId": tid })).await.map(|_| ())
    }

    async fn call_stack(
        &self,
        thread_id: Option<i64>,
    ) -> Result<Option<Vec<StackFrame>>, DebugError> {
        if self.inner.paused.lock().is_none() {
            return Ok(None);
        }
        let tid = self.thread(thread_id);
        let body = self.request("stackTrace", json!({ "threadId": tid })).await?;
        let frames = body
            .get("stackFrames")
            .and_then(Value::as_array)
            .map(|frames| {
                frames
                    .iter()
                    .map(|f| StackFrame {
                        id: f
                            .get("id")
                            .and_then(Value::as_i64)
                            .map(|n| n.to_string())
                            .unwrap_or_default(),
                        name: f
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        source: Source {
                            path: f
                                .pointer("/source/path")
                                .and_then(Value::as_str)
                                .map(String::from),
                            name: f
                                .pointer("/source/name")
                                .and_then(Value::as_str)
                                .map(String::from),
                        },
                        line: f.get("line").and_then(Value::as_u64).unwrap_or(1) as u32,
                        column: f.get("column").and_then(Value::as_u64).unwrap_or(1) as u32,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(frames))
    }

    async fn scopes(&self, frame_id: &str) -> Result<Vec<Scope>, DebugError> {
        let frame: i64 = frame_id
            .parse()
            .map_err(|_| DebugError::Protocol(format!("bad frame id: {frame_id}")))?;
        let body = self.request("scopes", json!({ "frameId": frame })).await?;
        Ok(body
            .get("scopes")
            .and_then(Value::as_array)
            .map(|scopes| {
                scopes
                    .iter()
                    .map(|s| Scope {
                        name: s.get("name").and_then(Value::as_str).unwrap_or_default().into(),
                        scope_type: s
                            .get("presentationHint")
                            .or_else(|| s.get("name"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_lowercase(),
                        variables_reference: s
                            .get("variablesReference")
                            .and_then(Value::as_i64)
                            .unwrap_or(0),
                        expensive: s.get("expensive").and_then(Value::as_bool).unwrap_or(false),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, DebugError> {
        let body = self
            .request("variables", json!({ "variablesReference": variables_reference }))
            .await?;
        Ok(body
            .get("variables")
            .and_then(Value::as_array)
            .map(|vars| {
                vars.iter()
                    .map(|v| Variable {
                        name: v.get("name").and_then(Value::as_str).unwrap_or_default().into(),
                        value: v.get("value").and_then(Value::as_str).unwrap_or_default().into(),
                        var_type: v.get("type").and_then(Value::as_str).map(String::from),
                        variables_reference: v
                            .get("variablesReference")
                            .and_then(Value::as_i64)
                            .unwrap_or(0),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn evaluate(
        &self,
        expression: &str,
        frame_id: Option<&str>,
        context: Option<&str>,
    ) -> Result<Value, DebugError> {
        let mut args = json!({
            "expression": expression,
            "context": context.unwrap_or("repl"),
        });
        if let Some(frame) = frame_id.and_then(|f| f.parse::<i64>().ok()) {
            args["frameId"] = json!(frame);
        }
        self.request("evaluate", args).await
    }

    fn is_paused(&self) -> bool {
        self.inner.paused.lock().is_some()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<DebugEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
#[path = "dap_tests.rs"]
mod tests;
