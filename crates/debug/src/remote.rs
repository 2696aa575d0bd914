// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Facade over one debug adapter: connection lifecycle, the logical
//! breakpoint registry, and a paused-state cache.
//!
//! Logical breakpoints carry local ids (`bp_<n>`) that stay stable across
//! target restarts; the adapter-assigned ids are re-learned on every
//! attach. Breakpoints registered before [`RemoteDebugger::attach`] are
//! installed before the debuggee runs user code (the debuggee is spawned
//! paused-on-entry, and `launch` is issued only after re-arming).

use crate::adapter::{
    ConnectOptions, DebugAdapter, DebugError, DebugEvent, SetBreakpointResult,
};
use crate::fanout::EventFanout;
use parking_lot::Mutex;
use reflexive_core::{BreakpointInfo, Scope, StackFrame, Variable};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One logical breakpoint as the dashboard sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalBreakpoint {
    pub id: String,
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Prompt fed to chat when this breakpoint halts the debuggee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub enabled: bool,
    pub verified: bool,
    #[serde(skip)]
    pub adapter_id: Option<String>,
}

/// Snapshot for `get_debugger_state`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggerState {
    pub connected: bool,
    pub paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspector_url: Option<String>,
    pub breakpoints: Vec<LogicalBreakpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_stack: Option<Vec<StackFrame>>,
}

struct PausedSnapshot {
    reason: String,
    hit_local_ids: Vec<String>,
    call_stack: Vec<StackFrame>,
}

struct Inner {
    adapter: Mutex<Option<Arc<dyn DebugAdapter>>>,
    connected: AtomicBool,
    next_bp: AtomicU64,
    breakpoints: Mutex<Vec<LogicalBreakpoint>>,
    paused: Mutex<Option<PausedSnapshot>>,
    inspector_url: Mutex<Option<String>>,
    events: EventFanout,
}

/// Connection lifecycle + breakpoint registry + paused-state cache.
#[derive(Clone)]
pub struct RemoteDebugger {
    inner: Arc<Inner>,
}

impl Default for RemoteDebugger {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteDebugger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                adapter: Mutex::new(None),
                connected: AtomicBool::new(false),
                next_bp: AtomicU64::new(0),
                breakpoints: Mutex::new(Vec::new()),
                paused: Mutex::new(None),
                inspector_url: Mutex::new(None),
                events: EventFanout::default(),
            }),
        }
    }

    fn adapter(&self) -> Result<Arc<dyn DebugAdapter>, DebugError> {
        self.inner.adapter.lock().clone().ok_or(DebugError::NotConnected)
    }

    /// Full attach sequence: connect, initialize, re-arm every enabled
    /// logical breakpoint, then launch. Ordering matters: the debuggee was
    /// spawned paused-on-entry, so breakpoints precede user code.
    pub async fn attach(
        &self,
        adapter: Arc<dyn DebugAdapter>,
        opts: ConnectOptions,
    ) -> Result<(), DebugError> {
        adapter.connect(opts.clone()).await?;
        *self.inner.adapter.lock() = Some(Arc::clone(&adapter));
        self.inner.connected.store(true, Ordering::SeqCst);
        *self.inner.inspector_url.lock() = opts.ws_url.clone();

        self.spawn_forwarder(adapter.subscribe());

        adapter.initialize().await?;
        self.rearm().await?;
        adapter.launch(None).await?;
        Ok(())
    }

    /// Install every enabled logical breakpoint on the current adapter,
    /// refreshing adapter ids and verification.
    async fn rearm(&self) -> Result<(), DebugError> {
        let adapter = self.adapter()?;
        let logical: Vec<LogicalBreakpoint> = self.inner.breakpoints.lock().clone();
        for bp in logical.iter().filter(|bp| bp.enabled) {
            match adapter.set_breakpoint(&bp.file, bp.line, bp.condition.as_deref()).await {
                Ok(result) => self.record_armed(&bp.id, &result),
                Err(e) => {
                    tracing::warn!(file = %bp.file, line = bp.line, error = %e, "breakpoint re-arm failed");
                }
            }
        }
        Ok(())
    }

    fn record_armed(&self, local_id: &str, result: &SetBreakpointResult) {
        let mut breakpoints = self.inner.breakpoints.lock();
        if let Some(bp) = breakpoints.iter_mut().find(|bp| bp.id == local_id) {
            bp.adapter_id = Some(result.breakpoint_id.clone());
            bp.verified = result.verified;
            if let Some(line) = result.line {
                bp.line = line;
            }
        }
    }

    fn spawn_forwarder(&self, mut events: mpsc::UnboundedReceiver<DebugEvent>) {
        let inner = Arc::clone(&self.inner);
        let facade = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    DebugEvent::Paused { reason, hit_breakpoint_ids, thread_id } => {
                        let hit_local_ids: Vec<String> = {
                            let breakpoints = inner.breakpoints.lock();
                            hit_breakpoint_ids
                                .iter()
                                .filter_map(|aid| {
                                    breakpoints
                                        .iter()
                                        .find(|bp| bp.adapter_id.as_deref() == Some(aid))
                                        .map(|bp| bp.id.clone())
                                })
                                .collect()
                        };
                        let call_stack = match facade.adapter() {
                            Ok(adapter) => adapter
                                .call_stack(thread_id)
                                .await
                                .ok()
                                .flatten()
                                .unwrap_or_default(),
                            Err(_) => Vec::new(),
                        };
                        *inner.paused.lock() = Some(PausedSnapshot {
                            reason: reason.clone(),
                            hit_local_ids: hit_local_ids.clone(),
                            call_stack,
                        });
                        inner.events.emit(DebugEvent::Paused {
                            reason,
                            hit_breakpoint_ids: hit_local_ids,
                            thread_id,
                        });
                    }
                    DebugEvent::Resumed => {
                        *inner.paused.lock() = None;
                        inner.events.emit(DebugEvent::Resumed);
                    }
                    DebugEvent::Disconnected => {
                        inner.connected.store(false, Ordering::SeqCst);
                        *inner.paused.lock() = None;
                        *inner.adapter.lock() = None;
                        for bp in inner.breakpoints.lock().iter_mut() {
                            bp.adapter_id = None;
                            bp.verified = false;
                        }
                        inner.events.emit(DebugEvent::Disconnected);
                        break;
                    }
                    DebugEvent::BreakpointResolved { id, line, verified } => {
                        let local = {
                            let mut breakpoints = inner.breakpoints.lock();
                            breakpoints
                                .iter_mut()
                                .find(|bp| bp.adapter_id.as_deref() == Some(id.as_str()))
                                .map(|bp| {
                                    bp.verified = verified;
                                    if let Some(line) = line {
                                        bp.line = line;
                                    }
                                    bp.id.clone()
                                })
                        };
                        if let Some(local_id) = local {
                            inner.events.emit(DebugEvent::BreakpointResolved {
                                id: local_id,
                                line,
                                verified,
                            });
                        }
                    }
                    other => inner.events.emit(other),
                }
            }
        });
    }

    /// Register a logical breakpoint; installs it immediately when a
    /// debugger is attached.
    pub async fn set_breakpoint(
        &self,
        file: &str,
        line: u32,
        condition: Option<String>,
        prompt: Option<String>,
    ) -> Result<LogicalBreakpoint, DebugError> {
        let local_id = format!("bp_{}", self.inner.next_bp.fetch_add(1, Ordering::SeqCst) + 1);
        let bp = LogicalBreakpoint {
            id: local_id.clone(),
            file: file.to_string(),
            line,
            condition: condition.clone(),
            prompt,
            enabled: true,
            verified: false,
            adapter_id: None,
        };
        self.inner.breakpoints.lock().push(bp);

        if self.is_connected() {
            let adapter = self.adapter()?;
            let result = adapter.set_breakpoint(file, line, condition.as_deref()).await?;
            self.record_armed(&local_id, &result);
        }

        let breakpoints = self.inner.breakpoints.lock();
        breakpoints
            .iter()
            .find(|bp| bp.id == local_id)
            .cloned()
            .ok_or_else(|| DebugError::UnknownBreakpoint(local_id))
    }

    /// Remove a logical breakpoint by local id.
    pub async fn remove_breakpoint(&self, local_id: &str) -> Result<(), DebugError> {
        let removed = {
            let mut breakpoints = self.inner.breakpoints.lock();
            let pos = breakpoints.iter().position(|bp| bp.id == local_id);
            pos.map(|i| breakpoints.remove(i))
        };
        let Some(removed) = removed else {
            return Err(DebugError::UnknownBreakpoint(local_id.to_string()));
        };
        if let (Some(adapter_id), Ok(adapter)) = (removed.adapter_id, self.adapter()) {
            adapter.remove_breakpoint(&adapter_id).await?;
        }
        Ok(())
    }

    /// Update condition/prompt/enabled on a logical breakpoint. Toggling
    /// `enabled` arms or disarms it on the live adapter.
    pub async fn update_breakpoint(
        &self,
        local_id: &str,
        condition: Option<Option<String>>,
        prompt: Option<Option<String>>,
        enabled: Option<bool>,
    ) -> Result<LogicalBreakpoint, DebugError> {
        let (was_enabled, now_enabled, file, line, adapter_id, cond) = {
            let mut breakpoints = self.inner.breakpoints.lock();
            let bp = breakpoints
                .iter_mut()
                .find(|bp| bp.id == local_id)
                .ok_or_else(|| DebugError::UnknownBreakpoint(local_id.to_string()))?;
            let was_enabled = bp.enabled;
            if let Some(condition) = condition {
                bp.condition = condition;
            }
            if let Some(prompt) = prompt {
                bp.prompt = prompt;
            }
            if let Some(enabled) = enabled {
                bp.enabled = enabled;
            }
            let disarm = was_enabled && !bp.enabled;
            let adapter_id = if disarm { bp.adapter_id.take() } else { None };
            (was_enabled, bp.enabled, bp.file.clone(), bp.line, adapter_id, bp.condition.clone())
        };

        if self.is_connected() {
            if was_enabled && !now_enabled {
                if let (Some(adapter_id), Ok(adapter)) = (adapter_id, self.adapter()) {
                    let _ = adapter.remove_breakpoint(&adapter_id).await;
                }
            } else if !was_enabled && now_enabled {
                let adapter = self.adapter()?;
                let result = adapter.set_breakpoint(&file, line, cond.as_deref()).await?;
                self.record_armed(local_id, &result);
            }
        }

        let breakpoints = self.inner.breakpoints.lock();
        breakpoints
            .iter()
            .find(|bp| bp.id == local_id)
            .cloned()
            .ok_or_else(|| DebugError::UnknownBreakpoint(local_id.to_string()))
    }

    pub fn list_breakpoints(&self) -> Vec<LogicalBreakpoint> {
        self.inner.breakpoints.lock().clone()
    }

    /// The logical breakpoints (with prompts) matching a pause's hit set.
    pub fn prompts_for(&self, hit_local_ids: &[String]) -> Vec<LogicalBreakpoint> {
        self.inner
            .breakpoints
            .lock()
            .iter()
            .filter(|bp| bp.enabled && bp.prompt.is_some() && hit_local_ids.contains(&bp.id))
            .cloned()
            .collect()
    }

    pub async fn resume(&self) -> Result<(), DebugError> {
        self.adapter()?.resume(None).await
    }

    pub async fn pause(&self) -> Result<(), DebugError> {
        self.adapter()?.pause(None).await
    }

    pub async fn step_over(&self) -> Result<(), DebugError> {
        self.adapter()?.step_over(None).await
    }

    pub async fn step_into(&self) -> Result<(), DebugError> {
        self.adapter()?.step_into(None).await
    }

    pub async fn step_out(&self) -> Result<(), DebugError> {
        self.adapter()?.step_out(None).await
    }

    /// Cached call stack; `None` when not paused.
    pub fn call_stack(&self) -> Option<Vec<StackFrame>> {
        self.inner.paused.lock().as_ref().map(|p| p.call_stack.clone())
    }

    pub async fn scopes(&self, frame_id: &str) -> Result<Vec<Scope>, DebugError> {
        self.adapter()?.scopes(frame_id).await
    }

    pub async fn variables(&self, reference: i64) -> Result<Vec<Variable>, DebugError> {
        self.adapter()?.variables(reference).await
    }

    pub async fn evaluate(
        &self,
        expression: &str,
        frame_id: Option<&str>,
        context: Option<&str>,
    ) -> Result<Value, DebugError> {
        self.adapter()?.evaluate(expression, frame_id, context).await
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.lock().is_some()
    }

    pub fn pause_reason(&self) -> Option<(String, Vec<String>)> {
        self.inner
            .paused
            .lock()
            .as_ref()
            .map(|p| (p.reason.clone(), p.hit_local_ids.clone()))
    }

    pub async fn disconnect(&self) -> Result<(), DebugError> {
        let adapter = self.inner.adapter.lock().take();
        self.inner.connected.store(false, Ordering::SeqCst);
        *self.inner.paused.lock() = None;
        for bp in self.inner.breakpoints.lock().iter_mut() {
            bp.adapter_id = None;
            bp.verified = false;
        }
        if let Some(adapter) = adapter {
            adapter.disconnect().await?;
        }
        Ok(())
    }

    pub fn state(&self) -> DebuggerState {
        DebuggerState {
            connected: self.is_connected(),
            paused: self.is_paused(),
            inspector_url: self.inner.inspector_url.lock().clone(),
            breakpoints: self.list_breakpoints(),
            call_stack: self.call_stack(),
        }
    }

    /// Subscribe to facade-level events (breakpoint ids already local).
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DebugEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
