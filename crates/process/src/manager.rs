// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target process lifecycle: spawn, IO capture, restart, stdin, debugger
//! orchestration.
//!
//! All observable state lives behind one mutex and is mutated only from
//! handler turns (reader tasks, the exit waiter, public methods). The
//! manager never auto-restarts; abnormal exits are surfaced as events and
//! the policy belongs upstream.

use crate::inject::{InjectChannel, InjectError, EVAL_TIMEOUT};
use crate::shim;
use crate::watch::WatchRegistry;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use reflexive_core::{AppState, Capabilities, Event, LogType, ProcessState};
use reflexive_debug::{global_registry, ConnectOptions, DebugEvent, RemoteDebugger, RuntimeDescriptor};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// SIGTERM → SIGKILL grace period.
const STOP_GRACE: Duration = Duration::from_secs(3);

/// Budget for spawn → debugger-ready before the attach is reported failed.
const DEBUG_READY_BUDGET: Duration = Duration::from_secs(30);

/// With no output for this long, an interactive target is assumed to be
/// waiting on stdin.
const INPUT_IDLE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process is already running")]
    AlreadyRunning,

    #[error("process is not running")]
    NotRunning,

    #[error("no runtime registered for entry file: {0}")]
    UnsupportedEntry(PathBuf),

    #[error("spawn failed: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("injection is not enabled")]
    InjectDisabled,

    #[error("evaluation is not enabled")]
    EvalDisabled,

    #[error(transparent)]
    Inject(#[from] InjectError),

    #[error(transparent)]
    Debug(#[from] reflexive_debug::DebugError),
}

/// Spawn-time configuration for one target.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub entry: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub capabilities: Capabilities,
    pub interactive: bool,
    /// Extra args placed before the entry file (non-debug spawns only).
    pub runtime_args: Vec<String>,
    /// Scratch directory for the shim and IPC socket.
    pub work_dir: PathBuf,
}

impl ProcessOptions {
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            entry: entry.into(),
            args: Vec::new(),
            cwd,
            capabilities: Capabilities::read_only(),
            interactive: false,
            runtime_args: Vec::new(),
            work_dir: std::env::temp_dir(),
        }
    }
}

#[derive(Default)]
struct ProcInner {
    running: bool,
    pid: Option<u32>,
    started_at: Option<Instant>,
    last_output: Option<Instant>,
    restart_count: u32,
    exit_code: Option<i32>,
    stdin_tx: Option<mpsc::UnboundedSender<String>>,
    inject: Option<Arc<InjectChannel>>,
    /// Custom state carried across restarts.
    state_cache: HashMap<String, Value>,
    generation: CancellationToken,
}

/// Owns the target's child process.
pub struct ProcessManager {
    app: AppState,
    opts: ProcessOptions,
    caps: Mutex<Capabilities>,
    watches: WatchRegistry,
    debugger: RemoteDebugger,
    inner: Mutex<ProcInner>,
    exited: Notify,
}

impl ProcessManager {
    pub fn new(app: AppState, opts: ProcessOptions) -> Arc<Self> {
        let caps = opts.capabilities.normalized();
        let manager = Arc::new(Self {
            app,
            opts,
            caps: Mutex::new(caps),
            watches: WatchRegistry::new(),
            debugger: RemoteDebugger::new(),
            inner: Mutex::new(ProcInner::default()),
            exited: Notify::new(),
        });
        manager.spawn_debug_event_pump();
        manager
    }

    pub fn app(&self) -> &AppState {
        &self.app
    }

    pub fn watches(&self) -> &WatchRegistry {
        &self.watches
    }

    pub fn debugger(&self) -> &RemoteDebugger {
        &self.debugger
    }

    pub fn capabilities(&self) -> Capabilities {
        *self.caps.lock()
    }

    /// Replace the capability set. Spawn-time effects (inject preload,
    /// debug args) apply on the next start or restart.
    pub fn set_capabilities(&self, caps: Capabilities) {
        *self.caps.lock() = caps.normalized();
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    /// Spawn the target. Errors if already running or the entry has no
    /// registered runtime.
    pub async fn start(self: &Arc<Self>) -> Result<(), ProcessError> {
        let runtime = global_registry()
            .get_by_file(&self.opts.entry)
            .ok_or_else(|| ProcessError::UnsupportedEntry(self.opts.entry.clone()))?;
        if let Err(warning) = runtime.validate_setup() {
            tracing::warn!(runtime = runtime.name, %warning, "runtime precheck failed");
        }

        {
            let inner = self.inner.lock();
            if inner.running {
                return Err(ProcessError::AlreadyRunning);
            }
        }

        let caps = self.capabilities();
        let mut debug_port = None;
        let argv = if caps.debug {
            let port = reflexive_debug::find_available_port(runtime.default_port)?;
            debug_port = Some(port);
            runtime.build_args(port, &self.opts.entry, &self.opts.args)
        } else {
            let mut argv = self.opts.runtime_args.clone();
            argv.push(self.opts.entry.display().to_string());
            argv.extend(self.opts.args.iter().cloned());
            argv
        };

        let mut cmd = Command::new(runtime.command);
        cmd.args(&argv)
            .current_dir(&self.opts.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in runtime.build_env(debug_port.unwrap_or(runtime.default_port)) {
            cmd.env(key, value);
        }

        // Injection preload (node targets only): shim + callback socket.
        let inject = if caps.inject && runtime.name == "node" {
            let shim_path = shim::write_shim(&self.opts.work_dir)?;
            let sock_path = self
                .opts
                .work_dir
                .join(format!("reflexive-{}.sock", uuid::Uuid::new_v4().simple()));
            let channel = Arc::new(InjectChannel::listen(sock_path.clone(), self.app.clone())?);
            channel.seed_state(self.inner.lock().state_cache.clone());
            cmd.env("REFLEXIVE_IPC", &sock_path);
            if caps.eval {
                cmd.env("REFLEXIVE_EVAL", "1");
            }
            let preload = format!("--require {}", shim_path.display());
            let node_options = match std::env::var("NODE_OPTIONS") {
                Ok(existing) if !existing.is_empty() => format!("{existing} {preload}"),
                _ => preload,
            };
            cmd.env("NODE_OPTIONS", node_options);
            Some(channel)
        } else {
            None
        };

        let mut child = cmd.spawn()?;
        let pid = child.id();
        let generation = CancellationToken::new();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();

        {
            let mut inner = self.inner.lock();
            inner.running = true;
            inner.pid = pid;
            inner.started_at = Some(Instant::now());
            inner.last_output = Some(Instant::now());
            inner.exit_code = None;
            inner.inject = inject;
            inner.generation = generation.clone();
            inner.stdin_tx = stdin.map(|mut sink| {
                let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                tokio::spawn(async move {
                    while let Some(text) = rx.recv().await {
                        if sink.write_all(text.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
                tx
            });
        }

        self.app.log(
            LogType::System,
            format!("Process started (pid {})", pid.unwrap_or_default()),
            None,
        );
        self.app.emit(&Event::ProcessStarted { pid: pid.unwrap_or_default() });

        // Debug-ready banner matching happens on the capture path.
        let ready_tx = if caps.debug {
            let (tx, rx) = mpsc::channel::<reflexive_debug::DebugReady>(1);
            self.spawn_debug_attach(runtime.clone(), rx, generation.clone());
            Some(tx)
        } else {
            None
        };

        if let Some(stdout) = stdout {
            self.spawn_capture(stdout, LogType::Stdout, runtime.clone(), debug_port, ready_tx.clone(), generation.clone());
        }
        if let Some(stderr) = stderr {
            self.spawn_capture(stderr, LogType::Stderr, runtime.clone(), debug_port, ready_tx, generation.clone());
        }

        self.spawn_exit_waiter(child, generation);
        Ok(())
    }

    fn spawn_capture<R>(
        self: &Arc<Self>,
        stream: R,
        log_type: LogType,
        runtime: RuntimeDescriptor,
        debug_port: Option<u16>,
        ready_tx: Option<mpsc::Sender<reflexive_debug::DebugReady>>,
        generation: CancellationToken,
    ) where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        let Ok(Some(line)) = line else { break };
                        if let (Some(port), Some(tx)) = (debug_port, ready_tx.as_ref()) {
                            if let Some(ready) = runtime.parse_debug_ready(&line, port) {
                                let _ = tx.try_send(ready);
                                // Banner lines stay out of the app log.
                                continue;
                            }
                        }
                        manager.record_output(log_type.clone(), line);
                    }
                    _ = generation.cancelled() => break,
                }
            }
        });
    }

    /// Append an output line and run watch matching over it.
    fn record_output(&self, log_type: LogType, message: String) {
        self.inner.lock().last_output = Some(Instant::now());
        let hits = self.watches.match_message(&message);
        self.app.log(log_type, message.clone(), None);
        for watch in hits {
            let entry = reflexive_core::LogEntry::new(LogType::System, message.clone());
            self.app.emit(&Event::WatchHit { watch, entry });
        }
    }

    fn spawn_exit_waiter(self: &Arc<Self>, mut child: tokio::process::Child, generation: CancellationToken) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let status = child.wait().await;
            let code = status.ok().and_then(|s| s.code());
            {
                let mut inner = manager.inner.lock();
                // A restart may already have replaced this generation.
                if inner.generation.is_cancelled() || generation.is_cancelled() {
                    return;
                }
                inner.running = false;
                inner.pid = None;
                inner.exit_code = code;
                inner.stdin_tx = None;
                if let Some(inject) = inner.inject.take() {
                    inner.state_cache = inject.cached_state();
                    inject.abort_pending();
                }
            }
            generation.cancel();
            manager.app.log(
                LogType::System,
                format!("Process exited with code {}", code.map_or("unknown".to_string(), |c| c.to_string())),
                None,
            );
            manager.app.emit(&Event::ProcessExited { exit_code: code });
            let _ = manager.debugger.disconnect().await;
            manager.exited.notify_waiters();
        });
    }

    fn spawn_debug_attach(
        self: &Arc<Self>,
        runtime: RuntimeDescriptor,
        mut ready_rx: mpsc::Receiver<reflexive_debug::DebugReady>,
        generation: CancellationToken,
    ) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let ready = tokio::select! {
                ready = tokio::time::timeout(DEBUG_READY_BUDGET, ready_rx.recv()) => ready,
                _ = generation.cancelled() => return,
            };
            let Ok(Some(ready)) = ready else {
                manager.app.log(
                    LogType::System,
                    "Debugger did not become ready in time; target left running",
                    None,
                );
                manager.app.emit(&Event::DebuggerFailed {
                    message: "debug-ready banner not seen within budget".into(),
                });
                return;
            };

            let adapter = runtime.create_adapter();
            let opts = ConnectOptions {
                host: ready.host.clone(),
                port: ready.port,
                ws_url: ready.ws_url.clone(),
            };
            match manager.debugger.attach(adapter, opts).await {
                Ok(()) => {
                    manager.app.log(LogType::System, "Debugger attached", None);
                    manager.app.emit(&Event::DebuggerConnected { inspector_url: ready.ws_url });
                }
                Err(e) => {
                    manager.app.log(
                        LogType::System,
                        format!("Debugger connect failed: {e}"),
                        None,
                    );
                    manager.app.emit(&Event::DebuggerFailed { message: e.to_string() });
                }
            }
        });
    }

    /// Forward facade debug events onto the app bus, turning prompt-carrying
    /// breakpoint hits into `breakpointPrompt`.
    fn spawn_debug_event_pump(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let mut events = self.debugger.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    DebugEvent::Paused { reason, hit_breakpoint_ids, .. } => {
                        manager.app.emit(&Event::DebuggerPaused {
                            reason,
                            hit_breakpoint_ids: hit_breakpoint_ids.clone(),
                        });
                        let stack = manager.debugger.call_stack().unwrap_or_default();
                        for bp in manager.debugger.prompts_for(&hit_breakpoint_ids) {
                            let prompt = bp.prompt.clone().unwrap_or_default();
                            manager.app.append(reflexive_core::LogEntry::with_meta(
                                LogType::BreakpointPrompt,
                                prompt.clone(),
                                serde_json::json!({ "file": bp.file, "line": bp.line }),
                            ));
                            manager.app.emit(&Event::BreakpointPrompt {
                                prompt,
                                file: bp.file.clone(),
                                line: bp.line,
                                call_stack: stack.clone(),
                            });
                        }
                    }
                    DebugEvent::Resumed => manager.app.emit(&Event::DebuggerResumed),
                    DebugEvent::Output { category, text, .. } => {
                        manager.app.log(
                            LogType::Debug,
                            format!("[{category}] {text}"),
                            None,
                        );
                    }
                    DebugEvent::Disconnected | DebugEvent::BreakpointResolved { .. } => {}
                }
            }
        });
    }

    /// Graceful stop: SIGTERM, then SIGKILL after the grace period.
    /// Stopping a stopped target is a no-op.
    pub async fn stop(&self) -> Result<(), ProcessError> {
        let pid = {
            let inner = self.inner.lock();
            if !inner.running {
                return Ok(());
            }
            inner.pid
        };
        let Some(pid) = pid else { return Ok(()) };

        self.app.log(LogType::System, "Stopping process", None);
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);

        if !self.wait_for_exit(STOP_GRACE).await {
            tracing::warn!(pid, "target ignored SIGTERM, escalating to SIGKILL");
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
            self.wait_for_exit(STOP_GRACE).await;
        }
        Ok(())
    }

    async fn wait_for_exit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_running() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let _ = tokio::time::timeout(remaining.min(Duration::from_millis(100)), self.exited.notified()).await;
        }
        true
    }

    /// Stop (if running) then start with the same entry and args. Logs and
    /// custom state survive; the restart counter increments; desired
    /// breakpoints re-arm on the next debugger attach.
    pub async fn restart(self: &Arc<Self>) -> Result<(), ProcessError> {
        self.stop().await?;
        {
            let mut inner = self.inner.lock();
            inner.restart_count += 1;
        }
        self.app.reset_start_time();
        self.start().await
    }

    /// Write to the target's stdin, newline-terminated by default.
    pub fn send(&self, text: &str) -> Result<(), ProcessError> {
        let inner = self.inner.lock();
        let tx = inner.stdin_tx.as_ref().ok_or(ProcessError::NotRunning)?;
        let mut line = text.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        tx.send(line).map_err(|_| ProcessError::NotRunning)?;
        drop(inner);
        self.app.log(LogType::Stdin, text, None);
        Ok(())
    }

    /// Run code inside the target via the injected channel.
    pub async fn evaluate_in_app(
        &self,
        code: &str,
        timeout: Option<Duration>,
    ) -> Result<Value, ProcessError> {
        if !self.capabilities().eval {
            return Err(ProcessError::EvalDisabled);
        }
        let channel = self.inject_channel()?;
        Ok(channel.evaluate(code, timeout.unwrap_or(EVAL_TIMEOUT)).await?)
    }

    /// The shim's live state snapshot (falls back to the cached copy when
    /// the channel is quiet).
    pub async fn injected_state(&self) -> Result<HashMap<String, Value>, ProcessError> {
        let channel = self.inject_channel()?;
        match channel.query_state().await {
            Ok(state) => Ok(state),
            Err(InjectError::NotReady) => Ok(channel.cached_state()),
            Err(e) => Err(e.into()),
        }
    }

    fn inject_channel(&self) -> Result<Arc<InjectChannel>, ProcessError> {
        if !self.capabilities().inject {
            return Err(ProcessError::InjectDisabled);
        }
        self.inner.lock().inject.clone().ok_or(ProcessError::NotRunning)
    }

    pub fn state(&self) -> ProcessState {
        let caps = self.capabilities();
        let inner = self.inner.lock();
        let injection_ready =
            inner.running && inner.inject.as_ref().is_some_and(|c| c.is_ready());
        let waiting_for_input = self.opts.interactive
            && inner.running
            && inner.last_output.is_some_and(|t| t.elapsed() > INPUT_IDLE);
        ProcessState {
            is_running: inner.running,
            pid: inner.pid,
            uptime_ms: inner
                .started_at
                .filter(|_| inner.running)
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0),
            restart_count: inner.restart_count,
            exit_code: inner.exit_code,
            entry: self.opts.entry.clone(),
            cwd: self.opts.cwd.clone(),
            interactive: self.opts.interactive,
            waiting_for_input,
            inject: caps.inject,
            injection_ready,
            debug: caps.debug,
            debugger_connected: self.debugger.is_connected(),
            debugger_paused: self.debugger.is_paused(),
            inspector_url: self.debugger.state().inspector_url,
        }
    }

    /// Tear down the child, channels, and debugger. Used on shutdown.
    pub async fn destroy(&self) {
        let _ = self.stop().await;
        let mut inner = self.inner.lock();
        inner.generation.cancel();
        inner.inject = None;
        inner.stdin_tx = None;
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
