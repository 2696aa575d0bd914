// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One remote sandbox: lifecycle, file I/O, commands, log polling.

use crate::poll::{drain_lines, ShimMessage};
use crate::provider::{ExecOutput, ProviderError, SandboxProvider};
use crate::{shim, LOG_FILE, SHIM_FILE};
use chrono::Utc;
use parking_lot::Mutex;
use reflexive_core::{
    AppState, Event, LogEntry, LogType, SandboxConfig, SandboxInstance, SandboxStatus,
};
use reflexive_storage::StorageError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Fixed poll interval for the shim log file.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox already created: {0}")]
    AlreadyCreated(String),

    #[error("sandbox has not been created")]
    NotCreated,

    #[error("sandbox is not running")]
    NotRunning,

    #[error("restart requires a previous start (no entry file recorded)")]
    NoEntry,

    #[error("sandbox id already exists: {0}")]
    DuplicateId(String),

    #[error("sandbox limit reached ({0})")]
    LimitReached(usize),

    #[error("unknown sandbox: {0}")]
    UnknownSandbox(String),

    #[error("unknown snapshot: {0}")]
    UnknownSnapshot(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A file to place into a sandbox.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct FileUpload {
    pub path: String,
    pub content: String,
}

#[derive(Default)]
struct SbInner {
    instance: Option<SandboxInstance>,
    entry: Option<String>,
    args: Vec<String>,
    offset: u64,
    custom_state: HashMap<String, Value>,
    injection_ready: bool,
    poll_cancel: Option<CancellationToken>,
}

/// Supervisor for one remote sandbox.
pub struct SandboxManager {
    id: String,
    provider: Arc<dyn SandboxProvider>,
    app: AppState,
    inner: Mutex<SbInner>,
    /// Re-entrancy guard: a poll that finds a prior poll still running
    /// skips its body.
    poll_gate: tokio::sync::Mutex<()>,
}

impl SandboxManager {
    pub fn new(id: impl Into<String>, provider: Arc<dyn SandboxProvider>, app: AppState) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            provider,
            app,
            inner: Mutex::new(SbInner::default()),
            poll_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn app(&self) -> &AppState {
        &self.app
    }

    pub fn instance(&self) -> Option<SandboxInstance> {
        self.inner.lock().instance.clone()
    }

    pub fn status(&self) -> Option<SandboxStatus> {
        self.inner.lock().instance.as_ref().map(|i| i.status)
    }

    pub fn is_running(&self) -> bool {
        self.status() == Some(SandboxStatus::Running)
    }

    fn set_status(&self, status: SandboxStatus, error: Option<String>) {
        {
            let mut inner = self.inner.lock();
            let Some(instance) = inner.instance.as_mut() else { return };
            if !instance.status.can_advance_to(status) {
                tracing::warn!(id = %self.id, from = ?instance.status, to = ?status, "illegal sandbox status advance ignored");
                return;
            }
            instance.status = status;
            instance.error = error;
            match status {
                SandboxStatus::Running => instance.started_at = Some(Utc::now()),
                SandboxStatus::Stopped => instance.stopped_at = Some(Utc::now()),
                _ => {}
            }
        }
        self.app.emit(&Event::SandboxStatus { id: self.id.clone(), status });
    }

    /// Provision the remote sandbox. Calling create twice is an error.
    pub async fn create(&self, config: SandboxConfig) -> Result<SandboxInstance, SandboxError> {
        {
            let inner = self.inner.lock();
            if inner.instance.is_some() {
                return Err(SandboxError::AlreadyCreated(self.id.clone()));
            }
        }
        self.provider.create(&self.id, &config).await?;
        let instance = SandboxInstance::new(self.id.clone(), config);
        self.inner.lock().instance = Some(instance.clone());
        self.app.log(LogType::System, format!("Sandbox {} created", self.id), None);
        Ok(instance)
    }

    /// Upload the shim and start the target with it preloaded.
    pub async fn start(
        self: &Arc<Self>,
        entry: &str,
        args: &[String],
    ) -> Result<(), SandboxError> {
        if self.status().is_none() {
            return Err(SandboxError::NotCreated);
        }

        self.provider.write_file(&self.id, SHIM_FILE, shim::SANDBOX_SHIM.as_bytes()).await?;
        // Fresh generation, fresh stream.
        self.provider.write_file(&self.id, LOG_FILE, b"").await?;
        {
            let mut inner = self.inner.lock();
            inner.offset = 0;
            inner.injection_ready = false;
            inner.entry = Some(entry.to_string());
            inner.args = args.to_vec();
        }

        let mut argv = vec![entry.to_string()];
        argv.extend(args.iter().cloned());
        let env = vec![("NODE_OPTIONS".to_string(), format!("--require {SHIM_FILE}"))];
        if let Err(e) = self.provider.start_process(&self.id, "node", &argv, &env).await {
            self.set_status(SandboxStatus::Error, Some(e.to_string()));
            return Err(e.into());
        }

        self.set_status(SandboxStatus::Running, None);
        self.app.log(LogType::System, format!("Sandbox {} started: {entry}", self.id), None);
        self.spawn_poll_loop();
        Ok(())
    }

    fn spawn_poll_loop(self: &Arc<Self>) {
        let cancel = CancellationToken::new();
        {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.poll_cancel.take() {
                previous.cancel();
            }
            inner.poll_cancel = Some(cancel.clone());
        }
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => {
                        if let Err(e) = manager.poll_logs().await {
                            tracing::debug!(id = %manager.id, error = %e, "log poll failed");
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }

    /// Drain new whole lines from the shim log and route them. Returns the
    /// number of messages processed. Safe to call concurrently with the
    /// timer; an overlapping call skips.
    pub async fn poll_logs(&self) -> Result<usize, SandboxError> {
        let Ok(_guard) = self.poll_gate.try_lock() else {
            return Ok(0);
        };
        if self.status().is_none() {
            return Err(SandboxError::NotCreated);
        }

        let content = match self.provider.read_file(&self.id, LOG_FILE).await {
            Ok(content) => content,
            Err(ProviderError::FileNotFound(_)) => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let offset = self.inner.lock().offset;
        let (messages, new_offset) = drain_lines(&content, offset);
        self.inner.lock().offset = new_offset;

        let count = messages.len();
        for message in messages {
            self.route(message);
        }
        Ok(count)
    }

    fn route(&self, message: ShimMessage) {
        let data = message.data;
        match message.kind.as_str() {
            "ready" => {
                self.inner.lock().injection_ready = true;
                self.app.log(LogType::System, "Injection ready", Some(data.clone()));
                self.app.emit(&Event::InjectionReady { info: data });
            }
            "log" => {
                let level = data.get("level").and_then(Value::as_str).unwrap_or("info");
                let message = data.get("message").and_then(Value::as_str).unwrap_or_default();
                let meta = data.get("meta").filter(|m| !m.is_null()).cloned();
                self.app.log(LogType::parse(level), message, meta);
            }
            "state" => {
                let Some(key) = data.get("key").and_then(Value::as_str) else { return };
                let value = data.get("value").cloned().unwrap_or(Value::Null);
                self.inner.lock().custom_state.insert(key.to_string(), value.clone());
                self.app.set_state(key, value);
            }
            "error" => {
                let name =
                    data.get("name").and_then(Value::as_str).unwrap_or("Error").to_string();
                let msg =
                    data.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
                let stack = data.get("stack").and_then(Value::as_str).map(String::from);
                self.app.append(LogEntry::with_meta(
                    LogType::Inject("inject:error".into()),
                    format!("{name}: {msg}"),
                    serde_json::json!({ "name": name, "message": msg, "stack": stack }),
                ));
                self.app.emit(&Event::InjectError { name, message: msg, stack });
            }
            "event" => {
                let name = data.get("event").and_then(Value::as_str).unwrap_or("event");
                let payload = data.get("payload").cloned().unwrap_or(Value::Null);
                self.app.emit(&Event::Custom { name: name.to_string(), payload });
            }
            other => {
                tracing::debug!(kind = other, "shim log: unknown message kind");
            }
        }
    }

    /// Stop the target. Stopping a non-running sandbox is a no-op.
    pub async fn stop(&self) -> Result<(), SandboxError> {
        if !self.is_running() {
            return Ok(());
        }
        if let Some(cancel) = self.inner.lock().poll_cancel.take() {
            cancel.cancel();
        }
        self.provider.stop_process(&self.id).await?;
        self.set_status(SandboxStatus::Stopped, None);
        self.app.log(LogType::System, format!("Sandbox {} stopped", self.id), None);
        Ok(())
    }

    /// Stop (if needed), truncate the log stream, and start the recorded
    /// entry again. Requires a previous start.
    pub async fn restart(self: &Arc<Self>) -> Result<(), SandboxError> {
        let (entry, args) = {
            let inner = self.inner.lock();
            (inner.entry.clone(), inner.args.clone())
        };
        let Some(entry) = entry else {
            return Err(SandboxError::NoEntry);
        };
        self.stop().await?;
        {
            let mut inner = self.inner.lock();
            inner.offset = 0;
        }
        self.provider.write_file(&self.id, LOG_FILE, b"").await?;
        self.start(&entry, &args).await
    }

    /// Tear down the remote sandbox. Idempotent; also cancels polls and any
    /// command still holding the sandbox open.
    pub async fn destroy(&self) -> Result<(), SandboxError> {
        let existed = {
            let mut inner = self.inner.lock();
            if let Some(cancel) = inner.poll_cancel.take() {
                cancel.cancel();
            }
            inner.instance.take().is_some()
        };
        if !existed {
            return Ok(());
        }
        match self.provider.destroy(&self.id).await {
            Ok(()) | Err(ProviderError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.app.log(LogType::System, format!("Sandbox {} destroyed", self.id), None);
        Ok(())
    }

    pub async fn upload_files(&self, files: &[FileUpload]) -> Result<(), SandboxError> {
        self.require_created()?;
        for file in files {
            self.provider.write_file(&self.id, &file.path, file.content.as_bytes()).await?;
        }
        Ok(())
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>, SandboxError> {
        self.require_created()?;
        Ok(self.provider.read_file(&self.id, path).await?)
    }

    pub async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), SandboxError> {
        self.require_created()?;
        Ok(self.provider.write_file(&self.id, path, content).await?)
    }

    pub async fn list_files(&self, dir: &str) -> Result<Vec<String>, SandboxError> {
        self.require_created()?;
        Ok(self.provider.list_files(&self.id, dir).await?)
    }

    pub async fn run_command(
        &self,
        command: &str,
        args: &[String],
    ) -> Result<ExecOutput, SandboxError> {
        self.require_created()?;
        Ok(self.provider.exec(&self.id, command, args).await?)
    }

    pub fn logs(&self, count: Option<usize>, filter: Option<&LogType>) -> Vec<LogEntry> {
        self.app.logs(count, filter)
    }

    pub fn search_logs(&self, query: &str) -> Vec<LogEntry> {
        self.app.search_logs(query)
    }

    pub fn custom_state(&self) -> HashMap<String, Value> {
        self.inner.lock().custom_state.clone()
    }

    pub fn get_custom_state(&self, key: &str) -> Option<Value> {
        self.inner.lock().custom_state.get(key).cloned()
    }

    /// Seed custom state (snapshot resume).
    pub fn seed_state(&self, state: HashMap<String, Value>) {
        self.inner.lock().custom_state = state;
    }

    pub fn injection_ready(&self) -> bool {
        self.inner.lock().injection_ready
    }

    fn require_created(&self) -> Result<(), SandboxError> {
        if self.inner.lock().instance.is_none() {
            return Err(SandboxError::NotCreated);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
