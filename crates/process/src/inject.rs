// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injected-channel endpoint: a Unix socket the shim dials back to.
//!
//! Wire format is newline-delimited JSON both ways. Upward messages are
//! `ready/log/state/event/error` plus responses; downward messages are
//! `evaluate` and `query_state`, correlated by id with per-call timeouts.
//! A late response finds its pending entry gone and is discarded.

use parking_lot::Mutex;
use reflexive_core::{AppState, Event, LogType};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Default per-call evaluate timeout.
pub const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("injection channel is not ready")]
    NotReady,

    #[error("bind failed at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("evaluate timed out after {0:?}")]
    Timeout(Duration),

    #[error("evaluate was cancelled")]
    Cancelled,

    #[error("target reported: {0}")]
    Target(String),
}

type Pending = HashMap<u64, oneshot::Sender<Result<Value, InjectError>>>;

struct Shared {
    app: AppState,
    ready: AtomicBool,
    next_id: AtomicU64,
    pending: Mutex<Pending>,
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Last-seen shim state, cached so it survives target restarts.
    state_cache: Mutex<HashMap<String, Value>>,
}

/// Supervisor end of the injected channel. One per target generation.
pub struct InjectChannel {
    path: PathBuf,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl InjectChannel {
    /// Bind the socket and start accepting the shim's connection.
    pub fn listen(path: PathBuf, app: AppState) -> Result<Self, InjectError> {
        // A stale socket file from a previous run blocks bind.
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path)
            .map_err(|source| InjectError::Bind { path: path.clone(), source })?;

        let shared = Arc::new(Shared {
            app,
            ready: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            writer: Mutex::new(None),
            state_cache: Mutex::new(HashMap::new()),
        });
        let cancel = CancellationToken::new();

        let accept_shared = Arc::clone(&shared);
        let accept_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, _)) => {
                                handle_connection(stream, &accept_shared, &accept_cancel).await;
                                // Shim went away (exit or restart); reset for the next dial.
                                accept_shared.ready.store(false, Ordering::SeqCst);
                                *accept_shared.writer.lock() = None;
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "inject: accept failed");
                                break;
                            }
                        }
                    }
                    _ = accept_cancel.cancelled() => break,
                }
            }
        });

        Ok(Self { path, shared, cancel })
    }

    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    /// The manager's cache of the last-seen shim state snapshot.
    pub fn cached_state(&self) -> HashMap<String, Value> {
        self.shared.state_cache.lock().clone()
    }

    /// Seed the cache (used on restart so custom state survives).
    pub fn seed_state(&self, state: HashMap<String, Value>) {
        *self.shared.state_cache.lock() = state;
    }

    async fn request(
        &self,
        build: impl FnOnce(u64) -> String,
        timeout: Duration,
    ) -> Result<Value, InjectError> {
        if !self.is_ready() {
            return Err(InjectError::NotReady);
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(id, tx);

        let sent = self
            .shared
            .writer
            .lock()
            .as_ref()
            .map(|w| w.send(build(id)).is_ok())
            .unwrap_or(false);
        if !sent {
            self.shared.pending.lock().remove(&id);
            return Err(InjectError::NotReady);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(InjectError::Cancelled),
            Err(_) => {
                // Late responses find the pending entry gone and are dropped.
                self.shared.pending.lock().remove(&id);
                Err(InjectError::Timeout(timeout))
            }
        }
    }

    /// Run code inside the target. Requires the eval capability to have
    /// been granted at spawn time; the shim refuses otherwise.
    pub async fn evaluate(&self, code: &str, timeout: Duration) -> Result<Value, InjectError> {
        let code = code.to_string();
        self.request(
            move |id| {
                json!({ "type": "evaluate", "id": id, "code": code, "timeout": timeout.as_millis() as u64 })
                    .to_string()
            },
            timeout,
        )
        .await
    }

    /// Fetch the shim's live custom-state snapshot.
    pub async fn query_state(&self) -> Result<HashMap<String, Value>, InjectError> {
        let value = self
            .request(|id| json!({ "type": "query_state", "id": id }).to_string(), EVAL_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Abort pending requests (used on restart).
    pub fn abort_pending(&self) {
        let pending: Vec<_> = self.shared.pending.lock().drain().collect();
        for (_, tx) in pending {
            let _ = tx.send(Err(InjectError::Cancelled));
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for InjectChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.abort_pending();
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn handle_connection(
    stream: tokio::net::UnixStream,
    shared: &Arc<Shared>,
    cancel: &CancellationToken,
) {
    let (read_half, mut write_half) = stream.into_split();

    let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<String>();
    *shared.writer.lock() = Some(writer_tx);

    let write_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                line = writer_rx.recv() => {
                    let Some(mut line) = line else { break };
                    if !line.ends_with('\n') {
                        line.push('\n');
                    }
                    if write_half.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                }
                _ = write_cancel.cancelled() => break,
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(shared, &line),
                    Ok(None) | Err(_) => break,
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
    writer.abort();
}

fn handle_line(shared: &Arc<Shared>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let Ok(msg) = serde_json::from_str::<Value>(line) else {
        tracing::debug!("inject: skipping malformed line");
        return;
    };
    let data = msg.get("data").cloned().unwrap_or(Value::Null);
    match msg.get("type").and_then(Value::as_str) {
        Some("ready") => {
            shared.ready.store(true, Ordering::SeqCst);
            shared.app.log(LogType::System, "Injection ready", Some(data.clone()));
            shared.app.emit(&Event::InjectionReady { info: data });
        }
        Some("log") => {
            let level = data.get("level").and_then(Value::as_str).unwrap_or("info");
            let message = data.get("message").and_then(Value::as_str).unwrap_or_default();
            let meta = data.get("meta").filter(|m| !m.is_null()).cloned();
            shared.app.log(LogType::parse(level), message, meta);
        }
        Some("state") => {
            let Some(key) = data.get("key").and_then(Value::as_str) else { return };
            let value = data.get("value").cloned().unwrap_or(Value::Null);
            shared.state_cache.lock().insert(key.to_string(), value.clone());
            shared.app.set_state(key, value);
        }
        Some("event") => {
            let name = data.get("event").and_then(Value::as_str).unwrap_or("event");
            let payload = data.get("payload").cloned().unwrap_or(Value::Null);
            shared.app.emit(&Event::Custom { name: name.to_string(), payload });
        }
        Some("error") => {
            let name = data.get("name").and_then(Value::as_str).unwrap_or("Error").to_string();
            let message =
                data.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
            let stack = data.get("stack").and_then(Value::as_str).map(String::from);
            shared.app.append(reflexive_core::LogEntry::with_meta(
                LogType::Inject("inject:error".into()),
                format!("{name}: {message}"),
                json!({ "name": name, "message": message, "stack": stack }),
            ));
            shared.app.emit(&Event::InjectError { name, message, stack });
        }
        Some("eval_response") | Some("state_response") => {
            let Some(id) = msg.get("id").and_then(Value::as_u64) else { return };
            let Some(tx) = shared.pending.lock().remove(&id) else { return };
            let result = match msg.get("error").and_then(Value::as_str) {
                Some(err) => Err(InjectError::Target(err.to_string())),
                None => Ok(msg
                    .get("result")
                    .or_else(|| msg.get("state"))
                    .cloned()
                    .unwrap_or(Value::Null)),
            };
            let _ = tx.send(result);
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "inject_tests.rs"]
mod tests;
