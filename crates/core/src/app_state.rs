// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling log ring + custom key/value state, one instance per target.

use crate::bus::{EventBus, SubscriberId};
use crate::event::Event;
use crate::log::{LogEntry, LogType};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default bound for the log ring.
pub const DEFAULT_MAX_LOGS: usize = 500;

/// Status summary returned by [`AppState::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub uptime_ms: i64,
    pub log_count: usize,
    pub state_keys: usize,
    pub start_time: DateTime<Utc>,
}

struct Inner {
    logs: VecDeque<LogEntry>,
    state: HashMap<String, Value>,
    started_at: DateTime<Utc>,
}

/// The single log-and-state source of truth for one target.
///
/// Cheap to clone; all clones share the same ring, state map, and bus.
#[derive(Clone)]
pub struct AppState {
    max_logs: usize,
    inner: Arc<Mutex<Inner>>,
    bus: EventBus,
}

impl AppState {
    pub fn new(max_logs: usize) -> Self {
        Self {
            max_logs: max_logs.max(1),
            inner: Arc::new(Mutex::new(Inner {
                logs: VecDeque::new(),
                state: HashMap::new(),
                started_at: Utc::now(),
            })),
            bus: EventBus::new(),
        }
    }

    /// Append a log entry, evicting the oldest when the ring is full.
    /// Emits a `log` event carrying the stored entry.
    pub fn log(&self, entry_type: LogType, message: impl Into<String>, meta: Option<Value>) {
        let entry = LogEntry { entry_type, message: message.into(), timestamp: Utc::now(), meta };
        self.append(entry);
    }

    /// Append an already-built entry (used by pollers that carry their own
    /// timestamps and meta).
    pub fn append(&self, entry: LogEntry) {
        {
            let mut inner = self.inner.lock();
            inner.logs.push_back(entry.clone());
            while inner.logs.len() > self.max_logs {
                inner.logs.pop_front();
            }
        }
        self.bus.emit(&Event::Log { entry });
    }

    /// The most recent `count` entries in insertion order, optionally
    /// filtered by type. `None` returns the whole ring.
    pub fn logs(&self, count: Option<usize>, filter: Option<&LogType>) -> Vec<LogEntry> {
        let inner = self.inner.lock();
        let filtered: Vec<&LogEntry> = inner
            .logs
            .iter()
            .filter(|e| filter.is_none_or(|f| &e.entry_type == f))
            .collect();
        let take = count.unwrap_or(filtered.len()).min(filtered.len());
        filtered[filtered.len() - take..].iter().map(|e| (*e).clone()).collect()
    }

    /// Case-insensitive substring search over messages.
    pub fn search_logs(&self, query: &str) -> Vec<LogEntry> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock();
        inner
            .logs
            .iter()
            .filter(|e| e.message.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn log_count(&self) -> usize {
        self.inner.lock().logs.len()
    }

    pub fn clear_logs(&self) {
        self.inner.lock().logs.clear();
        self.bus.emit(&Event::LogsCleared);
    }

    /// Store a key, emitting `stateChange` with the previous value.
    pub fn set_state(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let old_value = self.inner.lock().state.insert(key.clone(), value.clone());
        self.bus.emit(&Event::StateChange { key, value, old_value });
    }

    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.inner.lock().state.get(key).cloned()
    }

    /// Full state map (for `get_custom_state` without a key).
    pub fn state_snapshot(&self) -> HashMap<String, Value> {
        self.inner.lock().state.clone()
    }

    /// Delete a key. Emits `stateDelete` only when the key existed.
    pub fn delete_state(&self, key: &str) -> bool {
        let existed = self.inner.lock().state.remove(key).is_some();
        if existed {
            self.bus.emit(&Event::StateDelete { key: key.to_string() });
        }
        existed
    }

    pub fn clear_state(&self) {
        self.inner.lock().state.clear();
    }

    pub fn status(&self) -> AppStatus {
        let inner = self.inner.lock();
        AppStatus {
            uptime_ms: (Utc::now() - inner.started_at).num_milliseconds(),
            log_count: inner.logs.len(),
            state_keys: inner.state.len(),
            start_time: inner.started_at,
        }
    }

    /// Rebase uptime, used when the target restarts.
    pub fn reset_start_time(&self) {
        self.inner.lock().started_at = Utc::now();
    }

    pub fn on(&self, filter: Option<&str>) -> (SubscriberId, mpsc::UnboundedReceiver<Event>) {
        self.bus.on(filter)
    }

    pub fn off(&self, id: SubscriberId) {
        self.bus.off(id);
    }

    pub fn emit(&self, event: &Event) {
        self.bus.emit(event);
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn max_logs(&self) -> usize {
        self.max_logs
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOGS)
    }
}

#[cfg(test)]
#[path = "app_state_tests.rs"]
mod tests;
