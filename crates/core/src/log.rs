// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log entry types for the rolling buffer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Classification tag for a log entry.
///
/// The closed variants cover the supervisor's own channels; `Inject` carries
/// the sub-kind reported by the injected shim (`inject:error`, `inject:eval`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogType {
    Info,
    Warn,
    Error,
    Debug,
    Stdout,
    Stderr,
    System,
    Stdin,
    BreakpointPrompt,
    Inject(String),
}

impl LogType {
    /// Wire name for this type (`"stdout"`, `"inject:error"`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            LogType::Info => "info",
            LogType::Warn => "warn",
            LogType::Error => "error",
            LogType::Debug => "debug",
            LogType::Stdout => "stdout",
            LogType::Stderr => "stderr",
            LogType::System => "system",
            LogType::Stdin => "stdin",
            LogType::BreakpointPrompt => "breakpoint-prompt",
            LogType::Inject(kind) => kind,
        }
    }

    /// Parse a wire name back into a `LogType`.
    ///
    /// Unknown names map to `Info` so that shim-reported levels degrade
    /// gracefully rather than being dropped.
    pub fn parse(s: &str) -> Self {
        match s {
            "info" => LogType::Info,
            "warn" | "warning" => LogType::Warn,
            "error" => LogType::Error,
            "debug" => LogType::Debug,
            "stdout" => LogType::Stdout,
            "stderr" => LogType::Stderr,
            "system" => LogType::System,
            "stdin" => LogType::Stdin,
            "breakpoint-prompt" => LogType::BreakpointPrompt,
            other if other.starts_with("inject:") => LogType::Inject(other.to_string()),
            _ => LogType::Info,
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(LogType::parse(&s))
    }
}

/// One entry in the rolling log buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub entry_type: LogType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl LogEntry {
    pub fn new(entry_type: LogType, message: impl Into<String>) -> Self {
        Self { entry_type, message: message.into(), timestamp: Utc::now(), meta: None }
    }

    pub fn with_meta(entry_type: LogType, message: impl Into<String>, meta: Value) -> Self {
        Self { entry_type, message: message.into(), timestamp: Utc::now(), meta: Some(meta) }
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
