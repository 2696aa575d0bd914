// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot records: selected files + custom state + a bounded log slice.

use crate::log::LogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// How a snapshot file's content is encoded in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFileEncoding {
    Utf8,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub path: String,
    pub content: String,
    pub encoding: SnapshotFileEncoding,
}

/// A persisted bundle suitable to seed a new sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub sandbox_id: String,
    /// Epoch milliseconds at capture time.
    pub timestamp: u64,
    pub files: Vec<SnapshotFile>,
    pub state: HashMap<String, Value>,
    pub logs: Vec<LogEntry>,
}

/// Shape-check a snapshot value: required fields present and typed, each
/// file entry well-formed. Returns the reasons it fails, empty when valid.
pub fn validate_snapshot(value: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(obj) = value.as_object() else {
        return vec!["snapshot must be an object".to_string()];
    };

    for field in ["id", "sandboxId"] {
        if !obj.get(field).is_some_and(Value::is_string) {
            errors.push(format!("missing or non-string field: {field}"));
        }
    }
    if !obj.get("timestamp").is_some_and(Value::is_u64) {
        errors.push("missing or non-numeric field: timestamp".to_string());
    }
    if !obj.get("state").is_some_and(Value::is_object) {
        errors.push("missing or non-object field: state".to_string());
    }
    if !obj.get("logs").is_some_and(Value::is_array) {
        errors.push("missing or non-array field: logs".to_string());
    }

    match obj.get("files").and_then(Value::as_array) {
        None => errors.push("missing or non-array field: files".to_string()),
        Some(files) => {
            for (i, file) in files.iter().enumerate() {
                let ok = file.get("path").is_some_and(Value::is_string)
                    && file.get("content").is_some_and(Value::is_string)
                    && file
                        .get("encoding")
                        .and_then(Value::as_str)
                        .is_some_and(|e| e == "utf8" || e == "base64");
                if !ok {
                    errors.push(format!("malformed file entry at index {i}"));
                }
            }
        }
    }

    errors
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
