// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox instance records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of a remote sandbox.
///
/// Advances monotonically within one lifecycle: created → running →
/// stopped; any state may transition to error; destroy removes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    Created,
    Running,
    Stopped,
    Error,
}

impl SandboxStatus {
    /// Whether `next` is a legal advance from `self`.
    pub fn can_advance_to(self, next: SandboxStatus) -> bool {
        match (self, next) {
            (_, SandboxStatus::Error) => true,
            (SandboxStatus::Created, SandboxStatus::Running) => true,
            (SandboxStatus::Running, SandboxStatus::Stopped) => true,
            // restart: stopped sandboxes may run again
            (SandboxStatus::Stopped, SandboxStatus::Running) => true,
            (SandboxStatus::Error, SandboxStatus::Running) => false,
            _ => self == next,
        }
    }
}

/// Provider-facing configuration for one sandbox.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// One sandbox as tracked by a manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxInstance {
    pub id: String,
    pub status: SandboxStatus,
    pub config: SandboxConfig,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SandboxInstance {
    pub fn new(id: impl Into<String>, config: SandboxConfig) -> Self {
        Self {
            id: id.into(),
            status: SandboxStatus::Created,
            config,
            created_at: Utc::now(),
            started_at: None,
            stopped_at: None,
            error: None,
        }
    }
}
