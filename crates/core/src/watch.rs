// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch patterns matched against every new log message.

use serde::{Deserialize, Serialize};

/// A substring pattern over log messages. Matching is case-sensitive as
/// stored. Hits on watched entries do not cascade into further watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watch {
    pub id: String,
    pub pattern: String,
    pub enabled: bool,
    pub hit_count: u64,
    /// When set, a hit is turned into an agent prompt upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Watch {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self { id: id.into(), pattern: pattern.into(), enabled: true, hit_count: 0, prompt: None }
    }

    /// Substring match against a log message.
    pub fn matches(&self, message: &str) -> bool {
        self.enabled && message.contains(&self.pattern)
    }
}
