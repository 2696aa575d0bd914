// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAP-shaped inspection types shared by both debug transports.
//!
//! The V8 adapter normalizes into these shapes: empty function names become
//! `"(anonymous)"` and 0-based inspector lines become 1-based.

use serde::{Deserialize, Serialize};

/// A breakpoint as known to the facade. `id` is adapter-assigned and opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointInfo {
    pub id: String,
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One frame of a paused call stack. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    pub id: String,
    pub name: String,
    pub source: Source,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub name: String,
    #[serde(rename = "type")]
    pub scope_type: String,
    pub variables_reference: i64,
    pub expensive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub var_type: Option<String>,
    pub variables_reference: i64,
}

impl StackFrame {
    /// Display name with the V8 anonymous-function normalization applied.
    pub fn normalized_name(raw: &str) -> String {
        if raw.is_empty() {
            "(anonymous)".to_string()
        } else {
            raw.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_function_name_becomes_anonymous() {
        assert_eq!(StackFrame::normalized_name(""), "(anonymous)");
        assert_eq!(StackFrame::normalized_name("main"), "main");
    }

    #[test]
    fn scope_serializes_dap_shape() {
        let scope = Scope {
            name: "Local".into(),
            scope_type: "local".into(),
            variables_reference: 3,
            expensive: false,
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["type"], "local");
        assert_eq!(json["variablesReference"], 3);
    }
}
