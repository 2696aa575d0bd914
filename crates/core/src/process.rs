// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observable state of a supervised target process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Snapshot of the process manager's view of the target.
///
/// Invariants: `debugger_paused` implies `debugger_connected`;
/// `injection_ready` implies `inject` and `is_running`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessState {
    pub is_running: bool,
    pub pid: Option<u32>,
    pub uptime_ms: u64,
    pub restart_count: u32,
    pub exit_code: Option<i32>,
    pub entry: PathBuf,
    pub cwd: PathBuf,
    pub interactive: bool,
    pub waiting_for_input: bool,
    pub inject: bool,
    pub injection_ready: bool,
    pub debug: bool,
    pub debugger_connected: bool,
    pub debugger_paused: bool,
    pub inspector_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let state = ProcessState { is_running: true, pid: Some(42), ..Default::default() };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isRunning"], true);
        assert_eq!(json["pid"], 42);
        assert_eq!(json["restartCount"], 0);
        assert!(json["inspectorUrl"].is_null());
    }
}
