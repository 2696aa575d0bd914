// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use reflexive_core::{AppState, Capabilities};
use reflexive_process::ProcessOptions;

fn manager_with(caps: Capabilities) -> Arc<ProcessManager> {
    let mut opts = ProcessOptions::new("app.js");
    opts.capabilities = caps.normalized();
    ProcessManager::new(AppState::default(), opts)
}

#[tokio::test]
async fn read_only_plane_has_no_gated_tools() {
    let manager = manager_with(Capabilities::default());
    let plane = process_tools(&manager);
    let names = plane.names();
    assert!(names.contains(&"get_process_state"));
    assert!(names.contains(&"send_input"));
    assert!(!names.contains(&"restart_process"));
    assert!(!names.contains(&"evaluate_in_app"));
    assert!(!names.contains(&"debug_set_breakpoint"));
}

#[tokio::test]
async fn full_plane_includes_debug_suite() {
    let manager = manager_with(Capabilities::all());
    let plane = process_tools(&manager);
    let names = plane.names();
    for expected in [
        "restart_process",
        "stop_process",
        "start_process",
        "get_injected_state",
        "get_injection_logs",
        "evaluate_in_app",
        "list_app_globals",
        "debug_set_breakpoint",
        "debug_remove_breakpoint",
        "debug_list_breakpoints",
        "debug_resume",
        "debug_pause",
        "debug_step_over",
        "debug_step_into",
        "debug_step_out",
        "debug_get_call_stack",
        "debug_evaluate",
        "debug_get_scope_variables",
        "debug_get_state",
    ] {
        assert!(names.contains(&expected), "missing tool: {expected}");
    }
}

#[tokio::test]
async fn eval_implies_inject_tools() {
    let manager = manager_with(Capabilities { eval: true, ..Default::default() });
    let plane = process_tools(&manager);
    assert!(plane.names().contains(&"get_injected_state"));
    assert!(plane.names().contains(&"evaluate_in_app"));
}

#[tokio::test]
async fn get_process_state_reports_not_running() {
    let manager = manager_with(Capabilities::default());
    let plane = process_tools(&manager);
    let result = plane.invoke("get_process_state", serde_json::json!({})).await;
    assert!(!result.is_error);
    let state: Value = serde_json::from_str(&result.content[0].text).unwrap();
    assert_eq!(state["isRunning"], false);
}

#[tokio::test]
async fn send_input_on_stopped_target_is_an_error_result() {
    let manager = manager_with(Capabilities::default());
    let plane = process_tools(&manager);
    let result = plane.invoke("send_input", serde_json::json!({ "text": "hi" })).await;
    assert!(result.is_error, "errors surface as results, not panics");
}

#[tokio::test]
async fn debug_call_stack_is_null_when_not_paused() {
    let manager = manager_with(Capabilities::all());
    let plane = process_tools(&manager);
    let result = plane.invoke("debug_get_call_stack", serde_json::json!({})).await;
    assert!(!result.is_error);
    assert_eq!(result.content[0].text, "null");
}

#[tokio::test]
async fn debug_resume_without_connection_is_an_error_result() {
    let manager = manager_with(Capabilities::all());
    let plane = process_tools(&manager);
    let result = plane.invoke("debug_resume", serde_json::json!({})).await;
    assert!(result.is_error);
    assert!(result.content[0].text.contains("not connected"));
}
