// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn echo_tool() -> Tool {
    Tool::new(
        "echo",
        "Echo the input back",
        json!({ "type": "object", "properties": { "text": { "type": "string" } } }),
        |input| async move {
            match require_str(&input, "text") {
                Ok(text) => ToolResult::text(text),
                Err(e) => e,
            }
        },
    )
}

#[tokio::test]
async fn invoke_dispatches_by_name() {
    let plane = ToolPlane::new(vec![echo_tool()]);
    let result = plane.invoke("echo", json!({ "text": "hi" })).await;
    assert!(!result.is_error);
    assert_eq!(result.content[0].text, "hi");
}

#[tokio::test]
async fn unknown_tool_is_an_error_result() {
    let plane = ToolPlane::new(vec![echo_tool()]);
    let result = plane.invoke("nope", json!({})).await;
    assert!(result.is_error);
    assert!(result.content[0].text.contains("unknown tool"));
}

#[tokio::test]
async fn missing_field_is_an_error_result() {
    let plane = ToolPlane::new(vec![echo_tool()]);
    let result = plane.invoke("echo", json!({})).await;
    assert!(result.is_error);
    assert!(result.content[0].text.contains("text"));
}

#[test]
fn result_serializes_wire_shape() {
    let ok = serde_json::to_value(ToolResult::text("fine")).unwrap();
    assert_eq!(ok["content"][0]["type"], "text");
    assert!(ok.get("isError").is_none(), "isError omitted when false");

    let err = serde_json::to_value(ToolResult::error("bad")).unwrap();
    assert_eq!(err["isError"], true);
}
