// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn plane_registers_the_five_library_tools() {
    let plane = library_tools(AppState::default());
    assert_eq!(
        plane.names(),
        ["get_app_status", "get_logs", "search_logs", "get_custom_state", "set_custom_state"]
    );
}

#[tokio::test]
async fn get_logs_filters_and_bounds() {
    let app = AppState::default();
    for i in 0..5 {
        app.log(LogType::Stdout, format!("out {i}"), None);
    }
    app.log(LogType::Stderr, "err", None);

    let plane = library_tools(app);
    let result = plane.invoke("get_logs", json!({ "count": 2, "type": "stdout" })).await;
    assert!(!result.is_error);
    let entries: Vec<Value> = serde_json::from_str(&result.content[0].text).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["message"], "out 4");
}

#[tokio::test]
async fn state_round_trips_through_tools() {
    let plane = library_tools(AppState::default());
    let set = plane
        .invoke("set_custom_state", json!({ "key": "mode", "value": "debug" }))
        .await;
    assert!(!set.is_error);

    let got = plane.invoke("get_custom_state", json!({ "key": "mode" })).await;
    let value: Value = serde_json::from_str(&got.content[0].text).unwrap();
    assert_eq!(value, "debug");

    let all = plane.invoke("get_custom_state", json!({})).await;
    let map: Value = serde_json::from_str(&all.content[0].text).unwrap();
    assert_eq!(map["mode"], "debug");
}

#[tokio::test]
async fn search_requires_query() {
    let plane = library_tools(AppState::default());
    let result = plane.invoke("search_logs", json!({})).await;
    assert!(result.is_error);
}
